// Path: crates/http-rpc-gateway/src/limiter.rs
//! Per-IP token bucket in front of the signing route.
//!
//! This is coarse abuse protection only. The per-player submission interval
//! is enforced by the attestation ledger, not here.
//!
//! Every [`SWEEP_EVERY`] decisions the map drops buckets that have sat idle
//! for twice their refill time. Such a bucket is already full, so dropping it
//! is indistinguishable from keeping it.

use crate::AppError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use ipnetwork::IpNetwork;
use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Number of limiter decisions between idle-bucket sweeps.
const SWEEP_EVERY: u64 = 1024;

#[derive(Clone, Debug)]
pub(crate) struct IpLimiter {
    buckets: Arc<DashMap<IpAddr, Bucket>>,
    decisions: Arc<AtomicU64>,
    rps: f64,
    burst: f64,
    idle_ttl: Duration,
    trusted_proxy_cidrs: Arc<Vec<IpNetwork>>,
}

#[derive(Clone, Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

impl IpLimiter {
    pub(crate) fn new(rps: u32, burst: u32, trusted_proxy_cidrs: Arc<Vec<IpNetwork>>) -> Self {
        let (rps, burst) = (rps as f64, burst as f64);
        let refill_secs = if rps > 0.0 { burst / rps } else { burst };
        Self {
            buckets: Arc::new(DashMap::new()),
            decisions: Arc::new(AtomicU64::new(0)),
            rps,
            burst,
            idle_ttl: Duration::from_secs_f64(refill_secs.max(1.0) * 2.0),
            trusted_proxy_cidrs,
        }
    }

    fn client_ip<B>(&self, req: &Request<B>) -> IpAddr {
        if let Some(peer_ip) = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|c| c.0.ip())
        {
            if self
                .trusted_proxy_cidrs
                .iter()
                .any(|cidr| cidr.contains(peer_ip))
            {
                if let Some(ip) = req
                    .headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|xff| xff.split(',').next())
                    .and_then(|first| first.trim().parse::<IpAddr>().ok())
                {
                    return ip;
                }
            }
            return peer_ip;
        }
        IpAddr::from([127, 0, 0, 1])
    }

    pub(crate) fn allow<B>(&self, req: &Request<B>) -> bool {
        self.allow_at(self.client_ip(req), Instant::now())
    }

    fn allow_at(&self, ip: IpAddr, now: Instant) -> bool {
        let allowed = {
            let mut entry = self.buckets.entry(ip).or_insert_with(|| Bucket {
                tokens: self.burst,
                last: now,
            });
            let elapsed = now.saturating_duration_since(entry.last).as_secs_f64();
            entry.tokens = (entry.tokens + elapsed * self.rps).min(self.burst);
            entry.last = now;
            if entry.tokens >= 1.0 {
                entry.tokens -= 1.0;
                true
            } else {
                false
            }
        };
        // The entry guard is released above; retain locks every shard.
        if self.decisions.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep_idle(now);
        }
        if !allowed {
            tracing::debug!(target: "gateway", %ip, "per-ip limit hit");
        }
        allowed
    }

    fn sweep_idle(&self, now: Instant) {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.last) < self.idle_ttl);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::debug!(target: "gateway", evicted, remaining = before - evicted, "evicted idle per-ip buckets");
        }
    }
}

/// Parses the configured trusted proxy CIDRs, logging and skipping bad entries.
pub(crate) fn parse_cidrs(raw: &[String]) -> Arc<Vec<IpNetwork>> {
    Arc::new(
        raw.iter()
            .filter_map(|s| {
                IpNetwork::from_str(s)
                    .map_err(|e| {
                        tracing::error!(target: "gateway", cidr = %s, error = %e, "invalid CIDR in trusted_proxy_cidrs");
                        e
                    })
                    .ok()
            })
            .collect(),
    )
}

pub(crate) async fn rate_limit_middleware(
    State(limiter): State<IpLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if limiter.allow(&req) {
        next.run(req).await
    } else {
        AppError::Throttled.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_from(peer: &str, xff: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri("/api/sign-score");
        if let Some(v) = xff {
            builder = builder.header("x-forwarded-for", v);
        }
        let mut req = builder.body(()).unwrap();
        let addr: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    #[test]
    fn bucket_drains_then_denies() {
        let limiter = IpLimiter::new(1, 2, Arc::new(Vec::new()));
        let req = request_from("10.1.1.1:5000", None);
        assert!(limiter.allow(&req));
        assert!(limiter.allow(&req));
        assert!(!limiter.allow(&req));
        // A different client has its own bucket.
        assert!(limiter.allow(&request_from("10.1.1.2:5000", None)));
    }

    #[test]
    fn forwarded_for_only_honoured_from_trusted_proxies() {
        let limiter = IpLimiter::new(1, 1, parse_cidrs(&["10.0.0.0/8".to_string()]));
        let proxied = request_from("10.0.0.5:443", Some("203.0.113.7, 10.0.0.5"));
        assert_eq!(limiter.client_ip(&proxied), "203.0.113.7".parse::<IpAddr>().unwrap());

        let direct = request_from("198.51.100.1:443", Some("203.0.113.7"));
        assert_eq!(limiter.client_ip(&direct), "198.51.100.1".parse::<IpAddr>().unwrap());
    }

    fn nth_ip(i: u32) -> IpAddr {
        IpAddr::from([10, 0, (i >> 8) as u8, i as u8])
    }

    #[test]
    fn idle_buckets_are_evicted_on_sweep() {
        // Refill time 2s, so buckets idle for 4s or more are dropped.
        let limiter = IpLimiter::new(1, 2, Arc::new(Vec::new()));
        let t0 = Instant::now();
        let clients = 2 * SWEEP_EVERY as u32;
        for i in 0..clients {
            assert!(limiter.allow_at(nth_ip(i), t0));
        }
        // Sweeps ran during the fill but nothing was idle yet.
        assert_eq!(limiter.buckets.len(), clients as usize);

        let later = t0 + Duration::from_secs(10);
        let active = IpAddr::from([192, 0, 2, 1]);
        for _ in 0..SWEEP_EVERY {
            limiter.allow_at(active, later);
        }
        assert_eq!(limiter.buckets.len(), 1);
        assert!(limiter.buckets.contains_key(&active));
    }

    #[test]
    fn sweep_keeps_recently_used_buckets() {
        let limiter = IpLimiter::new(1, 2, Arc::new(Vec::new()));
        let t0 = Instant::now();
        let (stale, recent) = (nth_ip(1), nth_ip(2));
        limiter.allow_at(stale, t0);
        limiter.allow_at(recent, t0 + Duration::from_secs(9));

        limiter.sweep_idle(t0 + Duration::from_secs(10));
        assert!(!limiter.buckets.contains_key(&stale));
        assert!(limiter.buckets.contains_key(&recent));

        // A returning client starts from a full bucket, as if never evicted.
        let back = t0 + Duration::from_secs(11);
        assert!(limiter.allow_at(stale, back));
        assert!(limiter.allow_at(stale, back));
        assert!(!limiter.allow_at(stale, back));
    }

    #[test]
    fn bad_cidrs_are_skipped() {
        let cidrs = parse_cidrs(&["not-a-cidr".to_string(), "127.0.0.1/32".to_string()]);
        assert_eq!(cidrs.len(), 1);
    }
}
