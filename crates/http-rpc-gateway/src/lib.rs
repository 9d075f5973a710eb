// Path: crates/http-rpc-gateway/src/lib.rs
#![forbid(unsafe_code)]

//! HTTP surface of the score attestation service.
//!
//! `POST /api/sign-score` is the only state-changing route. `GET /healthz`
//! and `GET /metrics` are operational.

mod cors;
mod limiter;
pub mod metrics;

use anyhow::Result;
use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::{rejection::JsonRejection, DefaultBodyLimit, MatchedPath, State},
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use cors::{cors_middleware, CorsPolicy};
use limiter::{parse_cidrs, rate_limit_middleware, IpLimiter};
use metrics::http_metrics;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::watch;
use tower::{timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::trace::TraceLayer;
use whack_attestation::AttestationService;
use whack_telemetry::time::Timer;
use whack_types::config::{AttestorConfig, HardeningConfig};
use whack_types::error::{AttestError, ValidationError};
use whack_types::wire::{ErrorResponse, SignScoreRequest, SignScoreResponse};

// --- Error Handling ---
#[derive(Debug)]
pub enum AppError {
    Invalid(ValidationError),
    BadBody,
    PayloadTooLarge,
    MethodNotAllowed,
    RateLimited { retry_after: u64 },
    /// The per-IP limiter rejected the request before it reached the ledger.
    Throttled,
    Internal(anyhow::Error),
}

impl From<AttestError> for AppError {
    fn from(e: AttestError) -> Self {
        match e {
            AttestError::Invalid(v) => AppError::Invalid(v),
            AttestError::RateLimited { retry_after } => AppError::RateLimited { retry_after },
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(target: "gateway", reason = %rejection.body_text(), "rejected request body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::BadBody
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Invalid(e) => (StatusCode::BAD_REQUEST, ErrorResponse::new(e.to_string())),
            AppError::BadBody => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("Invalid request body"),
            ),
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorResponse::new("Request body too large"),
            ),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorResponse::new("Method not allowed"),
            ),
            AppError::RateLimited { retry_after } => {
                let body = ErrorResponse {
                    retry_after: Some(retry_after),
                    ..ErrorResponse::new("Too many submissions")
                };
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after.to_string())],
                    Json(body),
                )
                    .into_response();
            }
            AppError::Throttled => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorResponse::new("Too many requests"),
            ),
            AppError::Internal(e) => {
                tracing::error!(target: "gateway", "Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: Some(e.to_string()),
                        ..ErrorResponse::new("Internal server error")
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

// --- Handlers ---
async fn sign_score_handler(
    State(service): State<Arc<AttestationService>>,
    payload: Result<Json<SignScoreRequest>, JsonRejection>,
) -> Result<Json<SignScoreResponse>, AppError> {
    let Json(request) = payload?;
    // Detached from the connection: once admitted, a request runs to completion
    // even if the client goes away or the deadline fires.
    let attestation = tokio::spawn(async move { service.attest(&request).await })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("attestation task failed: {e}")))??;
    Ok(Json(SignScoreResponse::from(&attestation)))
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn healthz_handler(State(service): State<Arc<AttestationService>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "signer": service.signer_address().to_string(),
    }))
}

async fn metrics_handler() -> Result<impl IntoResponse, AppError> {
    let body = whack_telemetry::prometheus::render().map_err(AppError::Internal)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

// --- Middleware ---
async fn handle_service_error(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(ErrorResponse::new("Request timed out")),
        )
            .into_response()
    } else {
        AppError::Internal(anyhow::anyhow!("unhandled service error: {err}")).into_response()
    }
}

async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str())
        .unwrap_or("unknown")
        .to_string();
    let response = {
        let _timer = Timer::new(|secs| http_metrics().observe_request_duration(&route, secs));
        next.run(req).await
    };
    http_metrics().inc_requests_total(&route, response.status().as_u16());
    response
}

// --- Server ---
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: String,
    pub allowed_origins: Vec<String>,
    pub hardening: HardeningConfig,
}

impl From<&AttestorConfig> for GatewayConfig {
    fn from(config: &AttestorConfig) -> Self {
        Self {
            listen_addr: config.listen_address.clone(),
            allowed_origins: config.allowed_origins.clone(),
            hardening: config.hardening.clone(),
        }
    }
}

/// Assembles the application router. Exposed separately from [`run_server`]
/// so it can be driven in-process.
pub fn build_router(config: &GatewayConfig, service: Arc<AttestationService>) -> Router {
    let hc = &config.hardening;

    let sign = Router::<Arc<AttestationService>>::new().route(
        "/api/sign-score",
        post(sign_score_handler).fallback(method_not_allowed),
    );
    let sign = if hc.enabled {
        let limiter = IpLimiter::new(hc.ip_rps, hc.ip_burst, parse_cidrs(&hc.trusted_proxy_cidrs));
        sign.route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
    } else {
        tracing::warn!(target: "gateway", "per-ip rate limiting is DISABLED");
        sign
    };

    Router::<Arc<AttestationService>>::new()
        .merge(sign)
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_http_metrics))
        .with_state(service)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_service_error))
                .layer(TimeoutLayer::new(Duration::from_millis(hc.request_timeout_ms))),
        )
        .layer(middleware::from_fn_with_state(
            CorsPolicy::new(&config.allowed_origins),
            cors_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(hc.max_body_bytes))
}

pub async fn run_server(
    config: GatewayConfig,
    service: Arc<AttestationService>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let app = build_router(&config, service);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(target: "gateway", listen_addr = %addr, "attestation gateway listening");

    let graceful = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_rx.changed().await.ok();
        tracing::info!(target: "gateway", "shutting down gracefully");
    });

    if let Err(e) = graceful.await {
        tracing::error!(target: "gateway", error = %e, "server error");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_carries_header_and_body() {
        let response = AppError::RateLimited { retry_after: 7 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
        assert_eq!(
            body_json(response).await,
            json!({"error": "Too many submissions", "retryAfter": 7})
        );
    }

    #[tokio::test]
    async fn validation_errors_use_stable_strings() {
        for (err, text) in [
            (ValidationError::InvalidPlayer, "Invalid player address"),
            (ValidationError::InvalidScore, "Invalid score"),
            (ValidationError::InvalidNonce, "Invalid nonce"),
        ] {
            let response = AppError::Invalid(err).into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await, json!({ "error": text }));
        }
    }

    #[tokio::test]
    async fn internal_errors_carry_message() {
        let err = AttestError::Store(whack_types::error::StoreError::Backend("disk full".into()));
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(body["message"].as_str().unwrap().contains("disk full"));
    }
}
