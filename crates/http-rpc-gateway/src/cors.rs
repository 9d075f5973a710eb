// Path: crates/http-rpc-gateway/src/cors.rs
//! CORS headers for the browser game, and preflight handling.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

#[derive(Clone, Debug)]
pub(crate) struct CorsPolicy {
    allowed: Arc<Vec<HeaderValue>>,
}

impl CorsPolicy {
    pub(crate) fn new(origins: &[String]) -> Self {
        let allowed = origins
            .iter()
            .filter_map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|e| {
                        tracing::error!(target: "gateway", origin = %o, error = %e, "unusable CORS origin");
                        e
                    })
                    .ok()
            })
            .collect();
        Self {
            allowed: Arc::new(allowed),
        }
    }

    /// The request origin when it is allowed, otherwise the first configured
    /// origin. `None` only when no origin is configured.
    fn allow_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        origin
            .filter(|o| self.allowed.iter().any(|a| a == *o))
            .or_else(|| self.allowed.first())
            .cloned()
    }

    fn decorate(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        if let Some(allow) = self.allow_origin(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow);
            headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

/// Answers preflights with 204 and adds CORS headers to every response.
pub(crate) async fn cors_middleware(
    State(policy): State<CorsPolicy>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let origin = req.headers().get(header::ORIGIN).cloned();
    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    policy.decorate(origin.as_ref(), response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsPolicy {
        CorsPolicy::new(&[
            "https://whack.mistermonkee.com".to_string(),
            "http://localhost:3000".to_string(),
        ])
    }

    #[test]
    fn echoes_allowed_origin() {
        let origin = HeaderValue::from_static("http://localhost:3000");
        assert_eq!(policy().allow_origin(Some(&origin)), Some(origin));
    }

    #[test]
    fn unknown_origin_gets_primary_origin() {
        let evil = HeaderValue::from_static("https://evil.example");
        assert_eq!(
            policy().allow_origin(Some(&evil)),
            Some(HeaderValue::from_static("https://whack.mistermonkee.com"))
        );
        assert_eq!(
            policy().allow_origin(None),
            Some(HeaderValue::from_static("https://whack.mistermonkee.com"))
        );
    }

    #[test]
    fn sets_method_and_credential_headers() {
        let mut headers = HeaderMap::new();
        policy().decorate(None, &mut headers);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOW_HEADERS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }
}
