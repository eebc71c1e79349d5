//! CORS (Cross-Origin Resource Sharing) middleware configuration

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::config::CorsConfig;
use crate::error::AppError;

/// The single origin allowed to call the API from a browser.
#[derive(Clone, Debug)]
pub struct AllowedOrigin(HeaderValue);

impl AllowedOrigin {
    pub fn from_config(config: &CorsConfig) -> Result<Self, header::InvalidHeaderValue> {
        HeaderValue::from_str(config.allowed_origin.trim()).map(Self)
    }

    pub fn value(&self) -> &HeaderValue {
        &self.0
    }
}

pub fn cors_layer(origin: &AllowedOrigin) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin.value().clone())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Refuses requests that announce a foreign `Origin`. Requests without the
/// header (same-origin navigation, curl, server-to-server) pass through.
pub async fn origin_gate(
    State(allowed): State<AllowedOrigin>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        if origin != allowed.value() {
            warn!(origin = ?origin, "Rejected request from disallowed origin");
            return Err(AppError::Forbidden("Origin not allowed".to_string()));
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        let origin = AllowedOrigin::from_config(&CorsConfig::default()).unwrap();
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(cors_layer(&origin))
            .layer(middleware::from_fn_with_state(origin, origin_gate))
    }

    #[tokio::test]
    async fn test_allowed_origin_gets_cors_headers() {
        let request = Request::builder()
            .uri("/ping")
            .header(header::ORIGIN, "http://localhost:5173")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_preflight_lists_methods_and_headers() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/ping")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let methods = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        for method in ["GET", "POST", "PUT", "DELETE"] {
            assert!(methods.contains(method), "missing {} in {}", method, methods);
        }
        assert!(!methods.contains("PATCH"));

        let headers = response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .unwrap()
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(headers.contains("content-type"));
        assert!(headers.contains("authorization"));
    }

    #[tokio::test]
    async fn test_foreign_origin_is_rejected() {
        let request = Request::builder()
            .uri("/ping")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_request_without_origin_passes() {
        let request = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
