//! Request validation middleware for content type

use axum::{
    extract::Request,
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use mime::Mime;
use tracing::debug;

use crate::error::AppError;

/// POST bodies must be declared as `application/json`. Parameters such as
/// `charset=utf-8` are allowed; `+json` suffix types are not.
pub async fn require_json_content_type(request: Request, next: Next) -> Result<Response, AppError> {
    if request.method() == Method::POST && !declares_json(request.headers()) {
        debug!(
            content_type = ?request.headers().get(header::CONTENT_TYPE),
            "Rejected POST with non-JSON content type"
        );
        return Err(AppError::UnsupportedMediaType);
    }

    Ok(next.run(request).await)
}

fn declares_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok())
        .map(|mime| mime.essence_str().eq_ignore_ascii_case(mime::APPLICATION_JSON.essence_str()))
        .unwrap_or(false)
}
