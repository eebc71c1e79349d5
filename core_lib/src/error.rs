//! Application error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::database::StoreError;
use crate::middleware::rate_limit::RateLimitError;
use crate::validation::ValidationError;

pub type Result<T> = std::result::Result<T, AppError>;

const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error("Content-Type must be application/json")]
    UnsupportedMediaType,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Store(_) | AppError::Filesystem(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            AppError::RateLimited(err) => err.into_response(),
            AppError::Store(err) => {
                tracing::error!(error = %err, cause = ?std::error::Error::source(&err), "Database error");
                (status, INTERNAL_SERVER_ERROR).into_response()
            }
            AppError::Filesystem(err) => {
                tracing::error!(error = ?err, "Filesystem error");
                (status, INTERNAL_SERVER_ERROR).into_response()
            }
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_validation_errors_are_bad_requests() {
        let response = AppError::from(ValidationError::InvalidUserId).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Invalid user ID");
    }

    #[tokio::test]
    async fn test_store_errors_do_not_leak_details() {
        let err = StoreError::Query(sqlx::Error::Protocol("no such table: users".to_string()));
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_filesystem_errors_do_not_leak_paths() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "/srv/secret/file.txt: EIO");
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal Server Error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("User not found".to_string()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden("Access denied".to_string()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::UnsupportedMediaType.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
