//! Route table

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{
    error::AppError,
    handlers::{files, users},
    middleware::{rate_limit::rate_limit_middleware, request_validation::require_json_content_type},
    AppState,
};

/// Every POST passes the content-type gate. On change-email it sits inside
/// the rate limiter, so a refused attempt still counts against the caller.
/// Both are route layers there: other methods get their 405 without
/// touching the caller's budget.
///
/// The remaining routes and the fallback share one router-level gate. The
/// change-email route is added after that layer so it is gated only once.
pub fn create_routes(state: &AppState) -> Router<AppState> {
    let change_email = post(users::change_email)
        .route_layer(middleware::from_fn(require_json_content_type))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/api/user/:id", get(users::get_user))
        .route("/api/file", get(files::get_file))
        .fallback(not_found)
        .layer(middleware::from_fn(require_json_content_type))
        .route("/api/user/:id/change-email", change_email)
}

async fn not_found() -> AppError {
    AppError::NotFound("Not Found".to_string())
}
