use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Json,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    database::User,
    error::{AppError, Result},
    validation::{validate_email, validate_user_id, ValidationError},
    AppState,
};

fn user_id(path: std::result::Result<Path<String>, PathRejection>) -> Result<i64> {
    let Path(raw) = path.map_err(|_| ValidationError::InvalidUserId)?;
    Ok(validate_user_id(&raw)?)
}

/// `GET /api/user/:id`
///
/// A missing user yields `200 []`, not 404.
pub async fn get_user(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<User>>> {
    let id = user_id(path)?;
    let users = state.users.find_user_by_id(id).await?;
    Ok(Json(users))
}

/// `POST /api/user/:id/change-email` with body `{"email": "..."}`
pub async fn change_email(
    State(state): State<AppState>,
    path: std::result::Result<Path<String>, PathRejection>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<&'static str> {
    let id = user_id(path)?;

    let Json(payload) = payload.map_err(|rejection| {
        debug!(error = %rejection, "Rejected change-email body");
        AppError::BadRequest("Invalid JSON body".to_string())
    })?;

    let email = payload
        .get("email")
        .and_then(Value::as_str)
        .filter(|email| validate_email(email))
        .ok_or(ValidationError::InvalidEmail)?;

    let outcome = state.users.update_user_email(id, email).await?;
    if outcome.is_noop() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    info!(user_id = id, "Email updated");
    Ok("Email updated successfully")
}
