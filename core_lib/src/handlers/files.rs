use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    error::Result,
    validation::{validate_file_name, ValidationError},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub name: Option<String>,
}

/// `GET /api/file?name=...`
///
/// The allow-list runs first, so a traversal attempt is a 400 and never
/// reaches the containment check in `FileManager`.
pub async fn get_file(
    State(state): State<AppState>,
    query: std::result::Result<Query<FileQuery>, QueryRejection>,
) -> Result<Response> {
    let name = query
        .ok()
        .and_then(|Query(query)| query.name)
        .filter(|name| validate_file_name(name))
        .ok_or(ValidationError::InvalidFileName)?;

    let file = state.files.open(&name).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_LENGTH, file.len.to_string()),
        ],
        Body::from_stream(file.into_stream()),
    )
        .into_response())
}
