//! Application error type shared by every handler and service.
//!
//! Handlers return [`AppResult<T>`]; axum converts any error into a JSON
//! `{ "error": "<message>" }` body with the matching status code. Internal
//! errors are logged with their source and surfaced with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(anyhow::anyhow!(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg)   => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized    => (StatusCode::UNAUTHORIZED, "Unauthorized".into()),
            AppError::NotFound        => (StatusCode::NOT_FOUND, "Not found".into()),
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
