use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::replication::ReplicationError;

#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Protocol(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "validation error: {msg}"),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            AppError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Protocol(msg) => (StatusCode::BAD_REQUEST, "protocol_error", msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "kind": kind,
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Maps the replication controller's outcomes onto HTTP status codes per
/// §7. `Fatal` is handled separately by the caller (abort the node) rather
/// than surfaced to a client, since by definition it means the node can no
/// longer be trusted to keep serving requests.
impl From<ReplicationError> for AppError {
    fn from(err: ReplicationError) -> Self {
        match err {
            ReplicationError::Validation(msg) => AppError::Validation(msg),
            ReplicationError::NotFound(msg) => AppError::NotFound(msg),
            ReplicationError::Protocol(msg) => AppError::Protocol(msg),
            ReplicationError::Fatal(msg) => {
                tracing::error!("fatal replication error, aborting node: {msg}");
                crate::abort_node(&msg);
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
