use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::capability::CapabilityError;
use crate::task::{StoreError, TaskId};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Task {0} not found")]
    TaskNotFound(TaskId),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("Task store error: {0}")]
    Storage(#[from] StoreError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    pub fn missing(field: &str) -> Self {
        AppError::BadRequest(format!("'{}' is required", field))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::TaskNotFound(id) => (
                StatusCode::NOT_FOUND,
                "TASK_NOT_FOUND",
                format!("Task {} not found", id),
            ),
            AppError::Capability(e) => {
                let (status, code) = match e {
                    CapabilityError::Unreachable { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_UNAVAILABLE")
                    }
                    CapabilityError::Rejected { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_REJECTED")
                    }
                    CapabilityError::Malformed { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_MALFORMED")
                    }
                    CapabilityError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    CapabilityError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
                };
                (status, code, e.to_string())
            }
            AppError::Storage(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                e.to_string(),
            ),
            AppError::IoError(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                e.to_string(),
            ),
        };

        tracing::error!("Request failed: {} - {}", code, message);

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}
