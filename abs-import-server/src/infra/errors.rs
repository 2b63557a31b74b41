//! HTTP error boundary: maps domain errors onto the `ApiResponse` envelope
//! and an appropriate status code.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use std::fmt;

use abs_import_contracts::error::StoreError;
use abs_import_core::ImportError;

use super::api_response::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()>::error(self.message.clone()));
        (self.status, body).into_response()
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::NotFound(msg) => Self::not_found(msg),
            ImportError::InvalidBackup(msg) => Self::bad_request(msg),
            ImportError::Validation(msg) => Self::bad_request(msg),
            ImportError::Conflict(msg) => Self::conflict(msg),
            ImportError::StoreUnavailable(msg) => Self::unavailable(msg),
            ImportError::Cancelled(msg) => Self::internal(msg),
            ImportError::ProgressNotFound => Self::not_found("no playback state recorded"),
            ImportError::Internal(msg) => Self::internal(msg),
            ImportError::Io(e) => Self::internal(e.to_string()),
            ImportError::Json(e) => Self::bad_request(e.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::from(ImportError::from(err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
