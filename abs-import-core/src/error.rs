use thiserror::Error;

use abs_import_contracts::error::StoreError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("backup archive not found: {0}")]
    NotFound(String),

    #[error("backup archive is invalid: {0}")]
    InvalidBackup(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflicting mapping: {0}")]
    Conflict(String),

    #[error("catalog store temporarily unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Re-exported sentinel from the catalog store: no prior playback state
    /// exists for a (user, book) pair. Distinct from every other variant so
    /// callers can match on it instead of inspecting messages.
    #[error("no playback state recorded for this user/book pair")]
    ProgressNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed backup JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for ImportError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ImportError::NotFound(msg),
            StoreError::ProgressNotFound => ImportError::ProgressNotFound,
            StoreError::Validation(msg) => ImportError::Validation(msg),
            StoreError::Conflict(msg) => ImportError::Conflict(msg),
            StoreError::Unavailable(msg) => ImportError::StoreUnavailable(msg),
            StoreError::Internal(msg) => ImportError::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
