use thiserror::Error;

/// Errors surfaced by a `CatalogStore` implementation.
///
/// Variants are matched by identity (`matches!`), never by comparing
/// `to_string()` output — see the "progress not found" sentinel discussion
/// in the subsystem's design notes.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("catalog entity not found: {0}")]
    NotFound(String),

    /// Distinguished sentinel: "no prior playback state exists for
    /// (user, book)", as opposed to a real backing-store failure.
    #[error("no playback state recorded for this user/book pair")]
    ProgressNotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("catalog store temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("internal catalog store error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
