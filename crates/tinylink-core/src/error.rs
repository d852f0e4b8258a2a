use crate::shortcode::ShortCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors related to the core types of the URL shortener.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// Errors returned by [`Repository`](crate::repository::Repository) implementations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short code not found: {0}")]
    NotFound(String),
    /// The code is already bound to a different URL. Callers mint a new code.
    #[error("short code already exists: {0}")]
    HashConflict(String),
    /// The URL is already stored; `existing` is the code it resolves from.
    #[error("url already exists under short code {existing}")]
    UrlConflict { existing: ShortCode },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage io failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}
