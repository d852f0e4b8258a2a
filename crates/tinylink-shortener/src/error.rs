use thiserror::Error;
use tinylink_core::{CoreError, ShortCode, StorageError};

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("short code not found: {0}")]
    NotFound(String),
    /// The URL was shortened before; carries the code it resolves from.
    #[error("url already shortened as {0}")]
    UrlAlreadyExists(ShortCode),
    #[error("no free short code after {attempts} attempts")]
    RetriesExhausted { attempts: usize },
    #[error("batch has {urls} urls but {owners} owners")]
    BatchMismatch { urls: usize, owners: usize },
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl ShortenerError {
    /// Whether this is the non-fatal "already shortened" outcome.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UrlAlreadyExists(_))
    }

    /// The code the caller should still hand out, if any.
    pub fn existing_code(&self) -> Option<&ShortCode> {
        match self {
            Self::UrlAlreadyExists(code) => Some(code),
            _ => None,
        }
    }
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
        }
    }
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(code) => Self::NotFound(code),
            StorageError::UrlConflict { existing } => Self::UrlAlreadyExists(existing),
            StorageError::Timeout(message) | StorageError::Unavailable(message) => {
                Self::Unavailable(message)
            }
            other => Self::Storage(other.to_string()),
        }
    }
}
