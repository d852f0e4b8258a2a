use crate::error::StorageError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The short code the URL resolves from.
    pub code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// The client the record is attributed to.
    pub owner_id: String,
}

impl Record {
    pub fn new(code: ShortCode, original_url: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            code,
            original_url: original_url.into(),
            owner_id: owner_id.into(),
        }
    }
}

/// Outcome of one row of a batch save, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Saved {
    /// The row was stored under the requested code.
    Created(ShortCode),
    /// The URL was already stored; this is the code it already resolves from.
    Existing(ShortCode),
}

impl Saved {
    /// The code the caller should hand out for this row.
    pub fn code(&self) -> &ShortCode {
        match self {
            Saved::Created(code) | Saved::Existing(code) => code,
        }
    }

    pub fn into_code(self) -> ShortCode {
        match self {
            Saved::Created(code) | Saved::Existing(code) => code,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Saved::Created(_))
    }
}

/// Persistence contract shared by every storage backend.
///
/// Every implementation keeps both `code` and `original_url` unique:
///
/// - saving a URL that is already stored fails with
///   [`StorageError::UrlConflict`] carrying the code it already resolves from,
/// - saving a new URL under a taken code fails with
///   [`StorageError::HashConflict`].
///
/// The URL check wins when both apply.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Stores a new record and returns its effective code.
    async fn save(&self, record: Record) -> Result<ShortCode>;

    /// Stores several records, reporting one [`Saved`] per input row.
    ///
    /// A row whose URL is already stored (or repeats an earlier row of the
    /// same batch) reports [`Saved::Existing`] instead of failing. A code
    /// that is already taken fails the batch with
    /// [`StorageError::HashConflict`] and stores none of its rows.
    async fn save_batch(&self, records: Vec<Record>) -> Result<Vec<Saved>>;

    /// Retrieves the record for a given short code.
    /// Fails with [`StorageError::NotFound`] if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<Record>;

    /// Returns the `code -> url` mapping of every record owned by `owner_id`.
    async fn get_all(&self, owner_id: &str) -> Result<HashMap<ShortCode, String>>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
