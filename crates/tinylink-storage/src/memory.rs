use crate::index::{Row, UrlIndex};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tinylink_core::repository::{Record, Repository, Result, Saved};
use tinylink_core::{ShortCode, StorageError};
use tracing::trace;

/// In-memory implementation of the Repository trait.
///
/// A single reader/writer lock guards the whole index: both uniqueness
/// checks and the insert happen under one write guard, readers share the
/// read guard. A batch is checked in full before any row is inserted, so a
/// code conflict stores nothing. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    index: RwLock<UrlIndex>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self {
            index: RwLock::new(UrlIndex::new()),
        }
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: RwLock::new(UrlIndex::with_capacity(capacity)),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save(&self, record: Record) -> Result<ShortCode> {
        let mut index = self.index.write();
        index.check(&record)?;

        let code = record.code.clone();
        index.insert(record);
        trace!(code = %code, "stored record in memory");
        Ok(code)
    }

    async fn save_batch(&self, records: Vec<Record>) -> Result<Vec<Saved>> {
        let mut index = self.index.write();
        let rows = index.plan_batch(records)?;

        Ok(rows
            .into_iter()
            .map(|row| match row {
                Row::Insert(record) => {
                    let code = record.code.clone();
                    index.insert(record);
                    Saved::Created(code)
                }
                Row::Existing(code) => Saved::Existing(code),
            })
            .collect())
    }

    async fn get(&self, code: &ShortCode) -> Result<Record> {
        self.index
            .read()
            .get(code)
            .ok_or_else(|| StorageError::NotFound(code.to_string()))
    }

    async fn get_all(&self, owner_id: &str) -> Result<HashMap<ShortCode, String>> {
        Ok(self.index.read().owned_by(owner_id))
    }
}
