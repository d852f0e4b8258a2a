use std::collections::{HashMap, HashSet};
use tinylink_core::repository::{Record, Result};
use tinylink_core::{ShortCode, StorageError};

/// One row of a batch after [`UrlIndex::plan_batch`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Row {
    /// Not stored yet; the caller inserts it.
    Insert(Record),
    /// The URL already resolves from this code.
    Existing(ShortCode),
}

#[derive(Debug, Clone)]
struct Entry {
    original_url: String,
    owner_id: String,
}

/// Both directions of the code/url binding, kept in step.
///
/// Not synchronized: the owning repository wraps it in a lock.
#[derive(Debug, Default)]
pub(crate) struct UrlIndex {
    by_code: HashMap<ShortCode, Entry>,
    by_url: HashMap<String, ShortCode>,
}

impl UrlIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            by_code: HashMap::with_capacity(capacity),
            by_url: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Fails if `record` would break either uniqueness invariant.
    pub(crate) fn check(&self, record: &Record) -> Result<()> {
        if let Some(existing) = self.by_url.get(&record.original_url) {
            return Err(StorageError::UrlConflict {
                existing: existing.clone(),
            });
        }
        if self.by_code.contains_key(&record.code) {
            return Err(StorageError::HashConflict(record.code.to_string()));
        }
        Ok(())
    }

    /// Inserts a record that already passed [`UrlIndex::check`].
    pub(crate) fn insert(&mut self, record: Record) {
        self.by_url
            .insert(record.original_url.clone(), record.code.clone());
        self.by_code.insert(
            record.code,
            Entry {
                original_url: record.original_url,
                owner_id: record.owner_id,
            },
        );
    }

    /// Applies a record unconditionally: the last write for a code wins.
    ///
    /// A URL re-bound to another code drops the stale code, so both maps stay
    /// one-to-one.
    pub(crate) fn overwrite(&mut self, record: Record) {
        if let Some(previous) = self.by_code.remove(&record.code) {
            self.by_url.remove(&previous.original_url);
        }
        if let Some(stale) = self.by_url.remove(&record.original_url) {
            self.by_code.remove(&stale);
        }
        self.insert(record);
    }

    /// Resolves every row of a batch against the index and the rows before
    /// it, leaving the index untouched.
    ///
    /// A stored or repeated URL resolves to [`Row::Existing`]. A code taken
    /// by the index or by an earlier row fails the whole batch, so callers
    /// apply nothing.
    pub(crate) fn plan_batch(&self, records: Vec<Record>) -> Result<Vec<Row>> {
        let mut urls: HashMap<String, ShortCode> = HashMap::with_capacity(records.len());
        let mut codes: HashSet<ShortCode> = HashSet::with_capacity(records.len());

        records
            .into_iter()
            .map(|record| {
                let existing = self
                    .by_url
                    .get(&record.original_url)
                    .or_else(|| urls.get(&record.original_url));
                if let Some(existing) = existing {
                    return Ok(Row::Existing(existing.clone()));
                }

                if self.by_code.contains_key(&record.code) || !codes.insert(record.code.clone()) {
                    return Err(StorageError::HashConflict(record.code.to_string()));
                }

                urls.insert(record.original_url.clone(), record.code.clone());
                Ok(Row::Insert(record))
            })
            .collect()
    }

    pub(crate) fn get(&self, code: &ShortCode) -> Option<Record> {
        self.by_code.get(code).map(|entry| Record {
            code: code.clone(),
            original_url: entry.original_url.clone(),
            owner_id: entry.owner_id.clone(),
        })
    }

    pub(crate) fn owned_by(&self, owner_id: &str) -> HashMap<ShortCode, String> {
        self.by_code
            .iter()
            .filter(|(_, entry)| entry.owner_id == owner_id)
            .map(|(code, entry)| (code.clone(), entry.original_url.clone()))
            .collect()
    }
}
