use crate::error::{Result, ShortenerError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tinylink_core::{Record, Repository, Saved, ShortCode, Shortener, StorageError};
use tinylink_generator::Generator;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_ATTEMPTS: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(attempts) => attempts,
    None => unreachable!(),
};

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// How many candidate codes to try before giving up.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: NonZeroUsize,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and a `Generator` to handle:
/// - minting candidate codes and skipping occupied ones
/// - retrying when the backend reports a code collision
/// - surfacing an already-shortened URL together with its existing code
///
/// The repository is chosen once at startup and shared as a trait object.
pub struct ShortenerService<G> {
    repository: Arc<dyn Repository>,
    generator: Arc<G>,
    settings: ShortenerSettings,
}

impl<G> Clone for ShortenerService<G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            settings: self.settings.clone(),
        }
    }
}

impl<G: Generator> ShortenerService<G> {
    pub fn new(repository: Arc<dyn Repository>, generator: G) -> Self {
        Self::with_settings(repository, generator, ShortenerSettings::default())
    }

    pub fn with_settings(
        repository: Arc<dyn Repository>,
        generator: G,
        settings: ShortenerSettings,
    ) -> Self {
        Self {
            repository,
            generator: Arc::new(generator),
            settings,
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    pub fn settings(&self) -> &ShortenerSettings {
        &self.settings
    }

    /// Mints a code that is neither stored nor in `reserved`.
    async fn mint(&self, reserved: &HashSet<ShortCode>) -> Result<ShortCode> {
        for attempt in 1..=self.settings.max_attempts.get() {
            let candidate: ShortCode = self.generator.generate().into();

            if reserved.contains(&candidate) {
                trace!(code = %candidate, attempt, "candidate already reserved in this batch");
                continue;
            }

            match self.repository.get(&candidate).await {
                Err(StorageError::NotFound(_)) => return Ok(candidate),
                Ok(_) => {
                    debug!(code = %candidate, attempt, "short code already exists, generating a new one");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(attempts = self.settings.max_attempts.get(), "could not mint a free short code");
        Err(ShortenerError::RetriesExhausted {
            attempts: self.settings.max_attempts.get(),
        })
    }
}

#[async_trait]
impl<G: Generator> Shortener for ShortenerService<G> {
    type Error = ShortenerError;

    async fn save(&self, original_url: &str, owner_id: &str) -> Result<ShortCode> {
        let unreserved = HashSet::new();

        for attempt in 1..=self.settings.max_attempts.get() {
            let candidate = self.mint(&unreserved).await?;
            let record = Record::new(candidate, original_url, owner_id);

            match self.repository.save(record).await {
                Ok(code) => {
                    info!(code = %code, url = %original_url, "shortened url");
                    return Ok(code);
                }
                Err(StorageError::HashConflict(code)) => {
                    debug!(code = %code, attempt, "lost short code race, generating a new one");
                }
                Err(StorageError::UrlConflict { existing }) => {
                    debug!(code = %existing, url = %original_url, "url already shortened");
                    return Err(ShortenerError::UrlAlreadyExists(existing));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ShortenerError::RetriesExhausted {
            attempts: self.settings.max_attempts.get(),
        })
    }

    /// Mints one code per URL and stores them through
    /// [`Repository::save_batch`].
    ///
    /// A code collision re-mints the whole batch. Backends store nothing from
    /// a batch that hits a taken code, so rows created by the retry still
    /// report [`Saved::Created`].
    async fn save_batch(&self, original_urls: &[String], owner_ids: &[String]) -> Result<Vec<Saved>> {
        if original_urls.len() != owner_ids.len() {
            return Err(ShortenerError::BatchMismatch {
                urls: original_urls.len(),
                owners: owner_ids.len(),
            });
        }
        if original_urls.is_empty() {
            return Ok(Vec::new());
        }

        for attempt in 1..=self.settings.max_attempts.get() {
            let mut reserved = HashSet::with_capacity(original_urls.len());
            let mut records = Vec::with_capacity(original_urls.len());

            for (url, owner) in original_urls.iter().zip(owner_ids) {
                let code = self.mint(&reserved).await?;
                reserved.insert(code.clone());
                records.push(Record::new(code, url.as_str(), owner.as_str()));
            }

            match self.repository.save_batch(records).await {
                Ok(saved) => {
                    info!(rows = saved.len(), "shortened url batch");
                    return Ok(saved);
                }
                Err(StorageError::HashConflict(code)) => {
                    debug!(code = %code, attempt, "batch lost short code race, minting again");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ShortenerError::RetriesExhausted {
            attempts: self.settings.max_attempts.get(),
        })
    }

    async fn get(&self, code: &ShortCode) -> Result<Record> {
        trace!(code = %code, "resolving short code");
        Ok(self.repository.get(code).await?)
    }

    async fn get_all(&self, owner_id: &str) -> Result<HashMap<ShortCode, String>> {
        Ok(self.repository.get_all(owner_id).await?)
    }

    async fn ping(&self) -> Result<()> {
        Ok(self.repository.ping().await?)
    }
}
