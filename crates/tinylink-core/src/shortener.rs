use crate::repository::{Record, Saved};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::collections::HashMap;

/// The operations a request layer consumes from the shortener.
///
/// [`Shortener::Error`] is expected to distinguish
/// "not found", "already shortened" and internal failures so the caller can
/// map them to responses.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Shortens `original_url` on behalf of `owner_id` and returns the new code.
    async fn save(&self, original_url: &str, owner_id: &str) -> Result<ShortCode, Self::Error>;

    /// Shortens every URL, pairing `original_urls[i]` with `owner_ids[i]`.
    /// The result is in input order.
    async fn save_batch(
        &self,
        original_urls: &[String],
        owner_ids: &[String],
    ) -> Result<Vec<Saved>, Self::Error>;

    /// Resolves a short code to its stored record.
    async fn get(&self, code: &ShortCode) -> Result<Record, Self::Error>;

    /// Returns every `code -> url` pair owned by `owner_id`.
    async fn get_all(&self, owner_id: &str) -> Result<HashMap<ShortCode, String>, Self::Error>;

    /// Checks that the configured backend is reachable.
    async fn ping(&self) -> Result<(), Self::Error>;
}
