//! Core types and traits for the Tinylink URL shortener.
//!
//! This crate provides the record model, the short code type, the storage
//! contract implemented by every backend and the shortener contract consumed
//! by the surrounding request layer.

pub mod error;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use error::{CoreError, StorageError};
pub use repository::{Record, Repository, Saved};
pub use shortcode::ShortCode;
pub use shortener::Shortener;
