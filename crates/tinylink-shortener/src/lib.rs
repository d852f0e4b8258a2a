//! URL shortener service implementation.
//!
//! This crate wires a [`Generator`](tinylink_generator::Generator) and a
//! [`Repository`](tinylink_core::Repository) into the
//! [`Shortener`](tinylink_core::Shortener) contract. Core types are
//! re-exported from `tinylink_core`.

pub mod error;
pub mod service;

pub use error::ShortenerError;
pub use service::{ShortenerService, ShortenerSettings};
pub use tinylink_core::{Record, Repository, Saved, ShortCode, Shortener};
