//! Storage backends for the Tinylink URL shortener.
//!
//! Three interchangeable [`Repository`] implementations:
//!
//! - [`InMemoryRepository`]: process-local, lost on restart,
//! - [`FileRepository`]: the same index mirrored by an append-only JSON log,
//!   rebuilt by replay on open,
//! - [`PostgresRepository`]: a `urls` table whose constraints enforce
//!   uniqueness across concurrent writers.

mod index;
pub mod file;
pub mod memory;
pub mod postgres;

pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use postgres::{PostgresRepository, PostgresSettings};
pub use tinylink_core::repository::{Record, Repository, Result, Saved};
pub use tinylink_core::StorageError;
