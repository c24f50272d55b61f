//! SQLite backend for the Florizar store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Opening a store brings its schema up to
//! date through [`migrate`] before any query is served.

mod encode;
mod schema;
mod store;

pub mod error;
pub mod migrate;

pub use error::{Error, Result};
pub use migrate::{MigrationReport, SnapshotPolicy};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
