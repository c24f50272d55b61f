//! Per-connection settings for the Florizar SQLite store.
//!
//! Tables are not created here: the schema belongs to the versioned
//! migrations in [`crate::migrate`], which run right after these pragmas.

/// Executed once on every new connection, before migrating.
pub const CONNECTION_PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
";
