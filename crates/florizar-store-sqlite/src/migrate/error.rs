//! Errors raised by the migration runner.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("could not create the migration log: {0}")]
  LogTable(#[source] rusqlite::Error),

  /// Only raised under [`SnapshotPolicy::Required`](super::SnapshotPolicy).
  #[error("could not snapshot the database before migrating: {0}")]
  Snapshot(#[source] std::io::Error),

  #[error("could not open the migration transaction: {0}")]
  Begin(#[source] rusqlite::Error),

  #[error("migration v{version} ({name}) failed: {source}")]
  Migration {
    version: u32,
    name:    &'static str,
    #[source]
    source:  rusqlite::Error,
  },

  #[error("could not record migration v{version}: {source}")]
  Record {
    version: u32,
    #[source]
    source:  rusqlite::Error,
  },

  #[error("foreign key check failed: {0}")]
  ForeignKeyCheck(#[source] rusqlite::Error),

  #[error("{count} dangling foreign key(s) after migrating, in: {tables}")]
  DanglingReferences { count: usize, tables: String },

  #[error("could not commit migrations: {0}")]
  Commit(#[source] rusqlite::Error),

  #[error("could not re-enable foreign key enforcement: {0}")]
  ForeignKeys(#[source] rusqlite::Error),

  #[error("foreign key enforcement is still off after migrating")]
  ForeignKeysOff,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
