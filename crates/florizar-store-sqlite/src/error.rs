//! Error type for `florizar-store-sqlite`.

use florizar_core::store::StoreError;
use thiserror::Error;

use crate::migrate;

#[derive(Debug, Error)]
pub enum Error {
  /// Not-found, conflict and validation failures, as the domain names them.
  #[error(transparent)]
  Core(#[from] florizar_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("schema migration failed: {0}")]
  Migration(#[from] migrate::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value that no longer decodes.
  #[error("unreadable row: {0}")]
  Corrupt(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub(crate) fn not_found(what: impl Into<String>) -> Self {
    Self::Core(florizar_core::Error::NotFound(what.into()))
  }

  pub(crate) fn conflict(what: impl Into<String>) -> Self {
    Self::Core(florizar_core::Error::Conflict(what.into()))
  }
}

impl StoreError for Error {
  fn core(&self) -> Option<&florizar_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

/// Whether `err` is SQLite refusing a write over a UNIQUE or PRIMARY KEY
/// constraint.
pub(crate) fn is_unique_violation(err: &tokio_rusqlite::Error) -> bool {
  matches!(
    err,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}
