//! Error types for `florizar-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0} not found")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("invalid input: {0}")]
  Invalid(String),

  /// A persisted enum column held a code this build does not know.
  #[error("unknown {kind} code: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
