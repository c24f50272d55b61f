//! Read model for the schema migration log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One applied schema version. Rows are only ever appended, by the migration
/// runner at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
  pub version:    u32,
  pub name:       String,
  pub applied_at: DateTime<Utc>,
}
