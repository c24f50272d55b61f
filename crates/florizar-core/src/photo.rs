//! Photos attached to a job site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
  pub id:            i64,
  pub job_site_id:   i64,
  /// Server-generated name of the file in the uploads directory.
  pub filename:      String,
  /// Name supplied by the uploader. Untrusted; display only.
  pub original_name: String,
  pub description:   Option<String>,
  pub uploaded_at:   DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPhoto {
  pub job_site_id:   i64,
  pub filename:      String,
  pub original_name: String,
  pub description:   Option<String>,
}
