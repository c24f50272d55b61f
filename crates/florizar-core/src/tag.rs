//! Tags: labels used to categorize contacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Color given to tags created without one.
pub const DEFAULT_TAG_COLOR: &str = "#6b7280";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
  pub id:            i64,
  /// Unique across all tags.
  pub name:          String,
  /// `#RRGGBB`.
  pub color:         String,
  pub description:   Option<String>,
  pub created_at:    DateTime<Utc>,
  /// Number of contacts currently carrying this tag.
  pub contact_count: u64,
}

fn default_color() -> String { DEFAULT_TAG_COLOR.to_owned() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTag {
  pub name:        String,
  #[serde(default = "default_color")]
  pub color:       String,
  #[serde(default)]
  pub description: Option<String>,
}

impl NewTag {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), color: default_color(), description: None }
  }

  pub fn validate(mut self) -> Result<Self> {
    self.name = self.name.trim().to_owned();
    let len = self.name.chars().count();
    if !(2..=50).contains(&len) {
      return Err(Error::Invalid(
        "tag name must be between 2 and 50 characters".into(),
      ));
    }
    if !is_hex_color(&self.color) {
      return Err(Error::Invalid(format!(
        "color must be #RRGGBB, got {:?}",
        self.color
      )));
    }
    Ok(self)
  }
}

fn is_hex_color(s: &str) -> bool {
  s.len() == 7
    && s.starts_with('#')
    && s[1..].bytes().all(|b| b.is_ascii_hexdigit())
}
