//! Directed, typed edges between two contacts.
//!
//! The triple `(contact_id, related_contact_id, relation_type)` is unique.
//! Recording the same triple again replaces its function and notes; the edge
//! keeps its id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, contact::ContactSummary};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
  /// The related contact is the person to talk to at this organization.
  #[serde(alias = "interlocuteur")]
  #[strum(serialize = "interlocuteur")]
  Interlocutor,
  #[serde(alias = "associe")]
  #[strum(serialize = "associe")]
  Associate,
  #[serde(alias = "famille")]
  #[strum(serialize = "famille")]
  Family,
  #[serde(alias = "referent")]
  #[strum(serialize = "referent")]
  Referrer,
  #[serde(alias = "autre")]
  #[strum(serialize = "autre")]
  Other,
}

impl RelationType {
  pub fn code(self) -> &'static str { self.into() }

  pub fn from_code(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownVariant {
      kind:  "relation type",
      value: s.to_owned(),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRelation {
  pub id:                 i64,
  pub contact_id:         i64,
  pub related_contact_id: i64,
  pub relation_type:      RelationType,
  /// Role of the related contact, e.g. "site manager".
  pub function:           Option<String>,
  pub notes:              Option<String>,
  pub created_at:         DateTime<Utc>,
}

/// A relation joined with the contact it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedContact {
  #[serde(flatten)]
  pub relation: ContactRelation,
  pub related:  ContactSummary,
}

/// Body of `POST /contacts/:id/relations`; the source contact comes from the
/// path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRelation {
  pub related_contact_id: i64,
  pub relation_type:      RelationType,
  #[serde(default)]
  pub function:           Option<String>,
  #[serde(default)]
  pub notes:              Option<String>,
}

impl NewRelation {
  pub fn new(related_contact_id: i64, relation_type: RelationType) -> Self {
    Self { related_contact_id, relation_type, function: None, notes: None }
  }

  pub fn validate(self, contact_id: i64) -> Result<Self> {
    if self.related_contact_id == contact_id {
      return Err(Error::Invalid("a contact cannot be related to itself".into()));
    }
    if self.function.as_deref().is_some_and(|f| f.chars().count() > 100) {
      return Err(Error::Invalid("function is too long".into()));
    }
    if self.notes.as_deref().is_some_and(|n| n.chars().count() > 500) {
      return Err(Error::Invalid("notes are too long".into()));
    }
    Ok(self)
  }
}
