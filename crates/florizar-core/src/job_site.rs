//! Job sites ("chantiers"): units of contracted work owned by one contact.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, contact::ContactSummary, photo::Photo};

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  #[default]
  #[serde(alias = "planifie")]
  #[strum(serialize = "planifie")]
  Planned,
  #[serde(alias = "en_cours")]
  #[strum(serialize = "en_cours")]
  InProgress,
  #[serde(alias = "termine")]
  #[strum(serialize = "termine")]
  Done,
  #[serde(alias = "annule")]
  #[strum(serialize = "annule")]
  Cancelled,
}

impl JobStatus {
  pub fn code(self) -> &'static str { self.into() }

  pub fn from_code(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownVariant {
      kind:  "job status",
      value: s.to_owned(),
    })
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  #[serde(alias = "basse")]
  #[strum(serialize = "basse")]
  Low,
  #[default]
  #[serde(alias = "moyenne")]
  #[strum(serialize = "moyenne")]
  Medium,
  #[serde(alias = "haute")]
  #[strum(serialize = "haute")]
  High,
}

impl Priority {
  pub fn code(self) -> &'static str { self.into() }

  pub fn from_code(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownVariant {
      kind:  "priority",
      value: s.to_owned(),
    })
  }
}

// ─── Stored job site ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSite {
  pub id:              i64,
  pub contact_id:      i64,
  pub name:            String,
  pub address:         Option<String>,
  pub city:            Option<String>,
  pub postal_code:     Option<String>,
  pub start_date:      NaiveDate,
  pub end_date:        Option<NaiveDate>,
  pub status:          JobStatus,
  pub priority:        Priority,
  pub description:     Option<String>,
  pub work_done:       Option<String>,
  pub work_todo:       Option<String>,
  pub budget_estimate: Option<f64>,
  pub actual_cost:     Option<f64>,
  /// Surface in square meters.
  pub area:            Option<f64>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

/// A job site with the owning contact's display fields, as listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSiteSummary {
  #[serde(flatten)]
  pub job_site: JobSite,
  pub contact:  Option<ContactSummary>,
}

/// A job site with its contact and photos, newest photo first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSiteDetail {
  #[serde(flatten)]
  pub job_site: JobSite,
  pub contact:  Option<ContactSummary>,
  pub photos:   Vec<Photo>,
}

// ─── Input ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJobSite {
  pub contact_id:      i64,
  pub name:            String,
  #[serde(default)]
  pub address:         Option<String>,
  #[serde(default)]
  pub city:            Option<String>,
  #[serde(default)]
  pub postal_code:     Option<String>,
  pub start_date:      NaiveDate,
  #[serde(default)]
  pub end_date:        Option<NaiveDate>,
  #[serde(default)]
  pub status:          JobStatus,
  #[serde(default)]
  pub priority:        Priority,
  #[serde(default)]
  pub description:     Option<String>,
  #[serde(default)]
  pub work_done:       Option<String>,
  #[serde(default)]
  pub work_todo:       Option<String>,
  #[serde(default)]
  pub budget_estimate: Option<f64>,
  #[serde(default)]
  pub actual_cost:     Option<f64>,
  #[serde(default)]
  pub area:            Option<f64>,
}

impl NewJobSite {
  pub fn new(contact_id: i64, name: impl Into<String>, start_date: NaiveDate) -> Self {
    Self {
      contact_id,
      name: name.into(),
      address: None,
      city: None,
      postal_code: None,
      start_date,
      end_date: None,
      status: JobStatus::default(),
      priority: Priority::default(),
      description: None,
      work_done: None,
      work_todo: None,
      budget_estimate: None,
      actual_cost: None,
      area: None,
    }
  }

  /// Storage does not enforce date ordering; this does.
  pub fn validate(mut self) -> Result<Self> {
    self.name = self.name.trim().to_owned();
    if self.name.is_empty() {
      return Err(Error::Invalid("job site name is required".into()));
    }
    if let Some(end) = self.end_date
      && end < self.start_date
    {
      return Err(Error::Invalid(format!(
        "end_date {end} precedes start_date {}",
        self.start_date
      )));
    }
    for (field, value) in [
      ("budget_estimate", self.budget_estimate),
      ("actual_cost", self.actual_cost),
      ("area", self.area),
    ] {
      if value.is_some_and(|v| v < 0.0 || !v.is_finite()) {
        return Err(Error::Invalid(format!("{field} must be a non-negative number")));
      }
    }
    Ok(self)
  }
}
