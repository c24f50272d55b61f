//! Contacts: the people and organizations a company works for.
//!
//! A contact is either an individual or an organization. Organization-only
//! fields (SIRET, VAT number, legal form) are kept on every row but carry no
//! meaning for individuals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, relation::RelatedContact, tag::Tag};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Whether a contact is a natural or a legal person.
///
/// The JSON form is English; the storage code (`physique` / `morale`) is the
/// one written by earlier versions of the application and is also accepted on
/// input.
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
pub enum PersonKind {
  #[default]
  #[serde(alias = "physique")]
  #[strum(serialize = "physique")]
  Individual,
  #[serde(alias = "morale")]
  #[strum(serialize = "morale")]
  Organization,
}

impl PersonKind {
  pub fn code(self) -> &'static str { self.into() }

  pub fn from_code(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownVariant {
      kind:  "person kind",
      value: s.to_owned(),
    })
  }
}

// ─── Stored contact ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  pub id:              i64,
  pub kind:            PersonKind,
  /// Family name for individuals; short name for organizations.
  pub last_name:       String,
  pub first_name:      Option<String>,
  pub legal_name:      Option<String>,
  pub email:           Option<String>,
  pub phone:           Option<String>,
  pub secondary_phone: Option<String>,
  pub address:         Option<String>,
  pub city:            Option<String>,
  pub postal_code:     Option<String>,
  pub country:         Option<String>,
  pub siret:           Option<String>,
  pub vat_number:      Option<String>,
  pub legal_form:      Option<String>,
  pub active:          bool,
  pub notes:           Option<String>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Contact {
  /// The name shown in lists: the legal name for organizations when known,
  /// otherwise "first last".
  pub fn display_name(&self) -> String {
    match (self.kind, &self.legal_name, &self.first_name) {
      (PersonKind::Organization, Some(legal), _) => legal.clone(),
      (_, _, Some(first)) => format!("{first} {}", self.last_name),
      _ => self.last_name.clone(),
    }
  }
}

/// The handful of contact fields embedded in relation and job-site views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSummary {
  pub id:         i64,
  pub kind:       PersonKind,
  pub last_name:  String,
  pub first_name: Option<String>,
  pub legal_name: Option<String>,
  pub email:      Option<String>,
  pub phone:      Option<String>,
}

/// A contact with its tags and outgoing relations, as returned by
/// `GET /contacts/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactDetail {
  #[serde(flatten)]
  pub contact:   Contact,
  pub tags:      Vec<Tag>,
  pub relations: Vec<RelatedContact>,
}

// ─── Input ───────────────────────────────────────────────────────────────────

fn default_country() -> Option<String> { Some("France".to_owned()) }

fn default_active() -> bool { true }

/// Body accepted when creating or replacing a contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContact {
  #[serde(default)]
  pub kind:            PersonKind,
  pub last_name:       String,
  #[serde(default)]
  pub first_name:      Option<String>,
  #[serde(default)]
  pub legal_name:      Option<String>,
  #[serde(default)]
  pub email:           Option<String>,
  #[serde(default)]
  pub phone:           Option<String>,
  #[serde(default)]
  pub secondary_phone: Option<String>,
  #[serde(default)]
  pub address:         Option<String>,
  #[serde(default)]
  pub city:            Option<String>,
  #[serde(default)]
  pub postal_code:     Option<String>,
  #[serde(default = "default_country")]
  pub country:         Option<String>,
  #[serde(default)]
  pub siret:           Option<String>,
  #[serde(default)]
  pub vat_number:      Option<String>,
  #[serde(default)]
  pub legal_form:      Option<String>,
  #[serde(default = "default_active")]
  pub active:          bool,
  #[serde(default)]
  pub notes:           Option<String>,
}

impl NewContact {
  /// A minimal individual with only a last name set.
  pub fn individual(last_name: impl Into<String>) -> Self {
    Self {
      kind:            PersonKind::Individual,
      last_name:       last_name.into(),
      first_name:      None,
      legal_name:      None,
      email:           None,
      phone:           None,
      secondary_phone: None,
      address:         None,
      city:            None,
      postal_code:     None,
      country:         default_country(),
      siret:           None,
      vat_number:      None,
      legal_form:      None,
      active:          true,
      notes:           None,
    }
  }

  /// A minimal organization with a short name and a legal name.
  pub fn organization(
    last_name: impl Into<String>,
    legal_name: impl Into<String>,
  ) -> Self {
    Self {
      kind: PersonKind::Organization,
      legal_name: Some(legal_name.into()),
      ..Self::individual(last_name)
    }
  }

  /// Trim the name and reject obviously malformed identifiers.
  pub fn validate(mut self) -> Result<Self> {
    self.last_name = self.last_name.trim().to_owned();
    let len = self.last_name.chars().count();
    if !(2..=100).contains(&len) {
      return Err(Error::Invalid(
        "last_name must be between 2 and 100 characters".into(),
      ));
    }
    if let Some(email) = &self.email
      && !email.contains('@')
    {
      return Err(Error::Invalid(format!("invalid email: {email:?}")));
    }
    if let Some(code) = &self.postal_code
      && !all_digits(code, 5)
    {
      return Err(Error::Invalid("postal_code must be 5 digits".into()));
    }
    if let Some(siret) = &self.siret
      && !all_digits(siret, 14)
    {
      return Err(Error::Invalid("siret must be 14 digits".into()));
    }
    Ok(self)
  }
}

fn all_digits(s: &str, len: usize) -> bool {
  s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Optional filters for contact listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ContactFilter {
  pub active: Option<bool>,
  pub kind:   Option<PersonKind>,
}

/// Per-tag usage row inside [`ContactStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagUsage {
  pub name:  String,
  pub color: String,
  pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactStats {
  pub total:         u64,
  pub active:        u64,
  pub inactive:      u64,
  pub individuals:   u64,
  pub organizations: u64,
  pub by_tag:        Vec<TagUsage>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_codes_roundtrip() {
    assert_eq!(PersonKind::Individual.code(), "physique");
    assert_eq!(PersonKind::Organization.code(), "morale");
    assert_eq!(PersonKind::from_code("morale").unwrap(), PersonKind::Organization);
    assert!(matches!(
      PersonKind::from_code("robot"),
      Err(Error::UnknownVariant { .. })
    ));
  }

  #[test]
  fn kind_accepts_storage_code_in_json() {
    let k: PersonKind = serde_json::from_str("\"morale\"").unwrap();
    assert_eq!(k, PersonKind::Organization);
    let k: PersonKind = serde_json::from_str("\"individual\"").unwrap();
    assert_eq!(k, PersonKind::Individual);
  }

  #[test]
  fn defaults_apply_on_minimal_body() {
    let c: NewContact = serde_json::from_str(r#"{"last_name":"Dupont"}"#).unwrap();
    assert_eq!(c.kind, PersonKind::Individual);
    assert_eq!(c.country.as_deref(), Some("France"));
    assert!(c.active);
  }

  #[test]
  fn validate_trims_and_checks_name() {
    let c = NewContact::individual("  Dupont ").validate().unwrap();
    assert_eq!(c.last_name, "Dupont");
    assert!(NewContact::individual("D").validate().is_err());
  }

  #[test]
  fn validate_rejects_bad_identifiers() {
    let mut c = NewContact::organization("ACME", "ACME SARL");
    c.siret = Some("1234".into());
    assert!(c.clone().validate().is_err());
    c.siret = Some("12345678901234".into());
    c.postal_code = Some("7500".into());
    assert!(c.clone().validate().is_err());
    c.postal_code = Some("75001".into());
    assert!(c.validate().is_ok());
  }

  #[test]
  fn display_name_prefers_legal_name_for_organizations() {
    let now = Utc::now();
    let mut c = Contact {
      id:              1,
      kind:            PersonKind::Organization,
      last_name:       "ACME".into(),
      first_name:      None,
      legal_name:      Some("ACME SARL".into()),
      email:           None,
      phone:           None,
      secondary_phone: None,
      address:         None,
      city:            None,
      postal_code:     None,
      country:         None,
      siret:           None,
      vat_number:      None,
      legal_form:      None,
      active:          true,
      notes:           None,
      created_at:      now,
      updated_at:      now,
    };
    assert_eq!(c.display_name(), "ACME SARL");
    c.kind = PersonKind::Individual;
    c.first_name = Some("Jean".into());
    c.last_name = "Dupont".into();
    assert_eq!(c.display_name(), "Jean Dupont");
  }
}
