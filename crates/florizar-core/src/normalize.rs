//! Input normalization for legacy field names.
//!
//! Earlier versions of the application spoke French on the wire and called
//! contacts "clients". Request bodies are rewritten here, once, at the
//! boundary, so the rest of the system only ever sees one canonical name per
//! field. When a body carries both a legacy and a canonical name, the
//! canonical one wins and the legacy value is dropped. Two legacy names for
//! the same field must agree.
//!
//! Enum *values* (`physique`, `en_cours`, ...) are accepted by the serde
//! aliases on the enum types themselves.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
  Error, Result, contact::NewContact, job_site::NewJobSite,
  relation::NewRelation, tag::NewTag,
};

/// Legacy name → canonical name, for contact bodies.
pub const CONTACT_FIELDS: &[(&str, &str)] = &[
  ("type_personne", "kind"),
  ("nom", "last_name"),
  ("prenom", "first_name"),
  ("raison_sociale", "legal_name"),
  ("entreprise", "legal_name"),
  ("telephone", "phone"),
  ("telephone_secondaire", "secondary_phone"),
  ("adresse", "address"),
  ("ville", "city"),
  ("code_postal", "postal_code"),
  ("pays", "country"),
  ("tva_intracommunautaire", "vat_number"),
  ("forme_juridique", "legal_form"),
  ("actif", "active"),
];

/// Legacy name → canonical name, for job-site bodies.
pub const JOB_SITE_FIELDS: &[(&str, &str)] = &[
  ("client_id", "contact_id"),
  ("titre", "name"),
  ("title", "name"),
  ("nom", "name"),
  ("adresse", "address"),
  ("ville", "city"),
  ("code_postal", "postal_code"),
  ("date_debut", "start_date"),
  ("date_fin", "end_date"),
  ("statut", "status"),
  ("priorite", "priority"),
  ("resume_travaux", "work_done"),
  ("travaux_realises", "work_done"),
  ("notes_prochaine_fois", "work_todo"),
  ("travaux_a_faire", "work_todo"),
  ("budget_estime", "budget_estimate"),
  ("cout_reel", "actual_cost"),
  ("superficie", "area"),
];

/// Legacy name → canonical name, for tag bodies.
pub const TAG_FIELDS: &[(&str, &str)] =
  &[("nom", "name"), ("couleur", "color")];

/// Legacy name → canonical name, for relation bodies.
pub const RELATION_FIELDS: &[(&str, &str)] = &[
  ("contact_lie_id", "related_contact_id"),
  ("type_relation", "relation_type"),
  ("fonction", "function"),
];

/// Rename legacy keys of a JSON object in place according to `table`.
///
/// Several legacy names can map to one canonical field (`resume_travaux` and
/// `travaux_realises` both mean `work_done`). Sending two of them with
/// different values is rejected; with equal values the second is dropped.
pub fn rename_legacy_fields(
  body: &mut Map<String, Value>,
  table: &[(&str, &str)],
) -> Result<()> {
  let mut renamed: Vec<(&str, &str)> = Vec::new();
  for &(legacy, canonical) in table {
    let Some(value) = body.remove(legacy) else { continue };
    if let Some(&(_, first)) = renamed.iter().find(|(c, _)| *c == canonical) {
      if body.get(canonical) != Some(&value) {
        return Err(Error::Invalid(format!(
          "`{first}` and `{legacy}` disagree on `{canonical}`"
        )));
      }
      continue;
    }
    if !body.contains_key(canonical) {
      body.insert(canonical.to_owned(), value);
      renamed.push((canonical, legacy));
    }
  }
  Ok(())
}

fn decode<T: DeserializeOwned>(body: Value, table: &[(&str, &str)]) -> Result<T> {
  let Value::Object(mut map) = body else {
    return Err(Error::Invalid("request body must be a JSON object".into()));
  };
  rename_legacy_fields(&mut map, table)?;
  // Legacy clients sent `actif` as 0/1.
  if let Some(Value::Number(n)) = map.get("active") {
    let flag = n.as_i64().is_some_and(|n| n != 0);
    map.insert("active".into(), Value::Bool(flag));
  }
  serde_json::from_value(Value::Object(map))
    .map_err(|e| Error::Invalid(e.to_string()))
}

pub fn contact_input(body: Value) -> Result<NewContact> {
  decode::<NewContact>(body, CONTACT_FIELDS)?.validate()
}

pub fn job_site_input(body: Value) -> Result<NewJobSite> {
  decode::<NewJobSite>(body, JOB_SITE_FIELDS)?.validate()
}

pub fn tag_input(body: Value) -> Result<NewTag> {
  decode::<NewTag>(body, TAG_FIELDS)?.validate()
}

pub fn relation_input(body: Value, contact_id: i64) -> Result<NewRelation> {
  decode::<NewRelation>(body, RELATION_FIELDS)?.validate(contact_id)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::{contact::PersonKind, job_site::JobStatus};

  #[test]
  fn legacy_job_site_body_is_accepted() {
    let site = job_site_input(json!({
      "client_id": 7,
      "titre": "Taille de haie",
      "date_debut": "2024-03-01",
      "statut": "en_cours",
    }))
    .unwrap();
    assert_eq!(site.contact_id, 7);
    assert_eq!(site.name, "Taille de haie");
    assert_eq!(site.status, JobStatus::InProgress);
  }

  #[test]
  fn canonical_name_wins_over_legacy() {
    let site = job_site_input(json!({
      "contact_id": 3,
      "client_id": 9,
      "name": "Pelouse",
      "titre": "ignored",
      "start_date": "2024-03-01",
    }))
    .unwrap();
    assert_eq!(site.contact_id, 3);
    assert_eq!(site.name, "Pelouse");
  }

  #[test]
  fn legacy_synonyms_must_agree() {
    let body = |done: &str| {
      json!({
        "client_id": 7,
        "titre": "Taille de haie",
        "date_debut": "2024-03-01",
        "resume_travaux": "Haie taillée",
        "travaux_realises": done,
      })
    };

    let site = job_site_input(body("Haie taillée")).unwrap();
    assert_eq!(site.work_done.as_deref(), Some("Haie taillée"));

    let err = job_site_input(body("Pelouse tondue")).unwrap_err();
    assert!(
      matches!(&err, Error::Invalid(msg) if msg.contains("work_done")),
      "unexpected error: {err}"
    );
  }

  #[test]
  fn canonical_name_settles_disagreeing_synonyms() {
    let site = job_site_input(json!({
      "contact_id": 7,
      "name": "Taille de haie",
      "start_date": "2024-03-01",
      "work_done": "Massif planté",
      "resume_travaux": "Haie taillée",
      "travaux_realises": "Pelouse tondue",
    }))
    .unwrap();
    assert_eq!(site.work_done.as_deref(), Some("Massif planté"));
  }

  #[test]
  fn legacy_contact_body_with_numeric_flag() {
    let c = contact_input(json!({
      "type_personne": "morale",
      "nom": "ACME",
      "raison_sociale": "ACME SARL",
      "actif": 0,
    }))
    .unwrap();
    assert_eq!(c.kind, PersonKind::Organization);
    assert_eq!(c.legal_name.as_deref(), Some("ACME SARL"));
    assert!(!c.active);
  }

  #[test]
  fn non_object_body_is_invalid() {
    assert!(matches!(tag_input(json!([1, 2])), Err(Error::Invalid(_))));
  }

  #[test]
  fn relation_body_uses_path_contact() {
    let r = relation_input(
      json!({ "contact_lie_id": 2, "type_relation": "interlocuteur" }),
      1,
    )
    .unwrap();
    assert_eq!(r.related_contact_id, 2);
    assert!(relation_input(json!({ "related_contact_id": 1, "relation_type": "other" }), 1).is_err());
  }
}
