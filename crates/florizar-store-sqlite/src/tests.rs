//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use florizar_core::{
  contact::{ContactFilter, NewContact, PersonKind},
  job_site::{JobStatus, NewJobSite},
  photo::NewPhoto,
  relation::{NewRelation, RelationType},
  store::{FlorizarStore, StoreError},
  tag::NewTag,
  user::NewUser,
};
use tempfile::TempDir;

use crate::{Error, SnapshotPolicy, SqliteStore, migrate};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

fn is_not_found(e: &Error) -> bool {
  matches!(e.core(), Some(florizar_core::Error::NotFound(_)))
}

fn is_conflict(e: &Error) -> bool {
  matches!(e.core(), Some(florizar_core::Error::Conflict(_)))
}

fn photo(job_site_id: i64, filename: &str) -> NewPhoto {
  NewPhoto {
    job_site_id,
    filename: filename.into(),
    original_name: "jardin.jpg".into(),
    description: None,
  }
}

// ─── Opening ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_migrates_to_latest() {
  let s = store().await;
  assert_eq!(s.schema_version().await.unwrap(), migrate::latest_version(migrate::CATALOG));
  assert_eq!(s.migration_report().applied.len(), 2);

  let log = s.migration_log().await.unwrap();
  let versions: Vec<_> = log.iter().map(|r| (r.version, r.name.as_str())).collect();
  assert_eq!(versions, vec![(1, "initial_schema"), (2, "clients_to_contacts")]);
}

#[tokio::test]
async fn reopening_a_file_applies_nothing() {
  let dir = TempDir::new().unwrap();
  let path = dir.path().join("florizar.sqlite");

  let first = SqliteStore::open(&path).await.unwrap();
  first.create_contact(NewContact::individual("Dupont")).await.unwrap();
  first.close().await.unwrap();

  let second = SqliteStore::open_with(&path, SnapshotPolicy::Required).await.unwrap();
  assert!(second.migration_report().is_noop());
  let all = second.list_contacts(ContactFilter::default()).await.unwrap();
  assert_eq!(all.len(), 1);
}

// ─── Contacts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_contact() {
  let s = store().await;

  let mut input = NewContact::individual("  Dupont ");
  input.first_name = Some("Jean".into());
  input.email = Some("jean@dupont.fr".into());
  let created = s.create_contact(input).await.unwrap();
  assert_eq!(created.last_name, "Dupont");
  assert_eq!(created.kind, PersonKind::Individual);
  assert_eq!(created.country.as_deref(), Some("France"));
  assert!(created.active);

  let fetched = s.get_contact(created.id).await.unwrap().unwrap();
  assert_eq!(fetched.contact, created);
  assert!(fetched.tags.is_empty());
  assert!(fetched.relations.is_empty());
}

#[tokio::test]
async fn get_contact_missing_returns_none() {
  let s = store().await;
  assert!(s.get_contact(404).await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_contact_is_rejected() {
  let s = store().await;
  let err = s.create_contact(NewContact::individual("X")).await.unwrap_err();
  assert!(matches!(err.core(), Some(florizar_core::Error::Invalid(_))));
}

#[tokio::test]
async fn list_contacts_filters_and_orders() {
  let s = store().await;
  s.create_contact(NewContact::individual("Martin")).await.unwrap();
  let acme = s
    .create_contact(NewContact::organization("Acme", "Acme Jardins SARL"))
    .await
    .unwrap();
  let mut inactive = NewContact::individual("Bernard");
  inactive.active = false;
  s.create_contact(inactive).await.unwrap();

  let all = s.list_contacts(ContactFilter::default()).await.unwrap();
  let names: Vec<_> = all.iter().map(|c| c.contact.last_name.as_str()).collect();
  assert_eq!(names, vec!["Acme", "Bernard", "Martin"]);

  let orgs = s
    .list_contacts(ContactFilter { kind: Some(PersonKind::Organization), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(orgs.len(), 1);
  assert_eq!(orgs[0].contact.id, acme.id);

  let active = s
    .list_contacts(ContactFilter { active: Some(true), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(active.len(), 2);
}

#[tokio::test]
async fn update_contact_replaces_fields() {
  let s = store().await;
  let c = s.create_contact(NewContact::individual("Durand")).await.unwrap();

  let mut input = NewContact::organization("Durand", "Durand Paysages");
  input.siret = Some("12345678901234".into());
  let updated = s.update_contact(c.id, input).await.unwrap().unwrap();
  assert_eq!(updated.kind, PersonKind::Organization);
  assert_eq!(updated.legal_name.as_deref(), Some("Durand Paysages"));
  assert_eq!(updated.created_at, c.created_at);

  assert!(s.update_contact(999, NewContact::individual("Nobody")).await.unwrap().is_none());
}

#[tokio::test]
async fn toggle_active_flips_the_flag() {
  let s = store().await;
  let c = s.create_contact(NewContact::individual("Petit")).await.unwrap();

  let off = s.toggle_contact_active(c.id).await.unwrap().unwrap();
  assert!(!off.active);
  let on = s.toggle_contact_active(c.id).await.unwrap().unwrap();
  assert!(on.active);
  assert!(s.toggle_contact_active(999).await.unwrap().is_none());
}

#[tokio::test]
async fn search_matches_names_and_email() {
  let s = store().await;
  let mut a = NewContact::individual("Lefebvre");
  a.email = Some("contact@roseraie.fr".into());
  s.create_contact(a).await.unwrap();
  s.create_contact(NewContact::organization("Roseraie", "La Roseraie SAS")).await.unwrap();
  s.create_contact(NewContact::individual("Moreau")).await.unwrap();

  let hits = s
    .search_contacts("rose".into(), ContactFilter::default())
    .await
    .unwrap();
  assert_eq!(hits.len(), 2);

  let orgs = s
    .search_contacts(
      "rose".into(),
      ContactFilter { kind: Some(PersonKind::Organization), ..Default::default() },
    )
    .await
    .unwrap();
  assert_eq!(orgs.len(), 1);
  assert_eq!(orgs[0].last_name, "Roseraie");
}

#[tokio::test]
async fn search_is_capped() {
  let s = store().await;
  for i in 0..60 {
    s.create_contact(NewContact::individual(format!("Client {i:02}"))).await.unwrap();
  }
  let hits = s.search_contacts("Client".into(), ContactFilter::default()).await.unwrap();
  assert_eq!(hits.len(), 50);
}

#[tokio::test]
async fn stats_count_kinds_states_and_tags() {
  let s = store().await;
  let a = s.create_contact(NewContact::individual("Aubert")).await.unwrap();
  s.create_contact(NewContact::organization("Verts", "Les Verts")).await.unwrap();
  let mut c = NewContact::individual("Colin");
  c.active = false;
  s.create_contact(c).await.unwrap();

  let prospect = s
    .list_tags()
    .await
    .unwrap()
    .into_iter()
    .find(|t| t.name == "Prospect")
    .unwrap();
  s.add_contact_tag(a.id, prospect.id).await.unwrap();

  let stats = s.contact_stats().await.unwrap();
  assert_eq!(stats.total, 3);
  assert_eq!(stats.active, 2);
  assert_eq!(stats.inactive, 1);
  assert_eq!(stats.individuals, 2);
  assert_eq!(stats.organizations, 1);
  assert_eq!(stats.by_tag.len(), 5);
  assert_eq!(stats.by_tag[0].name, "Prospect");
  assert_eq!(stats.by_tag[0].count, 1);
}

// ─── Tags ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn seed_tags_are_present() {
  let s = store().await;
  let names: Vec<_> = s.list_tags().await.unwrap().into_iter().map(|t| t.name).collect();
  assert_eq!(
    names,
    vec!["Client", "Fournisseur", "Partenaire", "Prospect", "Sous-traitant"]
  );
}

#[tokio::test]
async fn tag_assignment_is_idempotent() {
  let s = store().await;
  let c = s.create_contact(NewContact::individual("Garnier")).await.unwrap();
  let tag = s.create_tag(NewTag::new("Arrosage")).await.unwrap();

  s.add_contact_tag(c.id, tag.id).await.unwrap();
  s.add_contact_tag(c.id, tag.id).await.unwrap();

  let detail = s.get_contact(c.id).await.unwrap().unwrap();
  assert_eq!(detail.tags.len(), 1);
  assert_eq!(detail.tags[0].contact_count, 1);

  let tagged = s.contacts_by_tag(tag.id, None).await.unwrap();
  assert_eq!(tagged.len(), 1);

  assert!(s.remove_contact_tag(c.id, tag.id).await.unwrap());
  assert!(!s.remove_contact_tag(c.id, tag.id).await.unwrap());
}

#[tokio::test]
async fn tagging_unknown_rows_is_not_found() {
  let s = store().await;
  let c = s.create_contact(NewContact::individual("Garnier")).await.unwrap();

  let err = s.add_contact_tag(c.id, 999).await.unwrap_err();
  assert!(is_not_found(&err));
  let err = s.add_contact_tag(999, 1).await.unwrap_err();
  assert!(is_not_found(&err));
}

#[tokio::test]
async fn duplicate_tag_name_conflicts() {
  let s = store().await;
  let err = s.create_tag(NewTag::new("Client")).await.unwrap_err();
  assert!(is_conflict(&err), "unexpected error: {err}");

  let other = s.create_tag(NewTag::new("Élagage")).await.unwrap();
  let err = s.update_tag(other.id, NewTag::new("Prospect")).await.unwrap_err();
  assert!(is_conflict(&err));
}

#[tokio::test]
async fn tag_in_use_cannot_be_deleted() {
  let s = store().await;
  let c = s.create_contact(NewContact::individual("Roux")).await.unwrap();
  let tag = s.create_tag(NewTag::new("Potager")).await.unwrap();
  s.add_contact_tag(c.id, tag.id).await.unwrap();

  let err = s.delete_tag(tag.id).await.unwrap_err();
  assert!(is_conflict(&err));
  assert!(s.get_tag(tag.id).await.unwrap().is_some());

  s.remove_contact_tag(c.id, tag.id).await.unwrap();
  assert!(s.delete_tag(tag.id).await.unwrap());
  assert!(!s.delete_tag(tag.id).await.unwrap());
}

#[tokio::test]
async fn top_tags_orders_by_usage() {
  let s = store().await;
  let tags = s.list_tags().await.unwrap();
  let partner = tags.iter().find(|t| t.name == "Partenaire").unwrap();
  let supplier = tags.iter().find(|t| t.name == "Fournisseur").unwrap();
  for name in ["Aa", "Bb"] {
    let c = s.create_contact(NewContact::individual(name)).await.unwrap();
    s.add_contact_tag(c.id, partner.id).await.unwrap();
  }
  let c = s.create_contact(NewContact::individual("Cc")).await.unwrap();
  s.add_contact_tag(c.id, supplier.id).await.unwrap();

  let top = s.top_tags(2).await.unwrap();
  assert_eq!(top.len(), 2);
  assert_eq!(top[0].name, "Partenaire");
  assert_eq!(top[0].contact_count, 2);
  assert_eq!(top[1].name, "Fournisseur");

  let found = s.search_tags("trait".into()).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].name, "Sous-traitant");
}

// ─── Relations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn relation_upsert_keeps_one_edge() {
  let s = store().await;
  let org = s.create_contact(NewContact::organization("Acme", "Acme SA")).await.unwrap();
  let person = s.create_contact(NewContact::individual("Blanc")).await.unwrap();

  let mut input = NewRelation::new(person.id, RelationType::Interlocutor);
  input.function = Some("Gérant".into());
  let first = s.upsert_relation(org.id, input).await.unwrap();

  let mut again = NewRelation::new(person.id, RelationType::Interlocutor);
  again.function = Some("Directeur".into());
  let second = s.upsert_relation(org.id, again).await.unwrap();

  assert_eq!(first.id, second.id);
  assert_eq!(second.function.as_deref(), Some("Directeur"));

  let relations = s.relations(org.id).await.unwrap();
  assert_eq!(relations.len(), 1);
  assert_eq!(relations[0].related.id, person.id);

  // A different type is a different edge.
  s.upsert_relation(org.id, NewRelation::new(person.id, RelationType::Associate))
    .await
    .unwrap();
  assert_eq!(s.relations(org.id).await.unwrap().len(), 2);
  assert_eq!(s.interlocutors(org.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn relation_endpoints_must_exist() {
  let s = store().await;
  let org = s.create_contact(NewContact::organization("Acme", "Acme SA")).await.unwrap();

  let err = s
    .upsert_relation(org.id, NewRelation::new(999, RelationType::Other))
    .await
    .unwrap_err();
  assert!(is_not_found(&err));

  let err = s
    .upsert_relation(org.id, NewRelation::new(org.id, RelationType::Other))
    .await
    .unwrap_err();
  assert!(matches!(err.core(), Some(florizar_core::Error::Invalid(_))));
}

#[tokio::test]
async fn remove_relation_checks_the_owner() {
  let s = store().await;
  let a = s.create_contact(NewContact::individual("Alpha")).await.unwrap();
  let b = s.create_contact(NewContact::individual("Bravo")).await.unwrap();
  let rel = s
    .upsert_relation(a.id, NewRelation::new(b.id, RelationType::Family))
    .await
    .unwrap();

  assert!(!s.remove_relation(b.id, rel.id).await.unwrap());
  assert!(s.remove_relation(a.id, rel.id).await.unwrap());
  assert!(s.relations(a.id).await.unwrap().is_empty());
}

// ─── Job sites & photos ──────────────────────────────────────────────────────

#[tokio::test]
async fn job_site_lifecycle() {
  let s = store().await;
  let c = s.create_contact(NewContact::individual("Fabre")).await.unwrap();

  let mut input = NewJobSite::new(c.id, "Création de massif", date(2024, 4, 2));
  input.budget_estimate = Some(1200.0);
  let site = s.create_job_site(input).await.unwrap();
  assert_eq!(site.status, JobStatus::Planned);
  assert_eq!(site.start_date, date(2024, 4, 2));

  let mut change = NewJobSite::new(c.id, "Création de massif", date(2024, 4, 2));
  change.status = JobStatus::Done;
  change.end_date = Some(date(2024, 4, 5));
  let updated = s.update_job_site(site.id, change).await.unwrap().unwrap();
  assert_eq!(updated.status, JobStatus::Done);
  assert_eq!(updated.end_date, Some(date(2024, 4, 5)));
  assert_eq!(updated.budget_estimate, None);

  let listed = s.list_job_sites().await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].contact.as_ref().map(|c| c.id), Some(c.id));

  assert_eq!(s.job_sites_for_contact(c.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn job_site_for_missing_contact_is_not_found() {
  let s = store().await;
  let err = s
    .create_job_site(NewJobSite::new(999, "Tonte", date(2024, 6, 1)))
    .await
    .unwrap_err();
  assert!(is_not_found(&err));

  let c = s.create_contact(NewContact::individual("Fabre")).await.unwrap();
  let site = s
    .create_job_site(NewJobSite::new(c.id, "Tonte", date(2024, 6, 1)))
    .await
    .unwrap();
  let err = s
    .update_job_site(site.id, NewJobSite::new(999, "Tonte", date(2024, 6, 1)))
    .await
    .unwrap_err();
  assert!(is_not_found(&err));
  assert!(
    s.update_job_site(999, NewJobSite::new(c.id, "Tonte", date(2024, 6, 1)))
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn photos_belong_to_job_sites() {
  let s = store().await;
  let c = s.create_contact(NewContact::individual("Fabre")).await.unwrap();
  let site = s
    .create_job_site(NewJobSite::new(c.id, "Tonte", date(2024, 6, 1)))
    .await
    .unwrap();

  let p = s.add_photo(photo(site.id, "a.jpg")).await.unwrap();
  s.add_photo(photo(site.id, "b.jpg")).await.unwrap();

  let detail = s.get_job_site(site.id).await.unwrap().unwrap();
  assert_eq!(detail.photos.len(), 2);

  let described = s
    .update_photo_description(p.id, Some("avant".into()))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(described.description.as_deref(), Some("avant"));

  let removed = s.delete_photo(p.id).await.unwrap().unwrap();
  assert_eq!(removed.filename, "a.jpg");
  assert!(s.get_photo(p.id).await.unwrap().is_none());
  assert_eq!(s.photos_for_job_site(site.id).await.unwrap().len(), 1);

  let err = s.add_photo(photo(999, "c.jpg")).await.unwrap_err();
  assert!(is_not_found(&err));
}

#[tokio::test]
async fn deleting_a_contact_cascades() {
  let s = store().await;
  let c = s.create_contact(NewContact::individual("Fabre")).await.unwrap();
  let other = s.create_contact(NewContact::individual("Gilles")).await.unwrap();
  let site = s
    .create_job_site(NewJobSite::new(c.id, "Tonte", date(2024, 6, 1)))
    .await
    .unwrap();
  s.add_photo(photo(site.id, "a.jpg")).await.unwrap();
  s.add_contact_tag(c.id, 1).await.unwrap();
  s.upsert_relation(other.id, NewRelation::new(c.id, RelationType::Referrer))
    .await
    .unwrap();

  let photos = s.delete_contact(c.id).await.unwrap().unwrap();
  assert_eq!(photos.len(), 1);
  assert_eq!(photos[0].filename, "a.jpg");

  assert!(s.get_job_site(site.id).await.unwrap().is_none());
  assert!(s.relations(other.id).await.unwrap().is_empty());
  assert!(s.delete_contact(c.id).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_a_job_site_returns_its_photos() {
  let s = store().await;
  let c = s.create_contact(NewContact::individual("Fabre")).await.unwrap();
  let site = s
    .create_job_site(NewJobSite::new(c.id, "Tonte", date(2024, 6, 1)))
    .await
    .unwrap();
  s.add_photo(photo(site.id, "a.jpg")).await.unwrap();

  let photos = s.delete_job_site(site.id).await.unwrap().unwrap();
  assert_eq!(photos.len(), 1);
  assert!(s.delete_job_site(site.id).await.unwrap().is_none());
  assert!(s.get_contact(c.id).await.unwrap().is_some());
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn users_are_unique() {
  let s = store().await;
  let user = NewUser {
    username:      "paul".into(),
    email:         "paul@florizar.fr".into(),
    password_hash: "$argon2id$stub".into(),
  };
  let created = s.create_user(user.clone()).await.unwrap();
  assert_eq!(created.username, "paul");

  let err = s.create_user(user).await.unwrap_err();
  assert!(is_conflict(&err));

  let found = s.find_user("paul".into()).await.unwrap().unwrap();
  assert_eq!(found.user.id, created.id);
  assert_eq!(found.password_hash, "$argon2id$stub");
  assert!(s.find_user("nobody".into()).await.unwrap().is_none());
}
