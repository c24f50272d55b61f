//! The `FlorizarStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `florizar-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.
//! Lookups by id return `Ok(None)` (or `Ok(false)`) for a missing row; errors
//! are reserved for conflicts, invalid references and storage failures.

use std::future::Future;

use crate::{
  contact::{Contact, ContactDetail, ContactFilter, ContactStats, NewContact},
  job_site::{JobSite, JobSiteDetail, JobSiteSummary, NewJobSite},
  migration::MigrationRecord,
  photo::{NewPhoto, Photo},
  relation::{ContactRelation, NewRelation, RelatedContact},
  tag::{NewTag, Tag},
  user::{NewUser, User, UserCredentials},
};

/// Backend errors expose the domain error they wrap, if any, so callers can
/// tell a conflict or a dangling reference apart from a storage failure.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn core(&self) -> Option<&crate::Error>;
}

/// Abstraction over a Florizar storage backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait FlorizarStore: Send + Sync {
  type Error: StoreError;

  // ── Contacts ──────────────────────────────────────────────────────────

  /// All contacts matching `filter`, ordered by last then first name, each
  /// with its tags and relations.
  fn list_contacts(
    &self,
    filter: ContactFilter,
  ) -> impl Future<Output = Result<Vec<ContactDetail>, Self::Error>> + Send + '_;

  fn get_contact(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<ContactDetail>, Self::Error>> + Send + '_;

  fn create_contact(
    &self,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Replace every field of a contact. Returns `None` if it does not exist.
  fn update_contact(
    &self,
    id: i64,
    input: NewContact,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// Delete a contact together with its job sites, their photos, its tags and
  /// its relations. Returns the photo rows that went with it so their files
  /// can be removed, or `None` if the contact did not exist.
  fn delete_contact(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Vec<Photo>>, Self::Error>> + Send + '_;

  fn toggle_contact_active(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// Substring search over last name, first name, legal name and email.
  /// At most 50 results.
  fn search_contacts(
    &self,
    term: String,
    filter: ContactFilter,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  fn contacts_by_tag(
    &self,
    tag_id: i64,
    active: Option<bool>,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  fn contact_stats(
    &self,
  ) -> impl Future<Output = Result<ContactStats, Self::Error>> + Send + '_;

  // ── Contact tags ──────────────────────────────────────────────────────

  /// Assign a tag to a contact. Assigning it twice is a no-op.
  fn add_contact_tag(
    &self,
    contact_id: i64,
    tag_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn remove_contact_tag(
    &self,
    contact_id: i64,
    tag_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Relations ─────────────────────────────────────────────────────────

  /// Insert a relation, or overwrite function and notes of the existing edge
  /// with the same `(contact, related contact, type)` triple.
  fn upsert_relation(
    &self,
    contact_id: i64,
    input: NewRelation,
  ) -> impl Future<Output = Result<ContactRelation, Self::Error>> + Send + '_;

  /// Remove relation `relation_id` if it starts at `contact_id`.
  fn remove_relation(
    &self,
    contact_id: i64,
    relation_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn relations(
    &self,
    contact_id: i64,
  ) -> impl Future<Output = Result<Vec<RelatedContact>, Self::Error>> + Send + '_;

  /// Relations of type `interlocutor` starting at `contact_id`.
  fn interlocutors(
    &self,
    contact_id: i64,
  ) -> impl Future<Output = Result<Vec<RelatedContact>, Self::Error>> + Send + '_;

  // ── Tags ──────────────────────────────────────────────────────────────

  fn list_tags(&self) -> impl Future<Output = Result<Vec<Tag>, Self::Error>> + Send + '_;

  fn get_tag(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Tag>, Self::Error>> + Send + '_;

  /// Fails with a conflict if the name is taken.
  fn create_tag(
    &self,
    input: NewTag,
  ) -> impl Future<Output = Result<Tag, Self::Error>> + Send + '_;

  fn update_tag(
    &self,
    id: i64,
    input: NewTag,
  ) -> impl Future<Output = Result<Option<Tag>, Self::Error>> + Send + '_;

  /// Fails with a conflict while any contact still carries the tag.
  fn delete_tag(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn search_tags(
    &self,
    term: String,
  ) -> impl Future<Output = Result<Vec<Tag>, Self::Error>> + Send + '_;

  /// Most-assigned tags first.
  fn top_tags(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Tag>, Self::Error>> + Send + '_;

  // ── Job sites ─────────────────────────────────────────────────────────

  /// Every job site, most recent start date first.
  fn list_job_sites(
    &self,
  ) -> impl Future<Output = Result<Vec<JobSiteSummary>, Self::Error>> + Send + '_;

  fn get_job_site(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<JobSiteDetail>, Self::Error>> + Send + '_;

  fn job_sites_for_contact(
    &self,
    contact_id: i64,
  ) -> impl Future<Output = Result<Vec<JobSite>, Self::Error>> + Send + '_;

  /// Fails with not-found if the owning contact does not exist.
  fn create_job_site(
    &self,
    input: NewJobSite,
  ) -> impl Future<Output = Result<JobSite, Self::Error>> + Send + '_;

  fn update_job_site(
    &self,
    id: i64,
    input: NewJobSite,
  ) -> impl Future<Output = Result<Option<JobSite>, Self::Error>> + Send + '_;

  /// Returns the photos deleted along with the job site, or `None` if it did
  /// not exist.
  fn delete_job_site(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Vec<Photo>>, Self::Error>> + Send + '_;

  // ── Photos ────────────────────────────────────────────────────────────

  /// Fails with not-found if the job site does not exist.
  fn add_photo(
    &self,
    input: NewPhoto,
  ) -> impl Future<Output = Result<Photo, Self::Error>> + Send + '_;

  fn get_photo(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Photo>, Self::Error>> + Send + '_;

  fn photos_for_job_site(
    &self,
    job_site_id: i64,
  ) -> impl Future<Output = Result<Vec<Photo>, Self::Error>> + Send + '_;

  fn update_photo_description(
    &self,
    id: i64,
    description: Option<String>,
  ) -> impl Future<Output = Result<Option<Photo>, Self::Error>> + Send + '_;

  /// Returns the deleted row so the caller can remove the file.
  fn delete_photo(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Photo>, Self::Error>> + Send + '_;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Fails with a conflict if the username or email is taken.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn find_user(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<UserCredentials>, Self::Error>> + Send + '_;

  // ── Schema ────────────────────────────────────────────────────────────

  /// The applied migrations, oldest first.
  fn migration_log(
    &self,
  ) -> impl Future<Output = Result<Vec<MigrationRecord>, Self::Error>> + Send + '_;
}
