//! [`SqliteStore`], the SQLite implementation of [`FlorizarStore`].

use std::path::{Path, PathBuf};

use chrono::Utc;
use florizar_core::{
  contact::{Contact, ContactDetail, ContactFilter, ContactStats, NewContact, TagUsage},
  job_site::{JobSite, JobSiteDetail, JobSiteSummary, NewJobSite},
  migration::MigrationRecord,
  photo::{NewPhoto, Photo},
  relation::{ContactRelation, NewRelation, RelatedContact, RelationType},
  store::FlorizarStore,
  tag::{NewTag, Tag},
  user::{NewUser, User, UserCredentials},
};
use rusqlite::{Connection, OptionalExtension as _};
use tracing::{debug, info};

use crate::{
  Error, Result,
  encode::{
    CONTACT_COLUMNS, JOB_SITE_COLUMNS, PHOTO_COLUMNS, RELATION_COLUMNS, RawContact,
    RawContactDetail, RawJobSite, RawJobSiteDetail, RawJobSiteWithContact, RawMigration,
    RawPhoto, RawRelated, RawRelation, RawTag, RawUser, SUMMARY_COLUMNS, TAG_COLUMNS,
    encode_date, encode_dt,
  },
  error::is_unique_violation,
  migrate::{self, CATALOG, MigrationReport, Migrator, SnapshotPolicy},
  schema::CONNECTION_PRAGMAS,
};

/// Maximum number of rows a contact search returns.
pub const SEARCH_LIMIT: i64 = 50;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Florizar store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  report: MigrationReport,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and migrate it to the latest schema,
  /// snapshotting on a best-effort basis.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, SnapshotPolicy::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, policy: SnapshotPolicy) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    Self::init(conn, Some(path), policy).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, None, SnapshotPolicy::default()).await
  }

  async fn init(
    conn: tokio_rusqlite::Connection,
    path: Option<PathBuf>,
    policy: SnapshotPolicy,
  ) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(())
      })
      .await?;

    let report = conn
      .call(move |conn| {
        Ok(
          Migrator::new(CATALOG)
            .with_snapshot_policy(policy)
            .apply(conn, path.as_deref()),
        )
      })
      .await??;

    info!(
      from = report.from_version,
      to = report.to_version,
      applied = report.applied.len(),
      "store ready"
    );
    Ok(Self { conn, report })
  }

  /// What migrating on open did.
  pub fn migration_report(&self) -> &MigrationReport { &self.report }

  /// The highest applied migration version.
  pub async fn schema_version(&self) -> Result<u32> {
    Ok(self.conn.call(|conn| Ok(migrate::current_version(conn))).await?)
  }

  /// Close the underlying connection. Clones of this store fail from then on.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }
}

/// Outcome of a write that references other rows.
enum Write<T> {
  Done(T),
  /// A referenced row does not exist; carries its description.
  Missing(String),
}

impl<T> Write<T> {
  fn into_result(self) -> Result<T> {
    match self {
      Self::Done(v) => Ok(v),
      Self::Missing(what) => Err(Error::not_found(what)),
    }
  }
}

fn exists(conn: &Connection, table: &'static str, id: i64) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(&format!("SELECT 1 FROM {table} WHERE id = ?1"), [id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

/// Map a unique-constraint failure to a conflict naming `what`.
fn conflict_on_unique(what: &str) -> impl FnOnce(tokio_rusqlite::Error) -> Error + '_ {
  move |e| {
    if is_unique_violation(&e) {
      Error::conflict(what)
    } else {
      e.into()
    }
  }
}

// ─── Row loaders ─────────────────────────────────────────────────────────────
//
// Synchronous helpers run inside `call` closures.

fn load_contact(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawContact>> {
  conn
    .query_row(
      &format!("SELECT {CONTACT_COLUMNS} FROM contacts c WHERE c.id = ?1"),
      [id],
      RawContact::from_row,
    )
    .optional()
}

fn load_contact_tags(conn: &Connection, contact_id: i64) -> rusqlite::Result<Vec<RawTag>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {TAG_COLUMNS}
     FROM tags t
     JOIN contact_tags link ON link.tag_id = t.id
     WHERE link.contact_id = ?1
     ORDER BY t.nom"
  ))?;
  let rows = stmt
    .query_map([contact_id], RawTag::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn load_relations(
  conn: &Connection,
  contact_id: i64,
  only: Option<RelationType>,
) -> rusqlite::Result<Vec<RawRelated>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {RELATION_COLUMNS}, {SUMMARY_COLUMNS}
     FROM contact_relations r
     JOIN contacts x ON x.id = r.contact_lie_id
     WHERE r.contact_id = ?1
       AND (?2 IS NULL OR r.type_relation = ?2)
     ORDER BY r.type_relation, x.nom, x.prenom"
  ))?;
  let rows = stmt
    .query_map(
      rusqlite::params![contact_id, only.map(RelationType::code)],
      RawRelated::from_row,
    )?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn load_contact_detail(
  conn: &Connection,
  contact: RawContact,
) -> rusqlite::Result<RawContactDetail> {
  let tags = load_contact_tags(conn, contact.id)?;
  let relations = load_relations(conn, contact.id, None)?;
  Ok(RawContactDetail { contact, tags, relations })
}

fn load_tag(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawTag>> {
  conn
    .query_row(
      &format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.id = ?1"),
      [id],
      RawTag::from_row,
    )
    .optional()
}

fn load_job_site(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawJobSite>> {
  conn
    .query_row(
      &format!("SELECT {JOB_SITE_COLUMNS} FROM chantiers j WHERE j.id = ?1"),
      [id],
      RawJobSite::from_row,
    )
    .optional()
}

fn load_photos(conn: &Connection, job_site_id: i64) -> rusqlite::Result<Vec<RawPhoto>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PHOTO_COLUMNS} FROM photos p WHERE p.chantier_id = ?1 ORDER BY p.id DESC"
  ))?;
  let rows = stmt
    .query_map([job_site_id], RawPhoto::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn load_photo(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawPhoto>> {
  conn
    .query_row(
      &format!("SELECT {PHOTO_COLUMNS} FROM photos p WHERE p.id = ?1"),
      [id],
      RawPhoto::from_row,
    )
    .optional()
}

fn decode_all<R, T>(raws: Vec<R>, decode: fn(R) -> Result<T>) -> Result<Vec<T>> {
  raws.into_iter().map(decode).collect()
}

// ─── FlorizarStore impl ──────────────────────────────────────────────────────

impl FlorizarStore for SqliteStore {
  type Error = Error;

  // ── Contacts ──────────────────────────────────────────────────────────────

  async fn list_contacts(&self, filter: ContactFilter) -> Result<Vec<ContactDetail>> {
    let active = filter.active.map(i64::from);
    let kind = filter.kind.map(|k| k.code());

    let raws: Vec<RawContactDetail> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTACT_COLUMNS}
           FROM contacts c
           WHERE (?1 IS NULL OR c.actif = ?1)
             AND (?2 IS NULL OR c.type_personne = ?2)
           ORDER BY c.nom, c.prenom"
        ))?;
        let contacts = stmt
          .query_map(rusqlite::params![active, kind], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let details = contacts
          .into_iter()
          .map(|c| load_contact_detail(conn, c))
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(details)
      })
      .await?;

    decode_all(raws, RawContactDetail::into_detail)
  }

  async fn get_contact(&self, id: i64) -> Result<Option<ContactDetail>> {
    let raw: Option<RawContactDetail> = self
      .conn
      .call(move |conn| {
        let Some(contact) = load_contact(conn, id)? else {
          return Ok(None);
        };
        Ok(Some(load_contact_detail(conn, contact)?))
      })
      .await?;

    raw.map(RawContactDetail::into_detail).transpose()
  }

  async fn create_contact(&self, input: NewContact) -> Result<Contact> {
    let c = input.validate()?;
    let now = encode_dt(Utc::now());

    let raw: RawContact = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO contacts (
             type_personne, nom, prenom, raison_sociale, email, telephone,
             telephone_secondaire, adresse, ville, code_postal, pays, siret,
             tva_intracommunautaire, forme_juridique, actif, notes,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
          rusqlite::params![
            c.kind.code(),
            c.last_name,
            c.first_name,
            c.legal_name,
            c.email,
            c.phone,
            c.secondary_phone,
            c.address,
            c.city,
            c.postal_code,
            c.country,
            c.siret,
            c.vat_number,
            c.legal_form,
            c.active,
            c.notes,
            now,
          ],
        )?;
        let id = conn.last_insert_rowid();
        let row = load_contact(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(row)
      })
      .await?;

    debug!(id = raw.id, "contact created");
    raw.into_contact()
  }

  async fn update_contact(&self, id: i64, input: NewContact) -> Result<Option<Contact>> {
    let c = input.validate()?;
    let now = encode_dt(Utc::now());

    let raw: Option<RawContact> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE contacts SET
             type_personne = ?2, nom = ?3, prenom = ?4, raison_sociale = ?5,
             email = ?6, telephone = ?7, telephone_secondaire = ?8, adresse = ?9,
             ville = ?10, code_postal = ?11, pays = ?12, siret = ?13,
             tva_intracommunautaire = ?14, forme_juridique = ?15, actif = ?16,
             notes = ?17, updated_at = ?18
           WHERE id = ?1",
          rusqlite::params![
            id,
            c.kind.code(),
            c.last_name,
            c.first_name,
            c.legal_name,
            c.email,
            c.phone,
            c.secondary_phone,
            c.address,
            c.city,
            c.postal_code,
            c.country,
            c.siret,
            c.vat_number,
            c.legal_form,
            c.active,
            c.notes,
            now,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(load_contact(conn, id)?)
      })
      .await?;

    raw.map(RawContact::into_contact).transpose()
  }

  async fn delete_contact(&self, id: i64) -> Result<Option<Vec<Photo>>> {
    let photos: Option<Vec<RawPhoto>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let photos = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {PHOTO_COLUMNS}
             FROM photos p
             JOIN chantiers j ON j.id = p.chantier_id
             WHERE j.contact_id = ?1"
          ))?;
          stmt
            .query_map([id], RawPhoto::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        // Job sites, photos, tag links and relations in both directions go
        // with it through ON DELETE CASCADE.
        let deleted = tx.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok((deleted > 0).then_some(photos))
      })
      .await?;

    photos.map(|p| decode_all(p, RawPhoto::into_photo)).transpose()
  }

  async fn toggle_contact_active(&self, id: i64) -> Result<Option<Contact>> {
    let now = encode_dt(Utc::now());

    let raw: Option<RawContact> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE contacts
           SET actif = CASE WHEN actif = 0 THEN 1 ELSE 0 END, updated_at = ?2
           WHERE id = ?1",
          rusqlite::params![id, now],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(load_contact(conn, id)?)
      })
      .await?;

    raw.map(RawContact::into_contact).transpose()
  }

  async fn search_contacts(&self, term: String, filter: ContactFilter) -> Result<Vec<Contact>> {
    let pattern = format!("%{}%", term.trim());
    let active = filter.active.map(i64::from);
    let kind = filter.kind.map(|k| k.code());

    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTACT_COLUMNS}
           FROM contacts c
           WHERE (c.nom LIKE ?1 OR c.prenom LIKE ?1 OR c.raison_sociale LIKE ?1 OR c.email LIKE ?1)
             AND (?2 IS NULL OR c.actif = ?2)
             AND (?3 IS NULL OR c.type_personne = ?3)
           ORDER BY c.nom, c.prenom
           LIMIT ?4"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![pattern, active, kind, SEARCH_LIMIT],
            RawContact::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    decode_all(raws, RawContact::into_contact)
  }

  async fn contacts_by_tag(&self, tag_id: i64, active: Option<bool>) -> Result<Vec<Contact>> {
    let active = active.map(i64::from);

    let raws: Vec<RawContact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONTACT_COLUMNS}
           FROM contacts c
           JOIN contact_tags link ON link.contact_id = c.id
           WHERE link.tag_id = ?1
             AND (?2 IS NULL OR c.actif = ?2)
           ORDER BY c.nom, c.prenom"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![tag_id, active], RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    decode_all(raws, RawContact::into_contact)
  }

  async fn contact_stats(&self) -> Result<ContactStats> {
    let (counts, by_tag) = self
      .conn
      .call(|conn| {
        let counts: (i64, i64, i64, i64) = conn.query_row(
          "SELECT
             COUNT(*),
             COALESCE(SUM(actif <> 0), 0),
             COALESCE(SUM(type_personne = 'physique'), 0),
             COALESCE(SUM(type_personne = 'morale'), 0)
           FROM contacts",
          [],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let mut stmt = conn.prepare(
          "SELECT t.nom, t.couleur, COUNT(ct.contact_id) AS count
           FROM tags t
           LEFT JOIN contact_tags ct ON ct.tag_id = t.id
           GROUP BY t.id
           ORDER BY count DESC, t.nom",
        )?;
        let by_tag = stmt
          .query_map([], |row| {
            Ok(TagUsage {
              name:  row.get(0)?,
              color: row.get(1)?,
              count: u64::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((counts, by_tag))
      })
      .await?;

    let (total, active, individuals, organizations) = counts;
    let count = |n: i64| u64::try_from(n).unwrap_or(0);
    Ok(ContactStats {
      total: count(total),
      active: count(active),
      inactive: count(total - active),
      individuals: count(individuals),
      organizations: count(organizations),
      by_tag,
    })
  }

  // ── Contact tags ──────────────────────────────────────────────────────────

  async fn add_contact_tag(&self, contact_id: i64, tag_id: i64) -> Result<()> {
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        if !exists(conn, "contacts", contact_id)? {
          return Ok(Write::Missing(format!("contact {contact_id}")));
        }
        if !exists(conn, "tags", tag_id)? {
          return Ok(Write::Missing(format!("tag {tag_id}")));
        }
        conn.execute(
          "INSERT OR IGNORE INTO contact_tags (contact_id, tag_id, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![contact_id, tag_id, now],
        )?;
        Ok(Write::Done(()))
      })
      .await?
      .into_result()
  }

  async fn remove_contact_tag(&self, contact_id: i64, tag_id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM contact_tags WHERE contact_id = ?1 AND tag_id = ?2",
          [contact_id, tag_id],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  // ── Relations ─────────────────────────────────────────────────────────────

  async fn upsert_relation(&self, contact_id: i64, input: NewRelation) -> Result<ContactRelation> {
    let r = input.validate(contact_id)?;
    let now = encode_dt(Utc::now());
    let related_id = r.related_contact_id;
    let relation_type = r.relation_type.code();

    let raw: RawRelation = self
      .conn
      .call(move |conn| {
        for id in [contact_id, related_id] {
          if !exists(conn, "contacts", id)? {
            return Ok(Write::Missing(format!("contact {id}")));
          }
        }
        conn.execute(
          "INSERT INTO contact_relations
             (contact_id, contact_lie_id, type_relation, fonction, notes, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (contact_id, contact_lie_id, type_relation)
           DO UPDATE SET fonction = excluded.fonction, notes = excluded.notes",
          rusqlite::params![contact_id, related_id, relation_type, r.function, r.notes, now],
        )?;
        let row = conn.query_row(
          &format!(
            "SELECT {RELATION_COLUMNS} FROM contact_relations r
             WHERE r.contact_id = ?1 AND r.contact_lie_id = ?2 AND r.type_relation = ?3"
          ),
          rusqlite::params![contact_id, related_id, relation_type],
          RawRelation::from_row,
        )?;
        Ok(Write::Done(row))
      })
      .await?
      .into_result()?;

    raw.into_relation()
  }

  async fn remove_relation(&self, contact_id: i64, relation_id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM contact_relations WHERE id = ?2 AND contact_id = ?1",
          [contact_id, relation_id],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn relations(&self, contact_id: i64) -> Result<Vec<RelatedContact>> {
    let raws = self
      .conn
      .call(move |conn| Ok(load_relations(conn, contact_id, None)?))
      .await?;
    decode_all(raws, RawRelated::into_related)
  }

  async fn interlocutors(&self, contact_id: i64) -> Result<Vec<RelatedContact>> {
    let raws = self
      .conn
      .call(move |conn| {
        Ok(load_relations(conn, contact_id, Some(RelationType::Interlocutor))?)
      })
      .await?;
    decode_all(raws, RawRelated::into_related)
  }

  // ── Tags ──────────────────────────────────────────────────────────────────

  async fn list_tags(&self) -> Result<Vec<Tag>> {
    let raws: Vec<RawTag> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!("SELECT {TAG_COLUMNS} FROM tags t ORDER BY t.nom"))?;
        let rows = stmt
          .query_map([], RawTag::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_all(raws, RawTag::into_tag)
  }

  async fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
    let raw = self.conn.call(move |conn| Ok(load_tag(conn, id)?)).await?;
    raw.map(RawTag::into_tag).transpose()
  }

  async fn create_tag(&self, input: NewTag) -> Result<Tag> {
    let t = input.validate()?;
    let name = t.name.clone();
    let now = encode_dt(Utc::now());

    let raw: RawTag = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO tags (nom, couleur, description, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![t.name, t.color, t.description, now],
        )?;
        let id = conn.last_insert_rowid();
        let row = load_tag(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(row)
      })
      .await
      .map_err(conflict_on_unique(&format!("tag name {name:?}")))?;

    raw.into_tag()
  }

  async fn update_tag(&self, id: i64, input: NewTag) -> Result<Option<Tag>> {
    let t = input.validate()?;
    let name = t.name.clone();

    let raw: Option<RawTag> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE tags SET nom = ?2, couleur = ?3, description = ?4 WHERE id = ?1",
          rusqlite::params![id, t.name, t.color, t.description],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(load_tag(conn, id)?)
      })
      .await
      .map_err(conflict_on_unique(&format!("tag name {name:?}")))?;

    raw.map(RawTag::into_tag).transpose()
  }

  async fn delete_tag(&self, id: i64) -> Result<bool> {
    let (in_use, deleted) = self
      .conn
      .call(move |conn| {
        let in_use: i64 = conn.query_row(
          "SELECT COUNT(*) FROM contact_tags WHERE tag_id = ?1",
          [id],
          |row| row.get(0),
        )?;
        if in_use > 0 {
          return Ok((in_use, false));
        }
        let deleted = conn.execute("DELETE FROM tags WHERE id = ?1", [id])?;
        Ok((0, deleted > 0))
      })
      .await?;

    if in_use > 0 {
      return Err(Error::conflict(format!("tag {id} is used by {in_use} contact(s)")));
    }
    Ok(deleted)
  }

  async fn search_tags(&self, term: String) -> Result<Vec<Tag>> {
    let pattern = format!("%{}%", term.trim());

    let raws: Vec<RawTag> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TAG_COLUMNS} FROM tags t
           WHERE t.nom LIKE ?1 OR t.description LIKE ?1
           ORDER BY t.nom"
        ))?;
        let rows = stmt
          .query_map([pattern], RawTag::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_all(raws, RawTag::into_tag)
  }

  async fn top_tags(&self, limit: usize) -> Result<Vec<Tag>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawTag> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TAG_COLUMNS} FROM tags t
           ORDER BY contact_count DESC, t.nom
           LIMIT ?1"
        ))?;
        let rows = stmt
          .query_map([limit], RawTag::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_all(raws, RawTag::into_tag)
  }

  // ── Job sites ─────────────────────────────────────────────────────────────

  async fn list_job_sites(&self) -> Result<Vec<JobSiteSummary>> {
    let raws: Vec<RawJobSiteWithContact> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {JOB_SITE_COLUMNS}, {SUMMARY_COLUMNS}
           FROM chantiers j
           LEFT JOIN contacts x ON x.id = j.contact_id
           ORDER BY j.date_debut DESC, j.id DESC"
        ))?;
        let rows = stmt
          .query_map([], RawJobSiteWithContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_all(raws, RawJobSiteWithContact::into_summary)
  }

  async fn get_job_site(&self, id: i64) -> Result<Option<JobSiteDetail>> {
    let raw: Option<RawJobSiteDetail> = self
      .conn
      .call(move |conn| {
        let job_site = conn
          .query_row(
            &format!(
              "SELECT {JOB_SITE_COLUMNS}, {SUMMARY_COLUMNS}
               FROM chantiers j
               LEFT JOIN contacts x ON x.id = j.contact_id
               WHERE j.id = ?1"
            ),
            [id],
            RawJobSiteWithContact::from_row,
          )
          .optional()?;
        let Some(job_site) = job_site else {
          return Ok(None);
        };
        let photos = load_photos(conn, id)?;
        Ok(Some(RawJobSiteDetail { job_site, photos }))
      })
      .await?;

    raw.map(RawJobSiteDetail::into_detail).transpose()
  }

  async fn job_sites_for_contact(&self, contact_id: i64) -> Result<Vec<JobSite>> {
    let raws: Vec<RawJobSite> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {JOB_SITE_COLUMNS} FROM chantiers j
           WHERE j.contact_id = ?1
           ORDER BY j.date_debut DESC, j.id DESC"
        ))?;
        let rows = stmt
          .query_map([contact_id], RawJobSite::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_all(raws, RawJobSite::into_job_site)
  }

  async fn create_job_site(&self, input: NewJobSite) -> Result<JobSite> {
    let j = input.validate()?;
    let now = encode_dt(Utc::now());

    let raw: RawJobSite = self
      .conn
      .call(move |conn| {
        if !exists(conn, "contacts", j.contact_id)? {
          return Ok(Write::Missing(format!("contact {}", j.contact_id)));
        }
        conn.execute(
          "INSERT INTO chantiers (
             contact_id, nom, adresse, ville, code_postal, date_debut, date_fin,
             statut, priorite, description, travaux_realises, travaux_a_faire,
             budget_estime, cout_reel, superficie, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)",
          rusqlite::params![
            j.contact_id,
            j.name,
            j.address,
            j.city,
            j.postal_code,
            encode_date(j.start_date),
            j.end_date.map(encode_date),
            j.status.code(),
            j.priority.code(),
            j.description,
            j.work_done,
            j.work_todo,
            j.budget_estimate,
            j.actual_cost,
            j.area,
            now,
          ],
        )?;
        let id = conn.last_insert_rowid();
        let row = load_job_site(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(Write::Done(row))
      })
      .await?
      .into_result()?;

    debug!(id = raw.id, contact_id = raw.contact_id, "job site created");
    raw.into_job_site()
  }

  async fn update_job_site(&self, id: i64, input: NewJobSite) -> Result<Option<JobSite>> {
    let j = input.validate()?;
    let now = encode_dt(Utc::now());

    let raw: Option<RawJobSite> = self
      .conn
      .call(move |conn| {
        if !exists(conn, "chantiers", id)? {
          return Ok(Write::Done(None));
        }
        if !exists(conn, "contacts", j.contact_id)? {
          return Ok(Write::Missing(format!("contact {}", j.contact_id)));
        }
        conn.execute(
          "UPDATE chantiers SET
             contact_id = ?2, nom = ?3, adresse = ?4, ville = ?5, code_postal = ?6,
             date_debut = ?7, date_fin = ?8, statut = ?9, priorite = ?10,
             description = ?11, travaux_realises = ?12, travaux_a_faire = ?13,
             budget_estime = ?14, cout_reel = ?15, superficie = ?16, updated_at = ?17
           WHERE id = ?1",
          rusqlite::params![
            id,
            j.contact_id,
            j.name,
            j.address,
            j.city,
            j.postal_code,
            encode_date(j.start_date),
            j.end_date.map(encode_date),
            j.status.code(),
            j.priority.code(),
            j.description,
            j.work_done,
            j.work_todo,
            j.budget_estimate,
            j.actual_cost,
            j.area,
            now,
          ],
        )?;
        Ok(Write::Done(load_job_site(conn, id)?))
      })
      .await?
      .into_result()?;

    raw.map(RawJobSite::into_job_site).transpose()
  }

  async fn delete_job_site(&self, id: i64) -> Result<Option<Vec<Photo>>> {
    let photos: Option<Vec<RawPhoto>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let photos = load_photos(&tx, id)?;
        let deleted = tx.execute("DELETE FROM chantiers WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok((deleted > 0).then_some(photos))
      })
      .await?;

    photos.map(|p| decode_all(p, RawPhoto::into_photo)).transpose()
  }

  // ── Photos ────────────────────────────────────────────────────────────────

  async fn add_photo(&self, input: NewPhoto) -> Result<Photo> {
    let now = encode_dt(Utc::now());

    let raw: RawPhoto = self
      .conn
      .call(move |conn| {
        if !exists(conn, "chantiers", input.job_site_id)? {
          return Ok(Write::Missing(format!("job site {}", input.job_site_id)));
        }
        conn.execute(
          "INSERT INTO photos (chantier_id, filename, original_name, description, uploaded_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            input.job_site_id,
            input.filename,
            input.original_name,
            input.description,
            now,
          ],
        )?;
        let id = conn.last_insert_rowid();
        let row = load_photo(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(Write::Done(row))
      })
      .await?
      .into_result()?;

    raw.into_photo()
  }

  async fn get_photo(&self, id: i64) -> Result<Option<Photo>> {
    let raw = self.conn.call(move |conn| Ok(load_photo(conn, id)?)).await?;
    raw.map(RawPhoto::into_photo).transpose()
  }

  async fn photos_for_job_site(&self, job_site_id: i64) -> Result<Vec<Photo>> {
    let raws = self
      .conn
      .call(move |conn| Ok(load_photos(conn, job_site_id)?))
      .await?;
    decode_all(raws, RawPhoto::into_photo)
  }

  async fn update_photo_description(
    &self,
    id: i64,
    description: Option<String>,
  ) -> Result<Option<Photo>> {
    let raw: Option<RawPhoto> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE photos SET description = ?2 WHERE id = ?1",
          rusqlite::params![id, description],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(load_photo(conn, id)?)
      })
      .await?;

    raw.map(RawPhoto::into_photo).transpose()
  }

  async fn delete_photo(&self, id: i64) -> Result<Option<Photo>> {
    let raw: Option<RawPhoto> = self
      .conn
      .call(move |conn| {
        let Some(photo) = load_photo(conn, id)? else {
          return Ok(None);
        };
        conn.execute("DELETE FROM photos WHERE id = ?1", [id])?;
        Ok(Some(photo))
      })
      .await?;

    raw.map(RawPhoto::into_photo).transpose()
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let now = encode_dt(Utc::now());

    let raw: RawUser = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (username, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![input.username, input.email, input.password_hash, now],
        )?;
        Ok(RawUser {
          id:         conn.last_insert_rowid(),
          username:   input.username,
          email:      input.email,
          password:   input.password_hash,
          created_at: Some(now),
        })
      })
      .await
      .map_err(conflict_on_unique("username or email already registered"))?;

    Ok(raw.into_credentials()?.user)
  }

  async fn find_user(&self, username: String) -> Result<Option<UserCredentials>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, username, email, password, created_at FROM users WHERE username = ?1",
              [username],
              |row| {
                Ok(RawUser {
                  id:         row.get(0)?,
                  username:   row.get(1)?,
                  email:      row.get(2)?,
                  password:   row.get(3)?,
                  created_at: row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_credentials).transpose()
  }

  // ── Schema ────────────────────────────────────────────────────────────────

  async fn migration_log(&self) -> Result<Vec<MigrationRecord>> {
    let raws: Vec<RawMigration> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT version, name, executed_at FROM migrations ORDER BY version")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawMigration {
              version:     row.get(0)?,
              name:        row.get(1)?,
              executed_at: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    decode_all(raws, RawMigration::into_record)
  }
}
