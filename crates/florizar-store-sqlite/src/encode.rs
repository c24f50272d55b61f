//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps written by this crate are RFC 3339 strings. Rows written by
//! earlier versions of the application, or filled in by a column's
//! `CURRENT_TIMESTAMP` default, use SQLite's `YYYY-MM-DD HH:MM:SS` (UTC) form;
//! both are accepted on read. Dates are `YYYY-MM-DD`. Enumerations are stored
//! as their French storage codes, booleans as 0/1.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use florizar_core::{
  contact::{Contact, ContactDetail, ContactSummary, PersonKind},
  job_site::{JobSite, JobSiteDetail, JobSiteSummary, JobStatus, Priority},
  migration::MigrationRecord,
  photo::Photo,
  relation::{ContactRelation, RelatedContact, RelationType},
  tag::Tag,
  user::{User, UserCredentials},
};
use rusqlite::Row;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    .map(|naive| naive.and_utc())
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

/// Missing timestamps only occur on hand-edited legacy rows; they read as the
/// epoch rather than failing the whole query.
fn decode_dt_or_epoch(s: Option<&str>) -> Result<DateTime<Utc>> {
  s.map(decode_dt).transpose().map(|dt| dt.unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  // Some legacy rows carry a time part after the date.
  let day = s.get(..10).unwrap_or(s);
  NaiveDate::parse_from_str(day, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns read into [`RawContact`], in order. `c` is the table alias.
pub const CONTACT_COLUMNS: &str = "c.id, c.type_personne, c.nom, c.prenom, \
   c.raison_sociale, c.email, c.telephone, c.telephone_secondaire, c.adresse, \
   c.ville, c.code_postal, c.pays, c.siret, c.tva_intracommunautaire, \
   c.forme_juridique, c.actif, c.notes, c.created_at, c.updated_at";

/// Raw values read directly from a `contacts` row.
pub struct RawContact {
  pub id:                     i64,
  pub type_personne:          String,
  pub nom:                    String,
  pub prenom:                 Option<String>,
  pub raison_sociale:         Option<String>,
  pub email:                  Option<String>,
  pub telephone:              Option<String>,
  pub telephone_secondaire:   Option<String>,
  pub adresse:                Option<String>,
  pub ville:                  Option<String>,
  pub code_postal:            Option<String>,
  pub pays:                   Option<String>,
  pub siret:                  Option<String>,
  pub tva_intracommunautaire: Option<String>,
  pub forme_juridique:        Option<String>,
  pub actif:                  i64,
  pub notes:                  Option<String>,
  pub created_at:             Option<String>,
  pub updated_at:             Option<String>,
}

impl RawContact {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                     row.get(0)?,
      type_personne:          row.get(1)?,
      nom:                    row.get(2)?,
      prenom:                 row.get(3)?,
      raison_sociale:         row.get(4)?,
      email:                  row.get(5)?,
      telephone:              row.get(6)?,
      telephone_secondaire:   row.get(7)?,
      adresse:                row.get(8)?,
      ville:                  row.get(9)?,
      code_postal:            row.get(10)?,
      pays:                   row.get(11)?,
      siret:                  row.get(12)?,
      tva_intracommunautaire: row.get(13)?,
      forme_juridique:        row.get(14)?,
      actif:                  row.get(15)?,
      notes:                  row.get(16)?,
      created_at:             row.get(17)?,
      updated_at:             row.get(18)?,
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    Ok(Contact {
      id:              self.id,
      kind:            PersonKind::from_code(&self.type_personne)?,
      last_name:       self.nom,
      first_name:      self.prenom,
      legal_name:      self.raison_sociale,
      email:           self.email,
      phone:           self.telephone,
      secondary_phone: self.telephone_secondaire,
      address:         self.adresse,
      city:            self.ville,
      postal_code:     self.code_postal,
      country:         self.pays,
      siret:           self.siret,
      vat_number:      self.tva_intracommunautaire,
      legal_form:      self.forme_juridique,
      active:          self.actif != 0,
      notes:           self.notes,
      created_at:      decode_dt_or_epoch(self.created_at.as_deref())?,
      updated_at:      decode_dt_or_epoch(self.updated_at.as_deref())?,
    })
  }
}

/// Columns read into [`RawSummary`] from a contacts table aliased `x`.
pub const SUMMARY_COLUMNS: &str =
  "x.id, x.type_personne, x.nom, x.prenom, x.raison_sociale, x.email, x.telephone";

pub struct RawSummary {
  pub id:             i64,
  pub type_personne:  String,
  pub nom:            String,
  pub prenom:         Option<String>,
  pub raison_sociale: Option<String>,
  pub email:          Option<String>,
  pub telephone:      Option<String>,
}

impl RawSummary {
  /// Read the summary starting at column `at`.
  pub fn from_row_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(at)?,
      type_personne:  row.get(at + 1)?,
      nom:            row.get(at + 2)?,
      prenom:         row.get(at + 3)?,
      raison_sociale: row.get(at + 4)?,
      email:          row.get(at + 5)?,
      telephone:      row.get(at + 6)?,
    })
  }

  pub fn into_summary(self) -> Result<ContactSummary> {
    Ok(ContactSummary {
      id:         self.id,
      kind:       PersonKind::from_code(&self.type_personne)?,
      last_name:  self.nom,
      first_name: self.prenom,
      legal_name: self.raison_sociale,
      email:      self.email,
      phone:      self.telephone,
    })
  }
}

/// Tag columns plus the number of contacts carrying the tag.
pub const TAG_COLUMNS: &str = "t.id, t.nom, t.couleur, t.description, t.created_at, \
   (SELECT COUNT(*) FROM contact_tags ct WHERE ct.tag_id = t.id) AS contact_count";

pub struct RawTag {
  pub id:            i64,
  pub nom:           String,
  pub couleur:       String,
  pub description:   Option<String>,
  pub created_at:    Option<String>,
  pub contact_count: i64,
}

impl RawTag {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      nom:           row.get(1)?,
      couleur:       row.get(2)?,
      description:   row.get(3)?,
      created_at:    row.get(4)?,
      contact_count: row.get(5)?,
    })
  }

  pub fn into_tag(self) -> Result<Tag> {
    Ok(Tag {
      id:            self.id,
      name:          self.nom,
      color:         self.couleur,
      description:   self.description,
      created_at:    decode_dt_or_epoch(self.created_at.as_deref())?,
      contact_count: u64::try_from(self.contact_count).unwrap_or(0),
    })
  }
}

/// Relation columns followed by the related contact's summary columns.
pub const RELATION_COLUMNS: &str = "r.id, r.contact_id, r.contact_lie_id, \
   r.type_relation, r.fonction, r.notes, r.created_at";

pub struct RawRelation {
  pub id:             i64,
  pub contact_id:     i64,
  pub contact_lie_id: i64,
  pub type_relation:  String,
  pub fonction:       Option<String>,
  pub notes:          Option<String>,
  pub created_at:     Option<String>,
}

impl RawRelation {
  pub const WIDTH: usize = 7;

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      contact_id:     row.get(1)?,
      contact_lie_id: row.get(2)?,
      type_relation:  row.get(3)?,
      fonction:       row.get(4)?,
      notes:          row.get(5)?,
      created_at:     row.get(6)?,
    })
  }

  pub fn into_relation(self) -> Result<ContactRelation> {
    Ok(ContactRelation {
      id:                 self.id,
      contact_id:         self.contact_id,
      related_contact_id: self.contact_lie_id,
      relation_type:      RelationType::from_code(&self.type_relation)?,
      function:           self.fonction,
      notes:              self.notes,
      created_at:         decode_dt_or_epoch(self.created_at.as_deref())?,
    })
  }
}

/// A relation row joined with the contact it points at.
pub struct RawRelated {
  pub relation: RawRelation,
  pub related:  RawSummary,
}

impl RawRelated {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      relation: RawRelation::from_row(row)?,
      related:  RawSummary::from_row_at(row, RawRelation::WIDTH)?,
    })
  }

  pub fn into_related(self) -> Result<RelatedContact> {
    Ok(RelatedContact {
      relation: self.relation.into_relation()?,
      related:  self.related.into_summary()?,
    })
  }
}

/// Columns read into [`RawJobSite`]. `j` is the table alias.
pub const JOB_SITE_COLUMNS: &str = "j.id, j.contact_id, j.nom, j.adresse, j.ville, \
   j.code_postal, j.date_debut, j.date_fin, j.statut, j.priorite, j.description, \
   j.travaux_realises, j.travaux_a_faire, j.budget_estime, j.cout_reel, \
   j.superficie, j.created_at, j.updated_at";

pub struct RawJobSite {
  pub id:               i64,
  pub contact_id:       i64,
  pub nom:              String,
  pub adresse:          Option<String>,
  pub ville:            Option<String>,
  pub code_postal:      Option<String>,
  pub date_debut:       String,
  pub date_fin:         Option<String>,
  pub statut:           String,
  pub priorite:         String,
  pub description:      Option<String>,
  pub travaux_realises: Option<String>,
  pub travaux_a_faire:  Option<String>,
  pub budget_estime:    Option<f64>,
  pub cout_reel:        Option<f64>,
  pub superficie:       Option<f64>,
  pub created_at:       Option<String>,
  pub updated_at:       Option<String>,
}

impl RawJobSite {
  pub const WIDTH: usize = 18;

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      contact_id:       row.get(1)?,
      nom:              row.get(2)?,
      adresse:          row.get(3)?,
      ville:            row.get(4)?,
      code_postal:      row.get(5)?,
      date_debut:       row.get(6)?,
      date_fin:         row.get(7)?,
      statut:           row.get(8)?,
      priorite:         row.get(9)?,
      description:      row.get(10)?,
      travaux_realises: row.get(11)?,
      travaux_a_faire:  row.get(12)?,
      budget_estime:    row.get(13)?,
      cout_reel:        row.get(14)?,
      superficie:       row.get(15)?,
      created_at:       row.get(16)?,
      updated_at:       row.get(17)?,
    })
  }

  pub fn into_job_site(self) -> Result<JobSite> {
    Ok(JobSite {
      id:              self.id,
      contact_id:      self.contact_id,
      name:            self.nom,
      address:         self.adresse,
      city:            self.ville,
      postal_code:     self.code_postal,
      start_date:      decode_date(&self.date_debut)?,
      end_date:        self.date_fin.as_deref().map(decode_date).transpose()?,
      status:          JobStatus::from_code(&self.statut)?,
      priority:        Priority::from_code(&self.priorite)?,
      description:     self.description,
      work_done:       self.travaux_realises,
      work_todo:       self.travaux_a_faire,
      budget_estimate: self.budget_estime,
      actual_cost:     self.cout_reel,
      area:            self.superficie,
      created_at:      decode_dt_or_epoch(self.created_at.as_deref())?,
      updated_at:      decode_dt_or_epoch(self.updated_at.as_deref())?,
    })
  }
}

/// A job-site row left-joined with its owner's summary; the summary columns
/// are NULL when the owner is gone.
pub struct RawJobSiteWithContact {
  pub job_site: RawJobSite,
  pub contact:  Option<RawSummary>,
}

impl RawJobSiteWithContact {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let job_site = RawJobSite::from_row(row)?;
    let owner_id: Option<i64> = row.get(RawJobSite::WIDTH)?;
    let contact = match owner_id {
      Some(_) => Some(RawSummary::from_row_at(row, RawJobSite::WIDTH)?),
      None => None,
    };
    Ok(Self { job_site, contact })
  }

  pub fn into_summary(self) -> Result<JobSiteSummary> {
    Ok(JobSiteSummary {
      job_site: self.job_site.into_job_site()?,
      contact:  self.contact.map(RawSummary::into_summary).transpose()?,
    })
  }
}

pub const PHOTO_COLUMNS: &str =
  "p.id, p.chantier_id, p.filename, p.original_name, p.description, p.uploaded_at";

pub struct RawPhoto {
  pub id:            i64,
  pub chantier_id:   i64,
  pub filename:      String,
  pub original_name: String,
  pub description:   Option<String>,
  pub uploaded_at:   Option<String>,
}

impl RawPhoto {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      chantier_id:   row.get(1)?,
      filename:      row.get(2)?,
      original_name: row.get(3)?,
      description:   row.get(4)?,
      uploaded_at:   row.get(5)?,
    })
  }

  pub fn into_photo(self) -> Result<Photo> {
    Ok(Photo {
      id:            self.id,
      job_site_id:   self.chantier_id,
      filename:      self.filename,
      original_name: self.original_name,
      description:   self.description,
      uploaded_at:   decode_dt_or_epoch(self.uploaded_at.as_deref())?,
    })
  }
}

/// A contact row with everything `GET /contacts/:id` shows alongside it.
pub struct RawContactDetail {
  pub contact:   RawContact,
  pub tags:      Vec<RawTag>,
  pub relations: Vec<RawRelated>,
}

impl RawContactDetail {
  pub fn into_detail(self) -> Result<ContactDetail> {
    Ok(ContactDetail {
      contact:   self.contact.into_contact()?,
      tags:      self.tags.into_iter().map(RawTag::into_tag).collect::<Result<_>>()?,
      relations: self
        .relations
        .into_iter()
        .map(RawRelated::into_related)
        .collect::<Result<_>>()?,
    })
  }
}

pub struct RawJobSiteDetail {
  pub job_site: RawJobSiteWithContact,
  pub photos:   Vec<RawPhoto>,
}

impl RawJobSiteDetail {
  pub fn into_detail(self) -> Result<JobSiteDetail> {
    let summary = self.job_site.into_summary()?;
    Ok(JobSiteDetail {
      job_site: summary.job_site,
      contact:  summary.contact,
      photos:   self.photos.into_iter().map(RawPhoto::into_photo).collect::<Result<_>>()?,
    })
  }
}

pub struct RawUser {
  pub id:         i64,
  pub username:   String,
  pub email:      String,
  pub password:   String,
  pub created_at: Option<String>,
}

impl RawUser {
  pub fn into_credentials(self) -> Result<UserCredentials> {
    Ok(UserCredentials {
      user:          User {
        id:         self.id,
        username:   self.username,
        email:      self.email,
        created_at: decode_dt_or_epoch(self.created_at.as_deref())?,
      },
      password_hash: self.password,
    })
  }
}

pub struct RawMigration {
  pub version:     i64,
  pub name:        String,
  pub executed_at: Option<String>,
}

impl RawMigration {
  pub fn into_record(self) -> Result<MigrationRecord> {
    Ok(MigrationRecord {
      version:    u32::try_from(self.version)
        .map_err(|_| Error::Corrupt(format!("migration version {}", self.version)))?,
      name:       self.name,
      applied_at: decode_dt_or_epoch(self.executed_at.as_deref())?,
    })
  }
}
