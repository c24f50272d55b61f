//! v002: clients become contacts; tags and contact relations appear.
//!
//! SQLite cannot retype or rename columns in place, so both `clients` and
//! `chantiers` are rebuilt: create the new shape under a temporary name, copy
//! every row across keeping its id, drop the old table, rename the new one
//! into place. Ids are preserved so `chantiers.contact_id` and
//! `photos.chantier_id` keep resolving.
//!
//! Every carried-over client becomes an individual (`physique`) with no
//! organization fields, its `entreprise` moving to `raison_sociale`, and is
//! tagged `Client`.

use rusqlite::Transaction;

/// Default tag taxonomy: (name, color, description).
pub const SEED_TAGS: &[(&str, &str, &str)] = &[
  ("Client", "#10b981", "Client actif"),
  ("Prospect", "#3b82f6", "Client potentiel"),
  ("Fournisseur", "#f59e0b", "Fournisseur de matériel ou de végétaux"),
  ("Partenaire", "#8b5cf6", "Partenaire commercial"),
  ("Sous-traitant", "#ef4444", "Entreprise sous-traitante"),
];

/// Tag given to every migrated client.
pub const DEFAULT_TAG: &str = "Client";

pub fn migrate(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  copy_clients(tx)?;
  copy_chantiers(tx)?;
  swap_tables(tx)?;
  create_tag_tables(tx)?;
  seed_tags(tx)?;
  create_indexes(tx)
}

fn copy_clients(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch(
    "
    CREATE TABLE IF NOT EXISTS contacts_new (
        id                     INTEGER PRIMARY KEY AUTOINCREMENT,
        type_personne          TEXT NOT NULL DEFAULT 'physique'
                               CHECK (type_personne IN ('physique', 'morale')),
        nom                    TEXT NOT NULL,
        prenom                 TEXT,
        raison_sociale         TEXT,
        email                  TEXT,
        telephone              TEXT,
        telephone_secondaire   TEXT,
        adresse                TEXT,
        ville                  TEXT,
        code_postal            TEXT,
        pays                   TEXT DEFAULT 'France',
        siret                  TEXT,
        tva_intracommunautaire TEXT,
        forme_juridique        TEXT,
        actif                  INTEGER NOT NULL DEFAULT 1,
        notes                  TEXT,
        created_at             DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at             DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    INSERT INTO contacts_new (
        id, type_personne, nom, prenom, raison_sociale, email, telephone,
        adresse, ville, code_postal, notes, created_at, updated_at
    )
    SELECT
        id, 'physique', nom, prenom, entreprise, email, telephone,
        adresse, ville, code_postal, notes, created_at, updated_at
    FROM clients;
    ",
  )
}

fn copy_chantiers(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  // References `contacts`, the name `contacts_new` is about to take.
  tx.execute_batch(
    "
    CREATE TABLE IF NOT EXISTS chantiers_new (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        contact_id       INTEGER NOT NULL,
        nom              TEXT NOT NULL,
        adresse          TEXT,
        ville            TEXT,
        code_postal      TEXT,
        date_debut       DATE NOT NULL,
        date_fin         DATE,
        statut           TEXT NOT NULL DEFAULT 'planifie'
                         CHECK (statut IN ('planifie', 'en_cours', 'termine', 'annule')),
        priorite         TEXT NOT NULL DEFAULT 'moyenne',
        description      TEXT,
        travaux_realises TEXT,
        travaux_a_faire  TEXT,
        budget_estime    REAL,
        cout_reel        REAL,
        superficie       REAL,
        created_at       DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at       DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
    );

    INSERT INTO chantiers_new (
        id, contact_id, nom, date_debut, date_fin, statut,
        travaux_realises, travaux_a_faire, created_at, updated_at
    )
    SELECT
        id, client_id, titre, date_debut, date_fin, COALESCE(statut, 'en_cours'),
        resume_travaux, notes_prochaine_fois, created_at, updated_at
    FROM chantiers;
    ",
  )
}

fn swap_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch(
    "
    DROP TABLE chantiers;
    DROP TABLE clients;
    ALTER TABLE contacts_new  RENAME TO contacts;
    ALTER TABLE chantiers_new RENAME TO chantiers;
    ",
  )
}

fn create_tag_tables(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch(
    "
    CREATE TABLE IF NOT EXISTS tags (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        nom         TEXT UNIQUE NOT NULL,
        couleur     TEXT NOT NULL DEFAULT '#6b7280',
        description TEXT,
        created_at  DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS contact_tags (
        contact_id INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
        tag_id     INTEGER NOT NULL REFERENCES tags(id)     ON DELETE CASCADE,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (contact_id, tag_id)
    );

    CREATE TABLE IF NOT EXISTS contact_relations (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        contact_id     INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
        contact_lie_id INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
        type_relation  TEXT NOT NULL,
        fonction       TEXT,
        notes          TEXT,
        created_at     DATETIME DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (contact_id, contact_lie_id, type_relation)
    );
    ",
  )
}

fn seed_tags(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  let mut insert = tx.prepare(
    "INSERT OR IGNORE INTO tags (nom, couleur, description) VALUES (?1, ?2, ?3)",
  )?;
  for (name, color, description) in SEED_TAGS {
    insert.execute(rusqlite::params![name, color, description])?;
  }

  tx.execute(
    "INSERT OR IGNORE INTO contact_tags (contact_id, tag_id)
     SELECT c.id, t.id FROM contacts c JOIN tags t ON t.nom = ?1",
    rusqlite::params![DEFAULT_TAG],
  )?;
  Ok(())
}

fn create_indexes(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch(
    "
    CREATE INDEX IF NOT EXISTS contacts_nom_idx         ON contacts(nom, prenom);
    CREATE INDEX IF NOT EXISTS contacts_type_idx        ON contacts(type_personne);
    CREATE INDEX IF NOT EXISTS contacts_actif_idx       ON contacts(actif);
    CREATE INDEX IF NOT EXISTS chantiers_contact_idx    ON chantiers(contact_id);
    CREATE INDEX IF NOT EXISTS chantiers_debut_idx      ON chantiers(date_debut);
    CREATE INDEX IF NOT EXISTS photos_chantier_idx      ON photos(chantier_id);
    CREATE INDEX IF NOT EXISTS contact_tags_tag_idx     ON contact_tags(tag_id);
    CREATE INDEX IF NOT EXISTS relations_contact_idx    ON contact_relations(contact_id);
    CREATE INDEX IF NOT EXISTS relations_lie_idx        ON contact_relations(contact_lie_id);
    ",
  )
}
