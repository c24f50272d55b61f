//! v001: the "client" generation of the schema (users, clients, chantiers, photos).
//!
//! Databases written before the migration log existed already have these
//! tables, so every statement is create-if-absent and the migration only
//! records them.

use rusqlite::Transaction;

pub fn migrate(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch(
    "
    CREATE TABLE IF NOT EXISTS users (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        username   TEXT UNIQUE NOT NULL,
        email      TEXT UNIQUE NOT NULL,
        password   TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS clients (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        nom         TEXT NOT NULL,
        prenom      TEXT,
        entreprise  TEXT,
        telephone   TEXT,
        email       TEXT,
        adresse     TEXT,
        ville       TEXT,
        code_postal TEXT,
        notes       TEXT,
        created_at  DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at  DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS chantiers (
        id                   INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id            INTEGER NOT NULL,
        titre                TEXT NOT NULL,
        date_debut           DATE NOT NULL,
        date_fin             DATE,
        statut               TEXT DEFAULT 'en_cours',
        resume_travaux       TEXT,
        notes_prochaine_fois TEXT,
        created_at           DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at           DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS photos (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        chantier_id   INTEGER NOT NULL,
        filename      TEXT NOT NULL,
        original_name TEXT NOT NULL,
        description   TEXT,
        uploaded_at   DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (chantier_id) REFERENCES chantiers(id) ON DELETE CASCADE
    );
    ",
  )
}
