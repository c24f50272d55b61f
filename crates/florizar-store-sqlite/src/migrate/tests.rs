use std::path::PathBuf;

use rusqlite::{Connection, Transaction};
use tempfile::TempDir;

use super::*;

fn db_in(dir: &TempDir) -> (PathBuf, Connection) {
  let path = dir.path().join("database.sqlite");
  let conn = Connection::open(&path).unwrap();
  conn
    .execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
    .unwrap();
  (path, conn)
}

fn table_exists(conn: &Connection, name: &str) -> bool {
  conn
    .query_row(
      "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
      [name],
      |row| row.get::<_, i64>(0),
    )
    .unwrap()
    > 0
}

fn count(conn: &Connection, sql: &str) -> i64 {
  conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

fn log(conn: &Connection) -> Vec<(u32, String)> {
  let mut stmt = conn
    .prepare("SELECT version, name FROM migrations ORDER BY version")
    .unwrap();
  stmt
    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
    .unwrap()
    .collect::<rusqlite::Result<Vec<_>>>()
    .unwrap()
}

/// A database as written by the client-generation application: the four v1
/// tables and no migration log.
fn seed_legacy(conn: &Connection) {
  conn
    .execute_batch(
      "
      CREATE TABLE users (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          username TEXT UNIQUE NOT NULL,
          email TEXT UNIQUE NOT NULL,
          password TEXT NOT NULL,
          created_at DATETIME DEFAULT CURRENT_TIMESTAMP
      );
      CREATE TABLE clients (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          nom TEXT NOT NULL, prenom TEXT, entreprise TEXT, telephone TEXT,
          email TEXT, adresse TEXT, ville TEXT, code_postal TEXT, notes TEXT,
          created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
          updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
      );
      CREATE TABLE chantiers (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          client_id INTEGER NOT NULL,
          titre TEXT NOT NULL,
          date_debut DATE NOT NULL, date_fin DATE,
          statut TEXT DEFAULT 'en_cours',
          resume_travaux TEXT, notes_prochaine_fois TEXT,
          created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
          updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
          FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE
      );
      CREATE TABLE photos (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          chantier_id INTEGER NOT NULL,
          filename TEXT NOT NULL, original_name TEXT NOT NULL, description TEXT,
          uploaded_at DATETIME DEFAULT CURRENT_TIMESTAMP,
          FOREIGN KEY (chantier_id) REFERENCES chantiers(id) ON DELETE CASCADE
      );

      INSERT INTO clients (id, nom, prenom, entreprise, telephone, ville)
      VALUES (7, 'Dupont', 'Jean', 'Dupont Paysage', '0601020304', 'Lyon'),
             (12, 'Martin', NULL, NULL, NULL, NULL);
      INSERT INTO chantiers (id, client_id, titre, date_debut, statut, resume_travaux, notes_prochaine_fois)
      VALUES (3, 7, 'Taille de haies', '2023-04-02', NULL, 'Haies taillées', 'Tondre la pelouse'),
             (4, 12, 'Plantation', '2023-05-10', 'termine', NULL, NULL);
      INSERT INTO photos (id, chantier_id, filename, original_name)
      VALUES (1, 3, 'a.jpg', 'haie.jpg');
      ",
    )
    .unwrap();
}

fn create_widgets(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch("CREATE TABLE widgets (id INTEGER PRIMARY KEY);")
}

fn broken(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch("CREATE TABLE gadgets (id INTEGER PRIMARY KEY); INSERT INTO nowhere VALUES (1);")
}

const FAILING_CATALOG: &[Migration] = &[
  Migration { version: 1, name: "widgets", up: create_widgets },
  Migration { version: 2, name: "broken", up: broken },
];

/// Commits behind the run's back, so rolling the run back cannot undo it.
fn commit_early(tx: &Transaction<'_>) -> rusqlite::Result<()> {
  tx.execute_batch("CREATE TABLE escaped (id INTEGER PRIMARY KEY); COMMIT; BEGIN;")
}

const ESCAPING_CATALOG: &[Migration] = &[
  Migration { version: 1, name: "escaped", up: commit_early },
  Migration { version: 2, name: "broken", up: broken },
];

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[test]
fn catalog_is_contiguous_from_one() {
  for (i, m) in CATALOG.iter().enumerate() {
    assert_eq!(m.version as usize, i + 1);
  }
  assert_eq!(latest_version(CATALOG), 2);
  assert_eq!(latest_version(&[]), 0);
}

#[test]
fn pending_only_lists_newer_versions() {
  let migrator = Migrator::new(CATALOG);
  let versions = |from| migrator.pending(from).iter().map(|m| m.version).collect::<Vec<_>>();
  assert_eq!(versions(0), vec![1, 2]);
  assert_eq!(versions(1), vec![2]);
  assert!(versions(2).is_empty());
}

#[test]
fn current_version_without_log_is_zero() {
  let conn = Connection::open_in_memory().unwrap();
  assert_eq!(current_version(&conn), 0);
}

// ─── Fresh databases ─────────────────────────────────────────────────────────

#[test]
fn fresh_database_reaches_latest_schema() {
  let mut conn = Connection::open_in_memory().unwrap();

  let report = Migrator::new(CATALOG).apply(&mut conn, None).unwrap();

  assert_eq!(report.from_version, 0);
  assert_eq!(report.to_version, 2);
  assert_eq!(
    report.applied,
    vec![
      AppliedMigration { version: 1, name: "initial_schema" },
      AppliedMigration { version: 2, name: "clients_to_contacts" },
    ]
  );
  assert!(!report.snapshot_taken);
  assert_eq!(current_version(&conn), 2);

  for table in ["users", "contacts", "chantiers", "photos", "tags", "contact_tags", "contact_relations"] {
    assert!(table_exists(&conn, table), "missing table {table}");
  }
  assert!(!table_exists(&conn, "clients"));
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM tags"), 5);
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM contacts"), 0);
}

#[test]
fn applying_twice_is_a_noop() {
  let mut conn = Connection::open_in_memory().unwrap();
  let migrator = Migrator::new(CATALOG);
  migrator.apply(&mut conn, None).unwrap();

  let report = migrator.apply(&mut conn, None).unwrap();

  assert!(report.is_noop());
  assert_eq!(report.from_version, 2);
  assert_eq!(report.to_version, 2);
  assert_eq!(log(&conn).len(), 2);
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM tags"), 5);
}

#[test]
fn foreign_keys_are_enforced_again_after_migrating() {
  let mut conn = Connection::open_in_memory().unwrap();
  conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
  Migrator::new(CATALOG).apply(&mut conn, None).unwrap();

  let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
  assert_eq!(fk, 1);
  let orphan = conn.execute(
    "INSERT INTO chantiers (contact_id, nom, date_debut) VALUES (999, 'x', '2024-01-01')",
    [],
  );
  assert!(orphan.is_err());
}

// ─── Legacy upgrade ──────────────────────────────────────────────────────────

#[test]
fn legacy_database_is_upgraded_in_place() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);
  seed_legacy(&conn);

  let report = Migrator::new(CATALOG).apply(&mut conn, Some(&path)).unwrap();

  assert_eq!(report.from_version, 0);
  assert_eq!(report.to_version, 2);
  assert!(report.snapshot_taken);
  assert_eq!(
    log(&conn),
    vec![(1, "initial_schema".to_owned()), (2, "clients_to_contacts".to_owned())]
  );
  assert!(table_exists(&conn, "contacts"));
  assert!(!table_exists(&conn, "clients"));
  assert!(!table_exists(&conn, "contacts_new"));
  assert!(!table_exists(&conn, "chantiers_new"));
}

#[test]
fn migrated_clients_keep_their_ids_and_fields() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);
  seed_legacy(&conn);
  Migrator::new(CATALOG).apply(&mut conn, Some(&path)).unwrap();

  let (kind, nom, prenom, legal, phone, city, country, active): (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
  ) = conn
    .query_row(
      "SELECT type_personne, nom, prenom, raison_sociale, telephone, ville, pays, actif
       FROM contacts WHERE id = 7",
      [],
      |r| {
        Ok((
          r.get(0)?,
          r.get(1)?,
          r.get(2)?,
          r.get(3)?,
          r.get(4)?,
          r.get(5)?,
          r.get(6)?,
          r.get(7)?,
        ))
      },
    )
    .unwrap();
  assert_eq!(kind, "physique");
  assert_eq!(nom, "Dupont");
  assert_eq!(prenom.as_deref(), Some("Jean"));
  assert_eq!(legal.as_deref(), Some("Dupont Paysage"));
  assert_eq!(phone.as_deref(), Some("0601020304"));
  assert_eq!(city.as_deref(), Some("Lyon"));
  assert_eq!(country.as_deref(), Some("France"));
  assert_eq!(active, 1);

  let org_fields = count(
    &conn,
    "SELECT COUNT(*) FROM contacts
     WHERE siret IS NOT NULL OR tva_intracommunautaire IS NOT NULL OR forme_juridique IS NOT NULL",
  );
  assert_eq!(org_fields, 0);
}

#[test]
fn every_migrated_client_is_tagged_client() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);
  seed_legacy(&conn);
  Migrator::new(CATALOG).apply(&mut conn, Some(&path)).unwrap();

  let mut stmt = conn
    .prepare(
      "SELECT ct.contact_id, t.nom FROM contact_tags ct
       JOIN tags t ON t.id = ct.tag_id
       ORDER BY ct.contact_id",
    )
    .unwrap();
  let tags = stmt
    .query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))
    .unwrap()
    .collect::<rusqlite::Result<Vec<_>>>()
    .unwrap();
  assert_eq!(tags, vec![(7, "Client".to_owned()), (12, "Client".to_owned())]);
}

#[test]
fn job_sites_follow_their_contacts() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);
  seed_legacy(&conn);
  Migrator::new(CATALOG).apply(&mut conn, Some(&path)).unwrap();

  let (contact_id, nom, statut, done, todo): (i64, String, String, Option<String>, Option<String>) =
    conn
      .query_row(
        "SELECT contact_id, nom, statut, travaux_realises, travaux_a_faire
         FROM chantiers WHERE id = 3",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
      )
      .unwrap();
  assert_eq!(contact_id, 7);
  assert_eq!(nom, "Taille de haies");
  assert_eq!(statut, "en_cours");
  assert_eq!(done.as_deref(), Some("Haies taillées"));
  assert_eq!(todo.as_deref(), Some("Tondre la pelouse"));

  let kept: String = conn
    .query_row("SELECT statut FROM chantiers WHERE id = 4", [], |r| r.get(0))
    .unwrap();
  assert_eq!(kept, "termine");

  // The photo still reaches its contact through the rebuilt tables.
  let owner: String = conn
    .query_row(
      "SELECT c.nom FROM photos p
       JOIN chantiers j ON j.id = p.chantier_id
       JOIN contacts c ON c.id = j.contact_id
       WHERE p.id = 1",
      [],
      |r| r.get(0),
    )
    .unwrap();
  assert_eq!(owner, "Dupont");
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM pragma_foreign_key_check"), 0);
}

#[test]
fn snapshot_is_removed_after_success() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);
  seed_legacy(&conn);

  Migrator::new(CATALOG).apply(&mut conn, Some(&path)).unwrap();

  assert!(!Snapshot::path_for(&path, 0).exists());
}

#[test]
fn up_to_date_database_takes_no_snapshot() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);
  let migrator = Migrator::new(CATALOG);
  migrator.apply(&mut conn, Some(&path)).unwrap();

  let report = migrator.apply(&mut conn, Some(&path)).unwrap();

  assert!(report.is_noop());
  assert!(!report.snapshot_taken);
  assert!(!Snapshot::path_for(&path, 2).exists());
}

// ─── Failure ─────────────────────────────────────────────────────────────────

#[test]
fn failed_run_leaves_no_trace() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);
  conn
    .execute_batch("CREATE TABLE keep (v TEXT); INSERT INTO keep VALUES ('before');")
    .unwrap();

  let err = Migrator::new(FAILING_CATALOG)
    .apply(&mut conn, Some(&path))
    .unwrap_err();

  assert!(
    matches!(err, Error::Migration { version: 2, name: "broken", .. }),
    "unexpected error: {err}"
  );
  // The first migration ran in the same transaction and is gone too.
  assert!(!table_exists(&conn, "widgets"));
  assert!(!table_exists(&conn, "gadgets"));
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM migrations"), 0);
  assert_eq!(current_version(&conn), 0);
  let kept: String = conn.query_row("SELECT v FROM keep", [], |r| r.get(0)).unwrap();
  assert_eq!(kept, "before");
}

#[test]
fn failed_run_keeps_the_snapshot_on_disk() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);

  Migrator::new(FAILING_CATALOG)
    .apply(&mut conn, Some(&path))
    .unwrap_err();

  let snapshot = Snapshot::path_for(&path, 0);
  assert!(snapshot.exists());
  let copy = Connection::open(&snapshot).unwrap();
  assert!(!table_exists(&copy, "widgets"));
}

#[test]
fn failure_after_earlier_run_keeps_the_earlier_version() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);
  Migrator::new(&FAILING_CATALOG[..1]).apply(&mut conn, Some(&path)).unwrap();
  conn.execute("INSERT INTO widgets (id) VALUES (42)", []).unwrap();

  Migrator::new(FAILING_CATALOG)
    .apply(&mut conn, Some(&path))
    .unwrap_err();

  assert_eq!(current_version(&conn), 1);
  assert_eq!(count(&conn, "SELECT COUNT(*) FROM widgets WHERE id = 42"), 1);
  assert!(Snapshot::path_for(&path, 1).exists());
}

#[test]
fn snapshot_restores_what_rollback_cannot() {
  let dir = TempDir::new().unwrap();
  let (path, mut conn) = db_in(&dir);
  conn
    .execute_batch("CREATE TABLE keep (v TEXT); INSERT INTO keep VALUES ('before');")
    .unwrap();

  let err = Migrator::new(ESCAPING_CATALOG)
    .apply(&mut conn, Some(&path))
    .unwrap_err();

  assert!(
    matches!(err, Error::Migration { version: 2, name: "broken", .. }),
    "unexpected error: {err}"
  );
  assert!(!table_exists(&conn, "escaped"));
  assert_eq!(current_version(&conn), 0);

  drop(conn);
  let reopened = Connection::open(&path).unwrap();
  assert!(!table_exists(&reopened, "escaped"));
  assert_eq!(count(&reopened, "SELECT COUNT(*) FROM migrations"), 0);
  let kept: String = reopened.query_row("SELECT v FROM keep", [], |r| r.get(0)).unwrap();
  assert_eq!(kept, "before");
}

#[test]
fn foreign_keys_that_stay_off_are_an_error() {
  let conn = Connection::open_in_memory().unwrap();
  conn.execute_batch("PRAGMA foreign_keys = OFF; BEGIN;").unwrap();

  // The pragma is ignored while a transaction is open.
  let err = enable_foreign_keys(&conn).unwrap_err();

  assert!(matches!(err, Error::ForeignKeysOff), "unexpected error: {err}");
}

#[test]
fn required_snapshot_blocks_migrating() {
  let dir = TempDir::new().unwrap();
  let (_, mut conn) = db_in(&dir);
  // The database file is never at this path, so copying it fails.
  let missing = dir.path().join("absent").join("database.sqlite");

  let err = Migrator::new(CATALOG)
    .with_snapshot_policy(SnapshotPolicy::Required)
    .apply(&mut conn, Some(&missing))
    .unwrap_err();

  assert!(matches!(err, Error::Snapshot(_)), "unexpected error: {err}");
  assert_eq!(current_version(&conn), 0);
  assert!(!table_exists(&conn, "contacts"));
}

#[test]
fn best_effort_snapshot_migrates_anyway() {
  let dir = TempDir::new().unwrap();
  let (_, mut conn) = db_in(&dir);
  let missing = dir.path().join("absent").join("database.sqlite");

  let report = Migrator::new(CATALOG).apply(&mut conn, Some(&missing)).unwrap();

  assert!(!report.snapshot_taken);
  assert_eq!(report.to_version, 2);
}
