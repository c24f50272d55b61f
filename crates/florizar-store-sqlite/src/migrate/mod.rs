//! Versioned schema migrations.
//!
//! The applied versions are logged in the `migrations` table; the highest
//! logged version is the current schema version. [`Migrator::apply`] brings a
//! database up to the end of its catalog:
//!
//! 1. snapshot the database file (see [`Snapshot`]),
//! 2. run every pending migration, and log it, inside one transaction,
//! 3. commit and drop the snapshot,
//!
//! or, if anything in step 2 or 3 fails, roll the transaction back, write the
//! snapshot back into the database and return the error. A failed run never
//! leaves a partially migrated schema behind.
//!
//! Foreign-key enforcement is switched off for the duration of the
//! transaction: migrations rebuild tables (create, copy, drop, rename), and
//! dropping a parent table with enforcement on would cascade into its
//! children. References are verified with `PRAGMA foreign_key_check` before
//! committing instead.

mod error;
mod snapshot;
mod v001_initial_schema;
mod v002_clients_to_contacts;

#[cfg(test)]
mod tests;

use std::{fmt, path::Path};

use chrono::Utc;
use rusqlite::{Connection, Transaction};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

pub use error::{Error, Result};
pub use snapshot::Snapshot;

use crate::encode::encode_dt;

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Forward transformation of one migration. Runs inside the run's
/// transaction.
pub type MigrateFn = fn(&Transaction<'_>) -> rusqlite::Result<()>;

#[derive(Clone, Copy)]
pub struct Migration {
  pub version: u32,
  pub name:    &'static str,
  pub up:      MigrateFn,
}

impl fmt::Debug for Migration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Migration")
      .field("version", &self.version)
      .field("name", &self.name)
      .finish_non_exhaustive()
  }
}

/// Every migration this build knows, in ascending, contiguous version order.
pub const CATALOG: &[Migration] = &[
  Migration {
    version: 1,
    name:    "initial_schema",
    up:      v001_initial_schema::migrate,
  },
  Migration {
    version: 2,
    name:    "clients_to_contacts",
    up:      v002_clients_to_contacts::migrate,
  },
];

/// The version a database reaches once `catalog` is fully applied.
pub fn latest_version(catalog: &[Migration]) -> u32 {
  catalog.iter().map(|m| m.version).max().unwrap_or(0)
}

const MIGRATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS migrations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    version     INTEGER UNIQUE NOT NULL,
    name        TEXT NOT NULL,
    executed_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
";

/// The highest applied version; 0 when the log is missing, empty or
/// unreadable.
pub fn current_version(conn: &Connection) -> u32 {
  conn
    .query_row("SELECT MAX(version) FROM migrations", [], |row| {
      row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .and_then(|v| u32::try_from(v).ok())
    .unwrap_or(0)
}

// ─── Runner ──────────────────────────────────────────────────────────────────

/// What to do when the pre-migration snapshot cannot be written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPolicy {
  /// Log a warning and migrate without a snapshot. A failure later in the
  /// run then has only the transaction rollback to fall back on.
  #[default]
  BestEffort,
  /// Refuse to migrate.
  Required,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
  pub version: u32,
  pub name:    &'static str,
}

/// Outcome of a successful [`Migrator::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
  pub from_version:   u32,
  pub to_version:     u32,
  pub applied:        Vec<AppliedMigration>,
  pub snapshot_taken: bool,
}

impl MigrationReport {
  pub fn is_noop(&self) -> bool { self.applied.is_empty() }
}

/// Applies a catalog of migrations to a connection.
#[derive(Debug, Clone, Copy)]
pub struct Migrator<'a> {
  catalog: &'a [Migration],
  policy:  SnapshotPolicy,
}

impl<'a> Migrator<'a> {
  pub fn new(catalog: &'a [Migration]) -> Self {
    debug_assert!(
      catalog.windows(2).all(|w| w[0].version < w[1].version),
      "migration catalog must be in strictly ascending version order"
    );
    Self { catalog, policy: SnapshotPolicy::default() }
  }

  pub fn with_snapshot_policy(mut self, policy: SnapshotPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Catalog entries newer than `current`, in catalog order.
  pub fn pending(&self, current: u32) -> Vec<&'a Migration> {
    self.catalog.iter().filter(|m| m.version > current).collect()
  }

  /// Bring the database behind `conn` up to the end of the catalog.
  ///
  /// `db_path` is the file backing `conn`; pass `None` for in-memory
  /// databases, which are migrated without a snapshot.
  pub fn apply(
    &self,
    conn: &mut Connection,
    db_path: Option<&Path>,
  ) -> Result<MigrationReport> {
    conn.execute_batch(MIGRATIONS_TABLE).map_err(Error::LogTable)?;

    let current = current_version(conn);
    info!(version = current, "current schema version");

    let pending = self.pending(current);
    if pending.is_empty() {
      info!("schema is up to date, no pending migrations");
      return Ok(MigrationReport {
        from_version:   current,
        to_version:     current,
        applied:        Vec::new(),
        snapshot_taken: false,
      });
    }
    info!(count = pending.len(), "pending migrations");

    let snapshot = self.take_snapshot(conn, db_path, current)?;
    let snapshot_taken = snapshot.is_some();

    match apply_pending(conn, &pending) {
      Ok(to_version) => {
        if let Some(snapshot) = snapshot {
          let path = snapshot.path().to_path_buf();
          if let Err(e) = snapshot.discard() {
            warn!(path = %path.display(), error = %e, "could not delete snapshot");
          }
        }
        info!(from = current, to = to_version, "migrations applied");
        Ok(MigrationReport {
          from_version: current,
          to_version,
          applied: pending
            .iter()
            .map(|m| AppliedMigration { version: m.version, name: m.name })
            .collect(),
          snapshot_taken,
        })
      }
      Err(err) => {
        error!(error = %err, "migration run failed, transaction rolled back");
        if let Some(snapshot) = &snapshot {
          match snapshot.restore(conn) {
            Ok(()) => info!(
              path = %snapshot.path().display(),
              "database restored from snapshot"
            ),
            Err(e) => error!(
              path = %snapshot.path().display(),
              error = %e,
              "could not restore database from snapshot"
            ),
          }
        }
        Err(err)
      }
    }
  }

  fn take_snapshot(
    &self,
    conn: &Connection,
    db_path: Option<&Path>,
    current: u32,
  ) -> Result<Option<Snapshot>> {
    let Some(db_path) = db_path else {
      debug!("in-memory database, migrating without a snapshot");
      return Ok(None);
    };
    match Snapshot::take(conn, db_path, current) {
      Ok(snapshot) => {
        info!(path = %snapshot.path().display(), "snapshot created");
        Ok(Some(snapshot))
      }
      Err(e) if self.policy == SnapshotPolicy::Required => Err(Error::Snapshot(e)),
      Err(e) => {
        warn!(error = %e, "could not create snapshot, migrating without one");
        Ok(None)
      }
    }
  }
}

/// Run `pending` in a single transaction with foreign-key enforcement off.
/// Returns the version reached.
fn apply_pending(conn: &mut Connection, pending: &[&Migration]) -> Result<u32> {
  // Has no effect inside a transaction, so it is set before opening one.
  conn
    .pragma_update(None, "foreign_keys", false)
    .map_err(Error::Begin)?;

  let result = run_transaction(conn, pending);

  match (result, enable_foreign_keys(conn)) {
    (Ok(version), Ok(())) => Ok(version),
    (Ok(_), Err(e)) => Err(e),
    (Err(err), Ok(())) => Err(err),
    (Err(err), Err(e)) => {
      warn!(error = %e, "could not re-enable foreign key enforcement");
      Err(err)
    }
  }
}

/// Turn enforcement back on and read the pragma to confirm it took.
fn enable_foreign_keys(conn: &Connection) -> Result<()> {
  conn
    .pragma_update(None, "foreign_keys", true)
    .map_err(Error::ForeignKeys)?;
  let on: bool = conn
    .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
    .map_err(Error::ForeignKeys)?;
  if on { Ok(()) } else { Err(Error::ForeignKeysOff) }
}

fn run_transaction(conn: &mut Connection, pending: &[&Migration]) -> Result<u32> {
  let tx = conn.transaction().map_err(Error::Begin)?;

  match run_all(&tx, pending) {
    Ok(version) => {
      tx.commit().map_err(Error::Commit)?;
      Ok(version)
    }
    Err(err) => {
      if let Err(e) = tx.rollback() {
        warn!(error = %e, "rollback failed");
      }
      Err(err)
    }
  }
}

fn run_all(tx: &Transaction<'_>, pending: &[&Migration]) -> Result<u32> {
  let mut version = 0;
  for migration in pending {
    info!(
      version = migration.version,
      name = migration.name,
      "applying migration"
    );
    (migration.up)(tx).map_err(|source| Error::Migration {
      version: migration.version,
      name: migration.name,
      source,
    })?;
    tx.execute(
      "INSERT INTO migrations (version, name, executed_at) VALUES (?1, ?2, ?3)",
      rusqlite::params![migration.version, migration.name, encode_dt(Utc::now())],
    )
    .map_err(|source| Error::Record { version: migration.version, source })?;
    version = migration.version;
  }
  check_foreign_keys(tx)?;
  Ok(version)
}

fn check_foreign_keys(conn: &Connection) -> Result<()> {
  let mut stmt = conn
    .prepare("PRAGMA foreign_key_check")
    .map_err(Error::ForeignKeyCheck)?;
  let mut tables = stmt
    .query_map([], |row| row.get::<_, String>(0))
    .map_err(Error::ForeignKeyCheck)?
    .collect::<rusqlite::Result<Vec<_>>>()
    .map_err(Error::ForeignKeyCheck)?;

  if tables.is_empty() {
    return Ok(());
  }
  let count = tables.len();
  tables.sort();
  tables.dedup();
  Err(Error::DanglingReferences { count, tables: tables.join(", ") })
}
