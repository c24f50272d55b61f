//! Whole-file copies of the database taken before a migration run.
//!
//! A snapshot lives next to the database as `<stem>_backup_v<N>.<ext>`, where
//! `N` is the schema version it captured. It is deleted when the run commits
//! and read back only if the same run fails.

use std::{
  fs, io,
  path::{Path, PathBuf},
};

use rusqlite::{Connection, DatabaseName, backup::Progress};

#[derive(Debug)]
pub struct Snapshot {
  path: PathBuf,
}

impl Snapshot {
  /// Where the snapshot of `db_path` at `version` is written.
  pub fn path_for(db_path: &Path, version: u32) -> PathBuf {
    let stem = db_path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "database".to_owned());
    let name = match db_path.extension() {
      Some(ext) => format!("{stem}_backup_v{version}.{}", ext.to_string_lossy()),
      None => format!("{stem}_backup_v{version}"),
    };
    db_path.with_file_name(name)
  }

  /// Copy the database file. The WAL is checkpointed first so the main file
  /// holds every committed page.
  pub fn take(conn: &Connection, db_path: &Path, version: u32) -> io::Result<Self> {
    conn
      .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
      .map_err(io::Error::other)?;
    let path = Self::path_for(db_path, version);
    fs::copy(db_path, &path)?;
    Ok(Self { path })
  }

  pub fn path(&self) -> &Path { &self.path }

  /// Write the snapshot back into the live database.
  ///
  /// Goes through SQLite's online backup API rather than copying the file
  /// over, since `conn` still has the database open.
  pub fn restore(&self, conn: &mut Connection) -> rusqlite::Result<()> {
    conn.restore(DatabaseName::Main, &self.path, None::<fn(Progress)>)
  }

  pub fn discard(self) -> io::Result<()> { fs::remove_file(&self.path) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn path_keeps_directory_and_extension() {
    let p = Snapshot::path_for(Path::new("/var/lib/florizar/database.sqlite"), 3);
    assert_eq!(p, PathBuf::from("/var/lib/florizar/database_backup_v3.sqlite"));
  }

  #[test]
  fn path_without_extension() {
    let p = Snapshot::path_for(Path::new("data/florizar"), 0);
    assert_eq!(p, PathBuf::from("data/florizar_backup_v0"));
  }
}
