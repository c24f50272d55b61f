//! `--new-migration <name>`: a starting point for the next schema version.
//!
//! Only text is produced. The new module still has to be saved under
//! `florizar-store-sqlite/src/migrate/` and added to the catalog by hand.

use anyhow::bail;
use florizar_store_sqlite::migrate::{Migration, latest_version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scaffold {
  pub version:       u32,
  /// e.g. `v003_add_invoices.rs`.
  pub file_name:     String,
  pub source:        String,
  /// The `Migration { .. }` literal to append to the catalog.
  pub catalog_entry: String,
}

/// Lowercase `name`, turning every run of other characters into one `_`.
pub fn slug(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  for c in name.trim().chars() {
    if c.is_ascii_alphanumeric() {
      out.push(c.to_ascii_lowercase());
    } else if !out.is_empty() && !out.ends_with('_') {
      out.push('_');
    }
  }
  out.trim_end_matches('_').to_owned()
}

/// Template for the version after the newest one in `catalog`.
pub fn scaffold(catalog: &[Migration], name: &str) -> anyhow::Result<Scaffold> {
  let slug = slug(name);
  if slug.is_empty() {
    bail!("migration name {name:?} has no letters or digits");
  }
  let version = latest_version(catalog) + 1;
  let module = format!("v{version:03}_{slug}");

  let source = format!(
    r#"//! v{version:03}: {name}.

use rusqlite::Transaction;

pub fn migrate(tx: &Transaction<'_>) -> rusqlite::Result<()> {{
  tx.execute_batch(
    "
    -- schema changes for version {version}
    ",
  )
}}
"#,
    name = name.trim(),
  );

  let catalog_entry = format!(
    "  Migration {{\n    version: {version},\n    name:    \"{slug}\",\n    up:      {module}::migrate,\n  }},\n"
  );

  Ok(Scaffold { version, file_name: format!("{module}.rs"), source, catalog_entry })
}

#[cfg(test)]
mod tests {
  use florizar_store_sqlite::migrate::CATALOG;

  use super::*;

  #[test]
  fn slugs() {
    assert_eq!(slug("Add invoices"), "add_invoices");
    assert_eq!(slug("  contact--notes!! v2 "), "contact_notes_v2");
    assert_eq!(slug("Élagage"), "lagage");
    assert_eq!(slug("***"), "");
  }

  #[test]
  fn next_version_follows_the_catalog() {
    let s = scaffold(CATALOG, "add invoices").unwrap();
    assert_eq!(s.version, latest_version(CATALOG) + 1);
    assert_eq!(s.file_name, format!("v{:03}_add_invoices.rs", s.version));
    assert!(s.source.contains("pub fn migrate(tx: &Transaction<'_>)"));
    assert!(s.catalog_entry.contains("name:    \"add_invoices\""));
    assert!(s.catalog_entry.contains(&format!("v{:03}_add_invoices::migrate", s.version)));
  }

  #[test]
  fn empty_catalog_starts_at_one() {
    let s = scaffold(&[], "initial").unwrap();
    assert_eq!(s.version, 1);
    assert_eq!(s.file_name, "v001_initial.rs");
  }

  #[test]
  fn unusable_names_are_refused() {
    assert!(scaffold(CATALOG, "  ").is_err());
  }
}
