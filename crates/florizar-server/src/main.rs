//! florizar-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, which brings its schema up to date, and only then starts
//! serving HTTP. A failed migration ends the process with an error before
//! any socket is bound. Ctrl-C drains open requests and closes the store.
//!
//! # Scaffolding a migration
//!
//! ```text
//! cargo run -p florizar-server -- --new-migration "add invoices"
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use florizar_api::AppState;
use florizar_server::{ServerConfig, scaffold};
use florizar_store_sqlite::{SqliteStore, migrate::CATALOG};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Florizar server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Apply pending schema migrations, then exit without serving.
  #[arg(long)]
  migrate_only: bool,

  /// Print a skeleton for the next schema migration and exit. The database
  /// is not opened.
  #[arg(long, value_name = "NAME")]
  new_migration: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if let Some(name) = cli.new_migration {
    let s = scaffold::scaffold(CATALOG, &name)?;
    println!("// {}\n{}", s.file_name, s.source);
    println!("// catalog entry:\n{}", s.catalog_entry);
    return Ok(());
  }

  let server_cfg = ServerConfig::load(cli.config)?;

  // Open the store. Pending migrations run here, before the socket exists.
  let store = SqliteStore::open_with(&server_cfg.database_path, server_cfg.snapshot_policy)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.database_path))?;

  if cli.migrate_only {
    store.close().await.context("failed to close store")?;
    return Ok(());
  }

  tokio::fs::create_dir_all(&server_cfg.uploads_dir)
    .await
    .with_context(|| format!("failed to create {:?}", server_cfg.uploads_dir))?;

  let state = AppState::new(store.clone(), server_cfg.uploads());
  let app = florizar_server::app(state);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
      }
    })
    .await
    .context("server error")?;

  tracing::info!("shutting down");
  store.close().await.context("failed to close store")?;
  Ok(())
}
