//! Florizar HTTP server.
//!
//! Loads [`ServerConfig`], and assembles the REST API and the uploaded-photo
//! file service into one [`Router`]. The binary in `main.rs` opens the store
//! (migrating it) before anything here is bound to a socket.

pub mod scaffold;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use axum::Router;
use florizar_api::{AppState, UploadConfig};
use florizar_core::store::FlorizarStore;
use florizar_store_sqlite::SnapshotPolicy;
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Largest accepted photo, per file.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 3000 }

fn default_database_path() -> PathBuf { PathBuf::from("florizar.db") }

fn default_uploads_dir() -> PathBuf { PathBuf::from("uploads") }

fn default_max_upload_bytes() -> usize { DEFAULT_MAX_UPLOAD_BYTES }

/// Runtime server configuration, deserialised from `config.toml` and
/// `FLORIZAR_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:             String,
  #[serde(default = "default_port")]
  pub port:             u16,
  #[serde(default = "default_database_path")]
  pub database_path:    PathBuf,
  #[serde(default = "default_uploads_dir")]
  pub uploads_dir:      PathBuf,
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes: usize,
  /// Whether a failed pre-migration snapshot aborts startup.
  #[serde(default)]
  pub snapshot_policy:  SnapshotPolicy,
}

impl ServerConfig {
  /// Read `path` if it exists, then let the environment override it.
  pub fn load(path: PathBuf) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("FLORIZAR"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: Self = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.database_path = expand_tilde(&cfg.database_path);
    cfg.uploads_dir = expand_tilde(&cfg.uploads_dir);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn uploads(&self) -> UploadConfig {
    UploadConfig {
      dir:       self.uploads_dir.clone(),
      max_bytes: self.max_upload_bytes,
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The whole HTTP surface: the API under `/api`, stored photos under
/// `/uploads`.
pub fn app<S>(state: AppState<S>) -> Router
where
  S: FlorizarStore + Clone + 'static,
{
  let files = ServeDir::new(&state.uploads.dir);
  Router::new()
    .nest("/api", florizar_api::api_router(state))
    .nest_service("/uploads", files)
    .layer(TraceLayer::new_for_http())
}
