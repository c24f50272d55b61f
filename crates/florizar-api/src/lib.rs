//! JSON REST API for Florizar.
//!
//! Exposes an axum [`Router`] backed by any [`florizar_core::store::FlorizarStore`].
//! Every route except `/health` and `/auth/*` requires HTTP Basic credentials
//! of a registered user. TLS and static file serving are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", florizar_api::api_router(state))
//! ```

pub mod auth;
pub mod contacts;
pub mod error;
pub mod health;
pub mod job_sites;
pub mod photos;
pub mod tags;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  middleware,
  routing::{get, post},
};
use florizar_core::store::FlorizarStore;

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Where uploaded photos go and how large each one may be.
#[derive(Debug, Clone)]
pub struct UploadConfig {
  pub dir:       PathBuf,
  pub max_bytes: usize,
}

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: FlorizarStore> {
  pub store:   Arc<S>,
  pub uploads: Arc<UploadConfig>,
}

impl<S: FlorizarStore> AppState<S> {
  pub fn new(store: S, uploads: UploadConfig) -> Self {
    Self { store: Arc::new(store), uploads: Arc::new(uploads) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: FlorizarStore + Clone + 'static,
{
  let protected = Router::new()
    .nest("/contacts", contacts::routes::<S>())
    // Pre-contacts frontends still call the old resource name.
    .nest("/clients", contacts::routes::<S>())
    .nest("/tags", tags::routes::<S>())
    .nest("/job-sites", job_sites::routes::<S>())
    .nest("/chantiers", job_sites::routes::<S>())
    .nest("/photos", photos::routes::<S>(state.uploads.max_bytes))
    .route_layer(middleware::from_fn_with_state(
      state.clone(),
      auth::require_user::<S>,
    ));

  Router::new()
    .route("/health", get(health::handler::<S>))
    .route("/auth/register", post(auth::register::<S>))
    .route("/auth/login", post(auth::login::<S>))
    .merge(protected)
    .with_state(state)
}
