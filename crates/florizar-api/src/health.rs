//! `GET /health`: liveness plus the applied schema version.

use axum::{Json, extract::State};
use florizar_core::store::FlorizarStore;
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

pub async fn handler<S>(State(state): State<AppState<S>>) -> Result<Json<Value>, ApiError>
where
  S: FlorizarStore,
{
  let log = state.store.migration_log().await.map_err(ApiError::store)?;
  let version = log.last().map_or(0, |m| m.version);
  Ok(Json(json!({
    "status":         "ok",
    "schema_version": version,
    "migrations":     log,
  })))
}
