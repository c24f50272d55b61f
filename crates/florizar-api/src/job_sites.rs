//! Handlers for `/job-sites` endpoints (also mounted at `/chantiers`).
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/job-sites` | Newest start date first, with contact summary |
//! | `POST`   | `/job-sites` | `client_id`/`titre` accepted; 404 for an unknown contact |
//! | `GET`    | `/job-sites/:id` | With contact and photos |
//! | `PUT`    | `/job-sites/:id` | |
//! | `DELETE` | `/job-sites/:id` | Also removes photo files |
//! | `GET`    | `/job-sites/contact/:contact_id` | Alias: `/client/:contact_id` |

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
  routing::get,
};
use florizar_core::{
  job_site::{JobSite, JobSiteDetail, JobSiteSummary},
  normalize,
  store::FlorizarStore,
};
use serde_json::{Value, json};

use crate::{AppState, error::ApiError, photos};

pub fn routes<S>() -> Router<AppState<S>>
where
  S: FlorizarStore + Clone + 'static,
{
  Router::new()
    .route("/", get(list::<S>).post(create::<S>))
    .route("/contact/{contact_id}", get(for_contact::<S>))
    .route("/client/{contact_id}", get(for_contact::<S>))
    .route(
      "/{id}",
      get(get_one::<S>).put(update::<S>).delete(delete_one::<S>),
    )
}

/// `GET /job-sites`
pub async fn list<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<JobSiteSummary>>, ApiError>
where
  S: FlorizarStore,
{
  let sites = state.store.list_job_sites().await.map_err(ApiError::store)?;
  Ok(Json(sites))
}

/// `GET /job-sites/contact/:contact_id`
pub async fn for_contact<S>(
  State(state): State<AppState<S>>,
  Path(contact_id): Path<i64>,
) -> Result<Json<Vec<JobSite>>, ApiError>
where
  S: FlorizarStore,
{
  let sites = state
    .store
    .job_sites_for_contact(contact_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(sites))
}

/// `GET /job-sites/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<JobSiteDetail>, ApiError>
where
  S: FlorizarStore,
{
  let site = state
    .store
    .get_job_site(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("job site {id} not found")))?;
  Ok(Json(site))
}

/// `POST /job-sites`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FlorizarStore,
{
  let input = normalize::job_site_input(body)?;
  let site = state
    .store
    .create_job_site(input)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(site)))
}

/// `PUT /job-sites/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Json(body): Json<Value>,
) -> Result<Json<JobSite>, ApiError>
where
  S: FlorizarStore,
{
  let input = normalize::job_site_input(body)?;
  let site = state
    .store
    .update_job_site(id, input)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("job site {id} not found")))?;
  Ok(Json(site))
}

/// `DELETE /job-sites/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: FlorizarStore,
{
  let photos = state
    .store
    .delete_job_site(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("job site {id} not found")))?;
  photos::remove_files(&state.uploads.dir, &photos).await;
  Ok(Json(json!({ "message": "job site deleted", "photos_removed": photos.len() })))
}
