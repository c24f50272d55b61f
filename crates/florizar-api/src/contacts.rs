//! Handlers for `/contacts` endpoints (also mounted at `/clients`).
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/contacts` | Optional `?active=true\|false&kind=individual\|organization` |
//! | `POST`   | `/contacts` | Legacy French field names accepted |
//! | `GET`    | `/contacts/stats` | Totals, per kind, per tag |
//! | `GET`    | `/contacts/search/:term` | At most 50 results |
//! | `GET`    | `/contacts/by-tag/:tag_id` | Optional `?active=` |
//! | `GET`    | `/contacts/:id` | With tags and relations, 404 if not found |
//! | `PUT`    | `/contacts/:id` | Full replacement |
//! | `DELETE` | `/contacts/:id` | Cascades to job sites and photo files |
//! | `PATCH`  | `/contacts/:id/toggle-active` | |
//! | `POST`   | `/contacts/:id/tags/:tag_id` | Idempotent |
//! | `DELETE` | `/contacts/:id/tags/:tag_id` | |
//! | `GET`    | `/contacts/:id/relations` | |
//! | `POST`   | `/contacts/:id/relations` | Upsert on `(related, type)` |
//! | `DELETE` | `/contacts/:id/relations/:relation_id` | |
//! | `GET`    | `/contacts/:id/interlocutors` | |

use axum::{
  Json, Router,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
  routing::{delete, get, patch, post},
};
use florizar_core::{
  contact::{Contact, ContactDetail, ContactFilter, ContactStats},
  normalize,
  relation::RelatedContact,
  store::FlorizarStore,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, error::ApiError, photos};

pub fn routes<S>() -> Router<AppState<S>>
where
  S: FlorizarStore + Clone + 'static,
{
  Router::new()
    .route("/", get(list::<S>).post(create::<S>))
    .route("/stats", get(stats::<S>))
    .route("/search/{term}", get(search::<S>))
    .route("/by-tag/{tag_id}", get(by_tag::<S>))
    .route(
      "/{id}",
      get(get_one::<S>).put(update::<S>).delete(delete_one::<S>),
    )
    .route("/{id}/toggle-active", patch(toggle_active::<S>))
    .route(
      "/{id}/tags/{tag_id}",
      post(add_tag::<S>).delete(remove_tag::<S>),
    )
    .route(
      "/{id}/relations",
      get(relations::<S>).post(add_relation::<S>),
    )
    .route("/{id}/relations/{relation_id}", delete(remove_relation::<S>))
    .route("/{id}/interlocutors", get(interlocutors::<S>))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /contacts[?active=<bool>&kind=<kind>]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(filter): Query<ContactFilter>,
) -> Result<Json<Vec<ContactDetail>>, ApiError>
where
  S: FlorizarStore,
{
  let contacts = state
    .store
    .list_contacts(filter)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(contacts))
}

/// `GET /contacts/stats`
pub async fn stats<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<ContactStats>, ApiError>
where
  S: FlorizarStore,
{
  let stats = state.store.contact_stats().await.map_err(ApiError::store)?;
  Ok(Json(stats))
}

/// `GET /contacts/search/:term`
pub async fn search<S>(
  State(state): State<AppState<S>>,
  Path(term): Path<String>,
  Query(filter): Query<ContactFilter>,
) -> Result<Json<Vec<Contact>>, ApiError>
where
  S: FlorizarStore,
{
  let contacts = state
    .store
    .search_contacts(term, filter)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(contacts))
}

#[derive(Debug, Deserialize)]
pub struct ActiveParam {
  pub active: Option<bool>,
}

/// `GET /contacts/by-tag/:tag_id[?active=<bool>]`
pub async fn by_tag<S>(
  State(state): State<AppState<S>>,
  Path(tag_id): Path<i64>,
  Query(params): Query<ActiveParam>,
) -> Result<Json<Vec<Contact>>, ApiError>
where
  S: FlorizarStore,
{
  let contacts = state
    .store
    .contacts_by_tag(tag_id, params.active)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(contacts))
}

// ─── Single contact ───────────────────────────────────────────────────────────

/// `GET /contacts/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<ContactDetail>, ApiError>
where
  S: FlorizarStore,
{
  let contact = state
    .store
    .get_contact(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(contact))
}

/// `POST /contacts`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FlorizarStore,
{
  let input = normalize::contact_input(body)?;
  let contact = state
    .store
    .create_contact(input)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(contact)))
}

/// `PUT /contacts/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Json(body): Json<Value>,
) -> Result<Json<Contact>, ApiError>
where
  S: FlorizarStore,
{
  let input = normalize::contact_input(body)?;
  let contact = state
    .store
    .update_contact(id, input)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(contact))
}

/// `DELETE /contacts/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: FlorizarStore,
{
  let photos = state
    .store
    .delete_contact(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  photos::remove_files(&state.uploads.dir, &photos).await;
  Ok(Json(json!({ "message": "contact deleted", "photos_removed": photos.len() })))
}

/// `PATCH /contacts/:id/toggle-active`
pub async fn toggle_active<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Contact>, ApiError>
where
  S: FlorizarStore,
{
  let contact = state
    .store
    .toggle_contact_active(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(contact))
}

// ─── Tags ─────────────────────────────────────────────────────────────────────

/// `POST /contacts/:id/tags/:tag_id`
pub async fn add_tag<S>(
  State(state): State<AppState<S>>,
  Path((id, tag_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError>
where
  S: FlorizarStore,
{
  state
    .store
    .add_contact_tag(id, tag_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(json!({ "message": "tag added" })))
}

/// `DELETE /contacts/:id/tags/:tag_id`
pub async fn remove_tag<S>(
  State(state): State<AppState<S>>,
  Path((id, tag_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError>
where
  S: FlorizarStore,
{
  let removed = state
    .store
    .remove_contact_tag(id, tag_id)
    .await
    .map_err(ApiError::store)?;
  if !removed {
    return Err(ApiError::NotFound(format!(
      "contact {id} does not carry tag {tag_id}"
    )));
  }
  Ok(Json(json!({ "message": "tag removed" })))
}

// ─── Relations ────────────────────────────────────────────────────────────────

/// `GET /contacts/:id/relations`
pub async fn relations<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<RelatedContact>>, ApiError>
where
  S: FlorizarStore,
{
  let relations = state.store.relations(id).await.map_err(ApiError::store)?;
  Ok(Json(relations))
}

/// `POST /contacts/:id/relations`
pub async fn add_relation<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FlorizarStore,
{
  let input = normalize::relation_input(body, id)?;
  let relation = state
    .store
    .upsert_relation(id, input)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(relation)))
}

/// `DELETE /contacts/:id/relations/:relation_id`
pub async fn remove_relation<S>(
  State(state): State<AppState<S>>,
  Path((id, relation_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError>
where
  S: FlorizarStore,
{
  let removed = state
    .store
    .remove_relation(id, relation_id)
    .await
    .map_err(ApiError::store)?;
  if !removed {
    return Err(ApiError::NotFound(format!(
      "relation {relation_id} of contact {id} not found"
    )));
  }
  Ok(Json(json!({ "message": "relation removed" })))
}

/// `GET /contacts/:id/interlocutors`
pub async fn interlocutors<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<RelatedContact>>, ApiError>
where
  S: FlorizarStore,
{
  let people = state.store.interlocutors(id).await.map_err(ApiError::store)?;
  Ok(Json(people))
}
