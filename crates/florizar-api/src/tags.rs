//! Handlers for `/tags` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/tags` | With contact counts |
//! | `POST`   | `/tags` | 409 if the name is taken |
//! | `GET`    | `/tags/top/:limit` | Most-assigned first |
//! | `GET`    | `/tags/search/:term` | |
//! | `GET`    | `/tags/:id` | |
//! | `PUT`    | `/tags/:id` | |
//! | `DELETE` | `/tags/:id` | 409 while any contact carries it |

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
  routing::get,
};
use florizar_core::{normalize, store::FlorizarStore, tag::Tag};
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

/// Upper bound for `/tags/top/:limit`.
pub const MAX_TOP_TAGS: usize = 100;

pub fn routes<S>() -> Router<AppState<S>>
where
  S: FlorizarStore + Clone + 'static,
{
  Router::new()
    .route("/", get(list::<S>).post(create::<S>))
    .route("/top/{limit}", get(top::<S>))
    .route("/search/{term}", get(search::<S>))
    .route(
      "/{id}",
      get(get_one::<S>).put(update::<S>).delete(delete_one::<S>),
    )
}

/// `GET /tags`
pub async fn list<S>(State(state): State<AppState<S>>) -> Result<Json<Vec<Tag>>, ApiError>
where
  S: FlorizarStore,
{
  let tags = state.store.list_tags().await.map_err(ApiError::store)?;
  Ok(Json(tags))
}

/// `GET /tags/top/:limit`
pub async fn top<S>(
  State(state): State<AppState<S>>,
  Path(limit): Path<usize>,
) -> Result<Json<Vec<Tag>>, ApiError>
where
  S: FlorizarStore,
{
  let tags = state
    .store
    .top_tags(limit.min(MAX_TOP_TAGS))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(tags))
}

/// `GET /tags/search/:term`
pub async fn search<S>(
  State(state): State<AppState<S>>,
  Path(term): Path<String>,
) -> Result<Json<Vec<Tag>>, ApiError>
where
  S: FlorizarStore,
{
  let tags = state.store.search_tags(term).await.map_err(ApiError::store)?;
  Ok(Json(tags))
}

/// `GET /tags/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Tag>, ApiError>
where
  S: FlorizarStore,
{
  let tag = state
    .store
    .get_tag(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("tag {id} not found")))?;
  Ok(Json(tag))
}

/// `POST /tags`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FlorizarStore,
{
  let input = normalize::tag_input(body)?;
  let tag = state.store.create_tag(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(tag)))
}

/// `PUT /tags/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Json(body): Json<Value>,
) -> Result<Json<Tag>, ApiError>
where
  S: FlorizarStore,
{
  let input = normalize::tag_input(body)?;
  let tag = state
    .store
    .update_tag(id, input)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("tag {id} not found")))?;
  Ok(Json(tag))
}

/// `DELETE /tags/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: FlorizarStore,
{
  let deleted = state.store.delete_tag(id).await.map_err(ApiError::store)?;
  if !deleted {
    return Err(ApiError::NotFound(format!("tag {id} not found")));
  }
  Ok(Json(json!({ "message": "tag deleted" })))
}
