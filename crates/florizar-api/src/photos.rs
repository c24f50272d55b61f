//! Handlers for `/photos` endpoints, plus the upload directory bookkeeping
//! shared with the contact and job-site delete handlers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`   | `/photos/upload/:job_site_id` | Multipart: `photo`, optional `description` |
//! | `POST`   | `/photos/upload-multiple/:job_site_id` | Multipart: up to 10 `photos` |
//! | `GET`    | `/photos/job-site/:job_site_id` | Alias: `/chantier/:job_site_id` |
//! | `PUT`    | `/photos/:id` | Body: `{"description": ...}` |
//! | `DELETE` | `/photos/:id` | Removes the file too |
//!
//! Files are stored under a server-generated `<uuid>.<ext>` name; the name
//! the client sent is only kept for display. A multi-file upload stores all
//! of its files or none of them.

use std::path::{Path as FsPath, PathBuf};

use axum::{
  Json, Router,
  body::Bytes,
  extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
  http::StatusCode,
  response::IntoResponse,
  routing::{get, post, put},
};
use florizar_core::{
  photo::{NewPhoto, Photo},
  store::FlorizarStore,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Most files accepted by one `upload-multiple` request.
pub const MAX_FILES: usize = 10;

/// Lowercase file extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

/// Room for multipart boundaries and the text fields around the files.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes<S>(max_bytes: usize) -> Router<AppState<S>>
where
  S: FlorizarStore + Clone + 'static,
{
  let body_limit = max_bytes
    .saturating_mul(MAX_FILES)
    .saturating_add(MULTIPART_OVERHEAD);

  Router::new()
    .route("/upload/{job_site_id}", post(upload_one::<S>))
    .route("/upload-multiple/{job_site_id}", post(upload_many::<S>))
    .route("/job-site/{job_site_id}", get(for_job_site::<S>))
    .route("/chantier/{job_site_id}", get(for_job_site::<S>))
    .route("/{id}", put(update::<S>).delete(delete_one::<S>))
    .layer(DefaultBodyLimit::max(body_limit))
}

// ─── Multipart intake ─────────────────────────────────────────────────────────

/// One file pulled out of a multipart body, already checked.
#[derive(Debug)]
struct Upload {
  original_name: String,
  extension:     String,
  bytes:         Bytes,
}

/// The lowercase extension of `name` if it is an accepted image type.
pub fn image_extension(name: &str) -> Option<String> {
  let ext = FsPath::new(name)
    .extension()?
    .to_str()?
    .to_ascii_lowercase();
  ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn multipart_error(err: MultipartError) -> ApiError {
  if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
    ApiError::PayloadTooLarge(err.body_text())
  } else {
    ApiError::BadRequest(err.body_text())
  }
}

fn only_images() -> ApiError {
  ApiError::BadRequest(format!(
    "only images are accepted ({})",
    ALLOWED_EXTENSIONS.join(", ")
  ))
}

/// Drain `multipart`, collecting files sent under `file_field` and the
/// optional `description` text field. Other fields are ignored.
async fn read_uploads(
  mut multipart: Multipart,
  file_field: &str,
  max_files: usize,
  max_bytes: usize,
) -> Result<(Vec<Upload>, Option<String>), ApiError> {
  let mut uploads = Vec::new();
  let mut description = None;

  while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
    let name = field.name().unwrap_or_default().to_owned();

    if name == "description" {
      let text = field.text().await.map_err(multipart_error)?;
      let text = text.trim();
      description = (!text.is_empty()).then(|| text.to_owned());
      continue;
    }
    if name != file_field {
      continue;
    }

    if uploads.len() == max_files {
      return Err(ApiError::BadRequest(format!(
        "at most {max_files} files per request"
      )));
    }

    let original_name = field.file_name().unwrap_or_default().to_owned();
    let extension = image_extension(&original_name).ok_or_else(only_images)?;
    if field
      .content_type()
      .is_some_and(|ct| !ct.starts_with("image/"))
    {
      return Err(only_images());
    }

    let bytes = field.bytes().await.map_err(multipart_error)?;
    if bytes.len() > max_bytes {
      return Err(ApiError::PayloadTooLarge(format!(
        "{original_name} exceeds {max_bytes} bytes"
      )));
    }
    uploads.push(Upload { original_name, extension, bytes });
  }

  if uploads.is_empty() {
    return Err(ApiError::BadRequest("no photo provided".into()));
  }
  Ok((uploads, description))
}

// ─── Files on disk ────────────────────────────────────────────────────────────

/// `dir/filename`, or `None` if `filename` is not a bare file name.
fn stored_path(dir: &FsPath, filename: &str) -> Option<PathBuf> {
  let bare = FsPath::new(filename).file_name()?;
  (bare == filename).then(|| dir.join(bare))
}

/// Write `upload` under a fresh name and record it against `job_site_id`.
/// The file is removed again if the row cannot be inserted.
async fn save<S>(
  state: &AppState<S>,
  job_site_id: i64,
  upload: Upload,
  description: Option<String>,
) -> Result<Photo, ApiError>
where
  S: FlorizarStore,
{
  let dir = &state.uploads.dir;
  tokio::fs::create_dir_all(dir)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  let filename = format!("{}.{}", Uuid::new_v4(), upload.extension);
  let path = dir.join(&filename);
  tokio::fs::write(&path, &upload.bytes)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  let input = NewPhoto {
    job_site_id,
    filename,
    original_name: upload.original_name,
    description,
  };
  match state.store.add_photo(input).await {
    Ok(photo) => Ok(photo),
    Err(e) => {
      if let Err(io) = tokio::fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %io, "could not remove orphaned upload");
      }
      Err(ApiError::store(e))
    }
  }
}

/// Best-effort removal of the files behind `photos`. Missing files are not an
/// error; other failures are logged and skipped.
pub async fn remove_files(dir: &FsPath, photos: &[Photo]) {
  for photo in photos {
    let Some(path) = stored_path(dir, &photo.filename) else {
      tracing::warn!(filename = %photo.filename, "refusing to remove a non-bare file name");
      continue;
    };
    match tokio::fs::remove_file(&path).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove photo file"),
    }
  }
}

/// Undo the saves of a multi-file upload that did not complete: delete the
/// rows, then the files.
pub(crate) async fn forget<S>(state: &AppState<S>, photos: &[Photo])
where
  S: FlorizarStore,
{
  for photo in photos {
    if let Err(e) = state.store.delete_photo(photo.id).await {
      tracing::warn!(photo_id = photo.id, error = %e, "could not remove photo row");
    }
  }
  remove_files(&state.uploads.dir, photos).await;
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

/// `POST /photos/upload/:job_site_id`
pub async fn upload_one<S>(
  State(state): State<AppState<S>>,
  Path(job_site_id): Path<i64>,
  multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
  S: FlorizarStore,
{
  let (uploads, description) =
    read_uploads(multipart, "photo", 1, state.uploads.max_bytes).await?;
  let upload = uploads
    .into_iter()
    .next()
    .ok_or_else(|| ApiError::BadRequest("no photo provided".into()))?;
  let photo = save(&state, job_site_id, upload, description).await?;
  tracing::info!(job_site_id, photo_id = photo.id, "stored photo");
  Ok((StatusCode::CREATED, Json(photo)))
}

/// `POST /photos/upload-multiple/:job_site_id`
pub async fn upload_many<S>(
  State(state): State<AppState<S>>,
  Path(job_site_id): Path<i64>,
  multipart: Multipart,
) -> Result<impl IntoResponse, ApiError>
where
  S: FlorizarStore,
{
  let (uploads, _) =
    read_uploads(multipart, "photos", MAX_FILES, state.uploads.max_bytes).await?;
  let mut photos = Vec::with_capacity(uploads.len());
  for upload in uploads {
    match save(&state, job_site_id, upload, None).await {
      Ok(photo) => photos.push(photo),
      Err(e) => {
        forget(&state, &photos).await;
        return Err(e);
      }
    }
  }
  tracing::info!(job_site_id, count = photos.len(), "stored photos");
  Ok((StatusCode::CREATED, Json(photos)))
}

/// `GET /photos/job-site/:job_site_id`
pub async fn for_job_site<S>(
  State(state): State<AppState<S>>,
  Path(job_site_id): Path<i64>,
) -> Result<Json<Vec<Photo>>, ApiError>
where
  S: FlorizarStore,
{
  let photos = state
    .store
    .photos_for_job_site(job_site_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(photos))
}

#[derive(Debug, Deserialize)]
pub struct DescriptionBody {
  #[serde(default)]
  pub description: Option<String>,
}

/// `PUT /photos/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Json(body): Json<DescriptionBody>,
) -> Result<Json<Photo>, ApiError>
where
  S: FlorizarStore,
{
  let photo = state
    .store
    .update_photo_description(id, body.description)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("photo {id} not found")))?;
  Ok(Json(photo))
}

/// `DELETE /photos/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError>
where
  S: FlorizarStore,
{
  let photo = state
    .store
    .delete_photo(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("photo {id} not found")))?;
  remove_files(&state.uploads.dir, std::slice::from_ref(&photo)).await;
  Ok(Json(json!({ "message": "photo deleted" })))
}
