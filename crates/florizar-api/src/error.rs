//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use florizar_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("authentication required")]
  Unauthorized,

  #[error("payload too large: {0}")]
  PayloadTooLarge(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the domain error it wraps. Anything that is
  /// not a not-found, conflict or validation failure is a 500.
  pub fn store<E: StoreError>(err: E) -> Self {
    match err.core() {
      Some(florizar_core::Error::NotFound(_)) => Self::NotFound(err.to_string()),
      Some(florizar_core::Error::Conflict(m)) => Self::Conflict(m.clone()),
      Some(florizar_core::Error::Invalid(m)) => Self::BadRequest(m.clone()),
      _ => Self::Store(Box::new(err)),
    }
  }
}

impl From<florizar_core::Error> for ApiError {
  fn from(err: florizar_core::Error) -> Self {
    match err {
      florizar_core::Error::NotFound(what) => Self::NotFound(format!("{what} not found")),
      florizar_core::Error::Conflict(m) => Self::Conflict(m),
      florizar_core::Error::Invalid(m) => Self::BadRequest(m),
      other => Self::BadRequest(other.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unauthorized => {
        return (
          StatusCode::UNAUTHORIZED,
          [(header::WWW_AUTHENTICATE, r#"Basic realm="florizar""#)],
          Json(json!({ "error": self.to_string() })),
        )
          .into_response();
      }
      ApiError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error)]
  enum FakeStoreError {
    #[error(transparent)]
    Core(florizar_core::Error),
    #[error("disk on fire")]
    Io,
  }

  impl StoreError for FakeStoreError {
    fn core(&self) -> Option<&florizar_core::Error> {
      match self {
        Self::Core(e) => Some(e),
        Self::Io => None,
      }
    }
  }

  #[test]
  fn store_errors_map_to_statuses() {
    let status = |e: FakeStoreError| ApiError::store(e).into_response().status();
    assert_eq!(
      status(FakeStoreError::Core(florizar_core::Error::NotFound("tag 3".into()))),
      StatusCode::NOT_FOUND
    );
    assert_eq!(
      status(FakeStoreError::Core(florizar_core::Error::Conflict("dup".into()))),
      StatusCode::CONFLICT
    );
    assert_eq!(
      status(FakeStoreError::Core(florizar_core::Error::Invalid("bad".into()))),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(status(FakeStoreError::Io), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn unauthorized_challenges_for_basic_credentials() {
    let resp = ApiError::Unauthorized.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let challenge = resp.headers().get(header::WWW_AUTHENTICATE).unwrap();
    assert!(challenge.to_str().unwrap().starts_with("Basic"));
  }
}
