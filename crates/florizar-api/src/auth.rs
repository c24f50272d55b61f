//! Account registration, login, and the HTTP Basic-auth middleware.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/register` | Body: `{"username", "email", "password"}` |
//! | `POST` | `/auth/login` | Body: `{"username", "password"}`, 401 on mismatch |

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  Json,
  extract::{Request, State},
  http::{HeaderMap, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use florizar_core::{
  store::FlorizarStore,
  user::{NewUser, User},
};
use rand_core::OsRng;
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, error::ApiError};

/// The user a request was authenticated as. Inserted into the request
/// extensions by [`require_user`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

// ─── Credentials ──────────────────────────────────────────────────────────────

/// Split an `Authorization: Basic` header into username and password.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

/// Look `username` up and check `password` against its stored hash.
/// Unknown users and wrong passwords are indistinguishable to the caller.
pub async fn verify_user<S>(store: &S, username: String, password: &str) -> Result<User, ApiError>
where
  S: FlorizarStore,
{
  let creds = store
    .find_user(username)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&creds.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(creds.user)
}

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| ApiError::Store(e.to_string().into()))?;
  Ok(hash.to_string())
}

/// Reject the request with 401 unless it carries valid credentials.
pub async fn require_user<S>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Result<Response, ApiError>
where
  S: FlorizarStore,
{
  let (username, password) = basic_credentials(req.headers())?;
  let user = verify_user(state.store.as_ref(), username, &password).await?;
  tracing::debug!(user = %user.username, "authenticated");
  req.extensions_mut().insert(CurrentUser(user));
  Ok(next.run(req).await)
}

// ─── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username: String,
  pub email:    String,
  pub password: String,
}

impl RegisterBody {
  fn validate(mut self) -> Result<Self, ApiError> {
    self.username = self.username.trim().to_owned();
    self.email = self.email.trim().to_lowercase();

    let len = self.username.chars().count();
    if !(3..=30).contains(&len) {
      return Err(ApiError::BadRequest(
        "username must be between 3 and 30 characters".into(),
      ));
    }
    if !self
      .username
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
      return Err(ApiError::BadRequest(
        "username may only contain letters, digits, '-' and '_'".into(),
      ));
    }
    if !self.email.contains('@') || self.email.chars().count() > 100 {
      return Err(ApiError::BadRequest("email is not valid".into()));
    }
    if !is_strong_password(&self.password) {
      return Err(ApiError::BadRequest(
        "password needs at least 8 characters with a lowercase letter, an \
         uppercase letter, a digit and a symbol"
          .into(),
      ));
    }
    Ok(self)
  }
}

fn is_strong_password(p: &str) -> bool {
  p.chars().count() >= 8
    && p.chars().any(|c| c.is_ascii_lowercase())
    && p.chars().any(|c| c.is_ascii_uppercase())
    && p.chars().any(|c| c.is_ascii_digit())
    && p.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

/// `POST /auth/register`
pub async fn register<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: FlorizarStore,
{
  let body = body.validate()?;
  let password_hash = hash_password(&body.password)?;
  let user = state
    .store
    .create_user(NewUser { username: body.username, email: body.email, password_hash })
    .await
    .map_err(ApiError::store)?;
  tracing::info!(user = %user.username, "registered user");
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub username: String,
  pub password: String,
}

/// `POST /auth/login`: checks the credentials the client will then send as
/// Basic auth on every request.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: FlorizarStore,
{
  let user = verify_user(
    state.store.as_ref(),
    body.username.trim().to_owned(),
    &body.password,
  )
  .await?;
  Ok(Json(json!({ "user": user })))
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn basic(user: &str, pass: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let encoded = B64.encode(format!("{user}:{pass}"));
    headers.insert(
      header::AUTHORIZATION,
      HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
    );
    headers
  }

  #[test]
  fn basic_header_is_split() {
    let (user, pass) = basic_credentials(&basic("jardin", "pa:ss")).unwrap();
    assert_eq!(user, "jardin");
    assert_eq!(pass, "pa:ss");
  }

  #[test]
  fn missing_header() {
    assert!(matches!(
      basic_credentials(&HeaderMap::new()),
      Err(ApiError::Unauthorized)
    ));
  }

  #[test]
  fn invalid_base64() {
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      HeaderValue::from_static("Basic !!!not-base64!!!"),
    );
    assert!(matches!(basic_credentials(&headers), Err(ApiError::Unauthorized)));
  }

  #[test]
  fn bearer_tokens_are_not_accepted() {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
    assert!(matches!(basic_credentials(&headers), Err(ApiError::Unauthorized)));
  }

  #[test]
  fn hashes_verify() {
    let hash = hash_password("S3cret!pw").unwrap();
    let parsed = PasswordHash::new(&hash).unwrap();
    assert!(Argon2::default().verify_password(b"S3cret!pw", &parsed).is_ok());
    assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
  }

  #[test]
  fn password_strength() {
    assert!(is_strong_password("Jardin#2024"));
    assert!(!is_strong_password("jardin#2024"));
    assert!(!is_strong_password("JARDIN#2024"));
    assert!(!is_strong_password("Jardin2024"));
    assert!(!is_strong_password("J#d2"));
  }

  #[test]
  fn registration_rules() {
    let body = |username: &str, email: &str| RegisterBody {
      username: username.into(),
      email:    email.into(),
      password: "Jardin#2024".into(),
    };
    let ok = body("  paul_m ", " Paul@Example.fr ").validate().unwrap();
    assert_eq!(ok.username, "paul_m");
    assert_eq!(ok.email, "paul@example.fr");
    assert!(body("pm", "p@x.fr").validate().is_err());
    assert!(body("paul m", "p@x.fr").validate().is_err());
    assert!(body("paul", "nope").validate().is_err());
  }
}
