//! Application users. Password hashes never leave the store crate except
//! through [`UserCredentials`], which is not serializable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id:         i64,
  pub username:   String,
  pub email:      String,
  pub created_at: DateTime<Utc>,
}

/// A user row together with its argon2 PHC string.
#[derive(Debug, Clone)]
pub struct UserCredentials {
  pub user:          User,
  pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
  pub username:      String,
  pub email:         String,
  pub password_hash: String,
}
