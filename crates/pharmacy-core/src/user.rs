//! The authenticatable principal.
//!
//! A user row is written once at registration and read on every login. The
//! password is only ever stored as an argon2 PHC string.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted credential record.
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
  pub id:            i64,
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

impl fmt::Debug for User {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("User")
      .field("id", &self.id)
      .field("username", &self.username)
      .field("password_hash", &"[REDACTED]")
      .field("created_at", &self.created_at)
      .finish()
  }
}

/// Input to [`CredentialStore::insert`](crate::store::CredentialStore::insert).
/// The id and creation timestamp are assigned by the store.
#[derive(Clone)]
pub struct NewUser {
  pub username:      String,
  pub password_hash: String,
}

impl fmt::Debug for NewUser {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NewUser")
      .field("username", &self.username)
      .field("password_hash", &"[REDACTED]")
      .finish()
  }
}
