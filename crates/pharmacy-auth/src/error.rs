//! Error type for `pharmacy-auth`.

use thiserror::Error;

/// Failures surfaced by [`TokenService`](crate::TokenService).
///
/// `InvalidCredentials` is returned both for an unknown username and for a
/// wrong password. Callers must not be able to tell the two apart.
#[derive(Debug, Error)]
pub enum AuthError {
  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("username already taken")]
  DuplicateSubject,

  #[error("invalid token")]
  InvalidToken,

  #[error("configuration error: {0}")]
  Config(String),

  #[error("password hashing failed: {0}")]
  Hash(String),

  #[error("token signing failed: {0}")]
  Signing(#[source] jsonwebtoken::errors::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}
