//! Token configuration.

use std::fmt;

use chrono::Duration;

use crate::AuthError;

/// Minimum accepted length of the signing secret, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Lifetime of an issued session token, in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Secret and lifetime used to sign and verify session tokens.
#[derive(Clone)]
pub struct TokenConfig {
  pub(crate) secret: String,
  pub(crate) ttl:    Duration,
}

impl fmt::Debug for TokenConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TokenConfig")
      .field("secret", &"[REDACTED]")
      .field("ttl", &self.ttl)
      .finish()
  }
}

impl TokenConfig {
  /// Build a configuration around `secret` with the default one-hour TTL.
  ///
  /// # Errors
  /// Returns [`AuthError::Config`] if the secret is shorter than
  /// [`MIN_SECRET_LENGTH`] bytes.
  pub fn new(secret: impl Into<String>) -> Result<Self, AuthError> {
    let secret = secret.into();

    if secret.len() < MIN_SECRET_LENGTH {
      return Err(AuthError::Config(format!(
        "JWT secret must be at least {MIN_SECRET_LENGTH} bytes, got {}",
        secret.len()
      )));
    }

    Ok(Self { secret, ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS) })
  }

  /// Override the token lifetime.
  ///
  /// # Errors
  /// Returns [`AuthError::Config`] if `ttl` is not positive.
  pub fn with_ttl(mut self, ttl: Duration) -> Result<Self, AuthError> {
    if ttl <= Duration::zero() {
      return Err(AuthError::Config("token TTL must be positive".into()));
    }
    self.ttl = ttl;
    Ok(self)
  }

  pub fn ttl(&self) -> Duration { self.ttl }
}
