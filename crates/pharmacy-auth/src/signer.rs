//! HS256 token signing and verification.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pharmacy_core::user::User;

use crate::{AuthError, SessionClaims, TokenConfig};

/// Signs session tokens and verifies them. Holds no store handle.
///
/// Cloning is cheap enough to hand a copy to every request-handling layer
/// that needs to authorise bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
  config:       TokenConfig,
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
}

impl TokenSigner {
  pub fn new(config: TokenConfig) -> Self {
    let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
    let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

    Self { config, encoding_key, decoding_key }
  }

  /// Issue a token for `user` expiring one TTL from now.
  pub fn issue(&self, user: &User) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = SessionClaims {
      user_id:    user.id,
      username:   user.username.clone(),
      issued_at:  now.timestamp(),
      expires_at: (now + self.config.ttl).timestamp(),
    };
    self.sign(&claims)
  }

  pub(crate) fn sign(&self, claims: &SessionClaims) -> Result<String, AuthError> {
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
      .map_err(AuthError::Signing)
  }

  /// Verify the signature and expiry of `token` and return its claims.
  ///
  /// Every failure (malformed input, wrong signature, expired token, wrong
  /// algorithm) collapses into [`AuthError::InvalidToken`].
  pub fn validate(&self, token: &str) -> Result<SessionClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
      .map(|data| data.claims)
      .map_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
        AuthError::InvalidToken
      })
  }
}
