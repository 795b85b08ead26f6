//! Session claims carried inside a signed token.

use serde::{Deserialize, Serialize};

/// The verified contents of a session token.
///
/// Timestamps are Unix seconds. They use the registered JWT claim names
/// `iat` and `exp` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
  pub user_id:    i64,
  pub username:   String,
  #[serde(rename = "iat")]
  pub issued_at:  i64,
  #[serde(rename = "exp")]
  pub expires_at: i64,
}
