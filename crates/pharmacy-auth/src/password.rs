//! Password hashing with argon2.
//!
//! Hashes are PHC strings with a random per-password salt. The argon2 cost
//! parameters are the crate defaults, fixed for the lifetime of the process.

use argon2::{
  Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _,
  password_hash::SaltString,
};
use rand_core::OsRng;

use crate::AuthError;

/// Hash `password` with a freshly generated salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check `password` against a stored PHC string.
///
/// The digest comparison inside argon2 is constant-time. An unparsable stored
/// hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(stored_hash) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_is_not_plaintext_and_verifies() {
    let hash = hash_password("secret123").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(!hash.contains("secret123"));
    assert!(verify_password("secret123", &hash));
    assert!(!verify_password("secret124", &hash));
  }

  #[test]
  fn same_password_hashes_differently() {
    let a = hash_password("secret123").unwrap();
    let b = hash_password("secret123").unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn garbage_hash_never_matches() {
    assert!(!verify_password("anything", "not-a-phc-string"));
  }
}
