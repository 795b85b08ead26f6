//! Registration, login and token validation.

use std::sync::Arc;

use pharmacy_core::{
  store::{CredentialStore, StoreError as _},
  user::{NewUser, User},
};

use crate::{
  AuthError, SessionClaims, TokenConfig, TokenSigner,
  password::{hash_password, verify_password},
};

/// Verifies passwords against a [`CredentialStore`] and issues session tokens.
pub struct TokenService<S> {
  store:      Arc<S>,
  signer:     TokenSigner,
  /// Verified against when the username is unknown, so a miss costs the same
  /// argon2 work as a wrong password.
  dummy_hash: String,
}

impl<S> Clone for TokenService<S> {
  fn clone(&self) -> Self {
    Self {
      store:      self.store.clone(),
      signer:     self.signer.clone(),
      dummy_hash: self.dummy_hash.clone(),
    }
  }
}

impl<S: CredentialStore> TokenService<S> {
  pub fn new(store: Arc<S>, config: TokenConfig) -> Result<Self, AuthError> {
    Ok(Self {
      store,
      signer: TokenSigner::new(config),
      dummy_hash: hash_password("pharmacy-timing-equaliser")?,
    })
  }

  /// Hash `password` and persist a new user.
  ///
  /// Non-empty fields are the caller's responsibility.
  pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
    let password_hash = hash_password(password)?;

    let user = self
      .store
      .insert(NewUser { username: username.to_owned(), password_hash })
      .await
      .map_err(|e| {
        if e.is_duplicate() {
          AuthError::DuplicateSubject
        } else {
          AuthError::Store(Box::new(e))
        }
      })?;

    tracing::debug!(user_id = user.id, username = %user.username, "registered user");
    Ok(user)
  }

  /// Check `username`/`password` and issue a session token on success.
  ///
  /// An unknown username and a wrong password both yield
  /// [`AuthError::InvalidCredentials`].
  pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
    let user = self
      .store
      .find_by_name(username)
      .await
      .map_err(|e| AuthError::Store(Box::new(e)))?;

    let Some(user) = user else {
      verify_password(password, &self.dummy_hash);
      return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash) {
      return Err(AuthError::InvalidCredentials);
    }

    self.signer.issue(&user)
  }

  /// Verify `token` without consulting the store.
  pub fn validate_token(&self, token: &str) -> Result<SessionClaims, AuthError> {
    self.signer.validate(token)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use chrono::Utc;
  use pharmacy_core::store::StoreError;
  use tokio::sync::Mutex;

  use super::*;

  // ─── In-memory credential store ─────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  enum FakeError {
    #[error("duplicate")]
    Duplicate,
    #[error("store offline")]
    Offline,
  }

  impl StoreError for FakeError {
    fn is_duplicate(&self) -> bool { matches!(self, FakeError::Duplicate) }
  }

  #[derive(Default)]
  struct MemoryCredentials {
    users:   Mutex<HashMap<String, User>>,
    offline: bool,
  }

  impl MemoryCredentials {
    async fn len(&self) -> usize { self.users.lock().await.len() }
  }

  impl CredentialStore for MemoryCredentials {
    type Error = FakeError;

    async fn find_by_name(&self, username: &str) -> Result<Option<User>, FakeError> {
      if self.offline {
        return Err(FakeError::Offline);
      }
      Ok(self.users.lock().await.get(username).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, FakeError> {
      if self.offline {
        return Err(FakeError::Offline);
      }
      Ok(self.users.lock().await.values().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, FakeError> {
      if self.offline {
        return Err(FakeError::Offline);
      }
      let mut users = self.users.lock().await;
      if users.contains_key(&user.username) {
        return Err(FakeError::Duplicate);
      }
      let stored = User {
        id:            users.len() as i64 + 1,
        username:      user.username,
        password_hash: user.password_hash,
        created_at:    Utc::now(),
      };
      users.insert(stored.username.clone(), stored.clone());
      Ok(stored)
    }
  }

  fn config() -> TokenConfig {
    TokenConfig::new("test-secret-32-bytes-long-key-99").unwrap()
  }

  fn service() -> (TokenService<MemoryCredentials>, Arc<MemoryCredentials>) {
    let store = Arc::new(MemoryCredentials::default());
    (TokenService::new(store.clone(), config()).unwrap(), store)
  }

  // ─── Register / login ───────────────────────────────────────────────────

  #[tokio::test]
  async fn register_then_login_yields_valid_token() {
    let (svc, _) = service();
    let user = svc.register("alice", "secret123").await.unwrap();
    assert_ne!(user.password_hash, "secret123");

    let token = svc.login("alice", "secret123").await.unwrap();
    let claims = svc.validate_token(&token).unwrap();
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.user_id, user.id);
    assert!(claims.expires_at > Utc::now().timestamp());
  }

  #[tokio::test]
  async fn wrong_password_and_unknown_user_fail_identically() {
    let (svc, _) = service();
    svc.register("alice", "secret123").await.unwrap();

    let wrong = svc.login("alice", "wrongpass").await.unwrap_err();
    let unknown = svc.login("bob", "anything").await.unwrap_err();

    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert_eq!(wrong.to_string(), unknown.to_string());
  }

  #[tokio::test]
  async fn duplicate_registration_keeps_one_user() {
    let (svc, store) = service();
    svc.register("alice", "secret123").await.unwrap();

    let err = svc.register("alice", "other-password").await.unwrap_err();
    assert!(matches!(err, AuthError::DuplicateSubject));
    assert_eq!(store.len().await, 1);

    // The original password still works.
    assert!(svc.login("alice", "secret123").await.is_ok());
  }

  #[tokio::test]
  async fn store_failure_on_register_is_a_store_error() {
    let store = Arc::new(MemoryCredentials { offline: true, ..Default::default() });
    let svc = TokenService::new(store, config()).unwrap();
    let err = svc.register("alice", "secret123").await.unwrap_err();
    assert!(matches!(err, AuthError::Store(_)));
  }

  #[tokio::test]
  async fn validation_does_not_need_the_store() {
    let (svc, _) = service();
    svc.register("alice", "secret123").await.unwrap();
    let token = svc.login("alice", "secret123").await.unwrap();

    // A service over a dead store still validates the token.
    let offline = Arc::new(MemoryCredentials { offline: true, ..Default::default() });
    let detached = TokenService::new(offline, config()).unwrap();
    assert_eq!(detached.validate_token(&token).unwrap().username, "alice");
  }

  #[tokio::test]
  async fn token_from_another_secret_is_rejected() {
    let (svc, _) = service();
    svc.register("alice", "secret123").await.unwrap();
    let token = svc.login("alice", "secret123").await.unwrap();

    let other = TokenSigner::new(
      TokenConfig::new("a-completely-different-secret-123").unwrap(),
    );
    assert!(matches!(other.validate(&token), Err(AuthError::InvalidToken)));
  }
}
