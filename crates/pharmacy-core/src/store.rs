//! Storage traits for credentials and medicines.
//!
//! The traits are implemented by storage backends (e.g.
//! `pharmacy-store-sqlite`). Higher layers (`pharmacy-auth`, `pharmacy-api`)
//! depend on these abstractions, not on any concrete backend.

use std::future::Future;

use crate::{
  medicine::{Medicine, MedicineInput},
  user::{NewUser, User},
};

// ─── Error classification ────────────────────────────────────────────────────

/// Implemented by backend error types so that callers can tell a uniqueness
/// violation apart from every other persistence failure without knowing the
/// backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` if the operation was rejected because a unique key already
  /// exists.
  fn is_duplicate(&self) -> bool;
}

// ─── Credentials ─────────────────────────────────────────────────────────────

/// Lookup and persistence of users.
///
/// Implementations must enforce username uniqueness and must be safe to share
/// between concurrently running request handlers.
pub trait CredentialStore: Send + Sync {
  type Error: StoreError;

  /// Retrieve a user by username. Returns `None` if not found.
  fn find_by_name<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Retrieve a user by id. Returns `None` if not found.
  fn find_by_id(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Persist a new user and return it with its store-assigned id.
  ///
  /// Fails with an error whose [`StoreError::is_duplicate`] is `true` if the
  /// username is already taken.
  fn insert(
    &self,
    user: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;
}

// ─── Medicines ───────────────────────────────────────────────────────────────

/// Conventional CRUD repository for medicines.
pub trait MedicineStore: Send + Sync {
  type Error: StoreError;

  /// Persist a new medicine. Id and timestamps are set by the store.
  fn create(
    &self,
    input: MedicineInput,
  ) -> impl Future<Output = Result<Medicine, Self::Error>> + Send + '_;

  /// Retrieve a medicine by id. Returns `None` if not found or deleted.
  fn get(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Medicine>, Self::Error>> + Send + '_;

  /// List all live medicines ordered by id.
  fn list(&self) -> impl Future<Output = Result<Vec<Medicine>, Self::Error>> + Send + '_;

  /// Replace the mutable fields of a medicine. Returns `None` if not found or
  /// deleted.
  fn update(
    &self,
    id: i64,
    input: MedicineInput,
  ) -> impl Future<Output = Result<Option<Medicine>, Self::Error>> + Send + '_;

  /// Soft-delete a medicine. Returns `false` if it was not found or already
  /// deleted.
  fn delete(&self, id: i64) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
