//! SQLite backend for the pharmacy service.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One [`SqliteStore`] implements both
//! [`CredentialStore`](pharmacy_core::store::CredentialStore) and
//! [`MedicineStore`](pharmacy_core::store::MedicineStore).

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
