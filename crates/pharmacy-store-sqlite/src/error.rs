//! Error type for `pharmacy-store-sqlite`.

use pharmacy_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] pharmacy_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl StoreError for Error {
  fn is_duplicate(&self) -> bool {
    matches!(self, Error::Core(pharmacy_core::Error::DuplicateUsername(_)))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `true` if `err` is SQLite rejecting a row on a `UNIQUE` constraint.
pub(crate) fn is_unique_violation(err: &tokio_rusqlite::Error) -> bool {
  matches!(
    err,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}
