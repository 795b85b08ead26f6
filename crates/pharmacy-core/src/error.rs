//! Error types for `pharmacy-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("username already taken: {0}")]
  DuplicateUsername(String),

  #[error("invalid medicine: {0}")]
  InvalidMedicine(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
