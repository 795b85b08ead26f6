//! The domain record managed through the CRUD API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A stored medicine. Deleted medicines are soft-deleted by the store and
/// never surface through reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
  pub id:          i64,
  pub name:        String,
  pub description: String,
  pub price:       f64,
  pub quantity:    i64,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

/// The mutable fields of a medicine, accepted on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineInput {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  pub price:       f64,
  pub quantity:    i64,
}

impl MedicineInput {
  /// Reject inputs the store must never hold. Prices and quantities are
  /// non-negative; the name is required.
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::InvalidMedicine("name must not be empty".into()));
    }
    if !self.price.is_finite() || self.price < 0.0 {
      return Err(Error::InvalidMedicine(
        "price must be a non-negative number".into(),
      ));
    }
    if self.quantity < 0 {
      return Err(Error::InvalidMedicine("quantity must not be negative".into()));
    }
    Ok(())
  }
}
