//! Domain events and their wire shapes.
//!
//! Field names are fixed: downstream consumers parse these payloads, so the
//! JSON produced here must not change shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Auth events ─────────────────────────────────────────────────────────────

/// A login attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginEvent {
  pub timestamp:   DateTime<Utc>,
  pub username:    String,
  pub success:     bool,
  pub description: String,
}

impl LoginEvent {
  pub fn succeeded(username: impl Into<String>) -> Self {
    Self {
      timestamp:   Utc::now(),
      username:    username.into(),
      success:     true,
      description: "Login successful".into(),
    }
  }

  pub fn failed(username: impl Into<String>) -> Self {
    Self {
      timestamp:   Utc::now(),
      username:    username.into(),
      success:     false,
      description: "Invalid credentials".into(),
    }
  }
}

/// A completed registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationEvent {
  pub timestamp: DateTime<Utc>,
  pub username:  String,
  pub message:   String,
}

impl RegistrationEvent {
  pub fn new(username: impl Into<String>) -> Self {
    Self {
      timestamp: Utc::now(),
      username:  username.into(),
      message:   "Registration successful".into(),
    }
  }
}

// ─── Medicine events ─────────────────────────────────────────────────────────

/// Which state change a [`MedicineEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MedicineAction {
  #[serde(rename = "medicine.created")]
  Created,
  #[serde(rename = "medicine.updated")]
  Updated,
  #[serde(rename = "medicine.deleted")]
  Deleted,
}

impl MedicineAction {
  pub fn as_str(self) -> &'static str {
    match self {
      MedicineAction::Created => "medicine.created",
      MedicineAction::Updated => "medicine.updated",
      MedicineAction::Deleted => "medicine.deleted",
    }
  }
}

/// A create, update or delete of a medicine record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineEvent {
  pub event:       MedicineAction,
  pub timestamp:   DateTime<Utc>,
  pub medicine_id: i64,
  /// Username of the authenticated actor.
  pub user:        String,
}

impl MedicineEvent {
  pub fn new(event: MedicineAction, medicine_id: i64, user: impl Into<String>) -> Self {
    Self { event, timestamp: Utc::now(), medicine_id, user: user.into() }
  }
}

// ─── Envelope ────────────────────────────────────────────────────────────────

/// Any event the service publishes.
///
/// Serialised untagged: the payload is exactly the inner record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
  Login(LoginEvent),
  Registration(RegistrationEvent),
  Medicine(MedicineEvent),
}

impl DomainEvent {
  /// Short, stable name used in logs and observer signals.
  pub fn kind(&self) -> &'static str {
    match self {
      DomainEvent::Login(e) if e.success => "login.succeeded",
      DomainEvent::Login(_) => "login.failed",
      DomainEvent::Registration(_) => "user.registered",
      DomainEvent::Medicine(e) => e.event.as_str(),
    }
  }

  /// Partitioning key: the username for auth events, the record id for
  /// medicine events.
  pub fn key(&self) -> String {
    match self {
      DomainEvent::Login(e) => e.username.clone(),
      DomainEvent::Registration(e) => e.username.clone(),
      DomainEvent::Medicine(e) => e.medicine_id.to_string(),
    }
  }
}

impl From<LoginEvent> for DomainEvent {
  fn from(e: LoginEvent) -> Self { DomainEvent::Login(e) }
}

impl From<RegistrationEvent> for DomainEvent {
  fn from(e: RegistrationEvent) -> Self { DomainEvent::Registration(e) }
}

impl From<MedicineEvent> for DomainEvent {
  fn from(e: MedicineEvent) -> Self { DomainEvent::Medicine(e) }
}
