//! Runtime configuration.
//!
//! Loaded from an optional TOML file overlaid by `PHARMACY_*` environment
//! variables. Nested keys use `__`, e.g. `PHARMACY_AUTH__JWT_SECRET` or
//! `PHARMACY_BROKER__KIND=amqp`.

use std::{fmt, path::{Path, PathBuf}, time::Duration};

use config::{Config, ConfigError, Environment, File, FileFormat};
use pharmacy_auth::{AuthError, TokenConfig, config::DEFAULT_TOKEN_TTL_SECS};
use pharmacy_events::{DeliveryConfig, EventTopics, memory::DEFAULT_RETENTION};
use serde::Deserialize;

const ENV_PREFIX: &str = "PHARMACY";

// ─── Server ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  pub auth:       AuthSettings,
  #[serde(default)]
  pub broker:     BrokerSettings,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8082 }
fn default_store_path() -> PathBuf { PathBuf::from("pharmacy.db") }

impl ServerConfig {
  /// Read `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(env_source())
      .build()?
      .try_deserialize()
  }

  /// Parse a TOML document without consulting the environment.
  pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
    Config::builder()
      .add_source(File::from_str(source, FileFormat::Toml))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

fn env_source() -> Environment {
  Environment::with_prefix(ENV_PREFIX)
    .prefix_separator("_")
    .separator("__")
    .try_parsing(true)
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[derive(Clone, Deserialize)]
pub struct AuthSettings {
  pub jwt_secret:     String,
  /// Token lifetime. Defaults to one hour; must be positive.
  #[serde(default = "default_token_ttl_secs")]
  pub token_ttl_secs: i64,
}

fn default_token_ttl_secs() -> i64 { DEFAULT_TOKEN_TTL_SECS }

impl AuthSettings {
  /// Validate the secret and TTL.
  pub fn token_config(&self) -> Result<TokenConfig, AuthError> {
    TokenConfig::new(self.jwt_secret.clone())?
      .with_ttl(chrono::Duration::seconds(self.token_ttl_secs))
  }
}

impl fmt::Debug for AuthSettings {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AuthSettings")
      .field("jwt_secret", &"[redacted]")
      .field("token_ttl_secs", &self.token_ttl_secs)
      .finish()
  }
}

// ─── Broker ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
  /// In-process broker. Events do not leave the process.
  #[default]
  Memory,
  /// RabbitMQ or any AMQP 0-9-1 broker. Requires the `amqp` feature.
  Amqp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
  pub kind:                BrokerKind,
  pub url:                 String,
  pub exchange:            String,
  pub group_id:            String,
  pub consume_topic:       String,
  pub login_topic:         String,
  pub registration_topic:  String,
  pub medicine_topic:      String,
  pub buffer_capacity:     usize,
  pub delivery_timeout_ms: u64,
  /// Records the in-process broker keeps per topic.
  pub memory_retention:    usize,
}

impl Default for BrokerSettings {
  fn default() -> Self {
    let topics = EventTopics::default();
    let delivery = DeliveryConfig::default();
    Self {
      kind:                BrokerKind::Memory,
      url:                 "amqp://127.0.0.1:5672/%2f".into(),
      exchange:            "pharmacy".into(),
      group_id:            "my-group".into(),
      consume_topic:       topics.medicine.clone(),
      login_topic:         topics.login,
      registration_topic:  topics.registration,
      medicine_topic:      topics.medicine,
      buffer_capacity:     delivery.capacity,
      delivery_timeout_ms: delivery.timeout.as_millis() as u64,
      memory_retention:    DEFAULT_RETENTION,
    }
  }
}

impl BrokerSettings {
  pub fn topics(&self) -> EventTopics {
    EventTopics {
      login:        self.login_topic.clone(),
      registration: self.registration_topic.clone(),
      medicine:     self.medicine_topic.clone(),
    }
  }

  pub fn delivery(&self) -> DeliveryConfig {
    DeliveryConfig {
      capacity: self.buffer_capacity,
      timeout:  Duration::from_millis(self.delivery_timeout_ms),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &str = "0123456789abcdef0123456789abcdef";

  #[test]
  fn defaults_fill_everything_but_the_secret() {
    let cfg = ServerConfig::from_toml(&format!("[auth]\njwt_secret = \"{SECRET}\"\n")).unwrap();

    assert_eq!(cfg.port, 8082);
    assert_eq!(cfg.address(), "0.0.0.0:8082");
    assert_eq!(cfg.auth.token_ttl_secs, 3600);
    assert_eq!(cfg.broker.kind, BrokerKind::Memory);
    assert_eq!(cfg.broker.group_id, "my-group");
    assert_eq!(cfg.broker.consume_topic, "medicine-events");
    assert_eq!(cfg.broker.topics(), EventTopics::default());
    assert_eq!(cfg.broker.delivery().timeout, Duration::from_secs(5));
    assert_eq!(cfg.broker.memory_retention, 10_000);
    assert!(cfg.auth.token_config().is_ok());
  }

  #[test]
  fn missing_secret_is_an_error() {
    assert!(ServerConfig::from_toml("port = 9000\n").is_err());
  }

  #[test]
  fn short_secret_is_rejected() {
    let cfg = ServerConfig::from_toml("[auth]\njwt_secret = \"too-short\"\n").unwrap();
    assert!(matches!(cfg.auth.token_config(), Err(AuthError::Config(_))));
  }

  #[test]
  fn broker_section_overrides() {
    let cfg = ServerConfig::from_toml(&format!(
      r#"
        port = 9000

        [auth]
        jwt_secret = "{SECRET}"
        token_ttl_secs = 60

        [broker]
        kind = "amqp"
        group_id = "audit"
        medicine_topic = "meds"
        consume_topic = "meds"
        buffer_capacity = 16
        memory_retention = 500
      "#
    ))
    .unwrap();

    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.broker.kind, BrokerKind::Amqp);
    assert_eq!(cfg.broker.topics().medicine, "meds");
    assert_eq!(cfg.broker.topics().login, "login-events");
    assert_eq!(cfg.broker.delivery().capacity, 16);
    assert_eq!(cfg.broker.memory_retention, 500);
    assert_eq!(cfg.auth.token_config().unwrap().ttl(), chrono::Duration::seconds(60));
  }

  #[test]
  fn debug_output_hides_the_secret() {
    let cfg = ServerConfig::from_toml(&format!("[auth]\njwt_secret = \"{SECRET}\"\n")).unwrap();
    assert!(!format!("{cfg:?}").contains(SECRET));
  }
}
