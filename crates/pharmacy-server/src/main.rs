//! pharmacy-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `PHARMACY_*`
//! environment variables, opens the SQLite store, starts the event pipeline
//! and serves the JSON API over HTTP until SIGINT or SIGTERM.
//!
//! # Shutdown
//!
//! On a signal the HTTP listener stops accepting and drains in-flight
//! requests while the consumer loop is cancelled. The process exits once the
//! consumer has released its subscription and the producer has flushed its
//! send buffer.
//!
//! # Password hash generation
//!
//! ```
//! cargo run -p pharmacy-server -- --hash-password
//! ```

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use pharmacy_api::AppState;
use pharmacy_auth::TokenService;
use pharmacy_events::{
  BrokerConsumer, BufferedProducer, ConsumerLoop, EventPublisher, MemoryBroker,
  PipelineObserver, TracingObserver, Transport, shutdown,
};
use pharmacy_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use settings::{BrokerKind, ServerConfig};

#[derive(Parser)]
#[command(author, version, about = "Pharmacy API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let hash = pharmacy_auth::password::hash_password(&password)?;
    println!("{hash}");
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
  let token_config = cfg.auth.token_config().context("invalid auth configuration")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);
  let tokens = TokenService::new(store.clone(), token_config)?;

  match cfg.broker.kind {
    BrokerKind::Memory => {
      let broker = MemoryBroker::with_retention(cfg.broker.memory_retention);
      let consumer = broker.consumer(cfg.broker.group_id.clone());
      run(&cfg, AppParts { store, tokens }, broker, consumer).await
    }
    #[cfg(feature = "amqp")]
    BrokerKind::Amqp => {
      use pharmacy_events::amqp::{AmqpConsumer, AmqpTransport};

      let broker = &cfg.broker;
      let transport = AmqpTransport::connect(&broker.url, broker.exchange.clone())
        .await
        .context("failed to connect the amqp producer")?;
      let consumer = AmqpConsumer::connect(&broker.url, broker.exchange.clone(), broker.group_id.clone())
        .await
        .context("failed to connect the amqp consumer")?;
      run(&cfg, AppParts { store, tokens }, transport, consumer).await
    }
    #[cfg(not(feature = "amqp"))]
    BrokerKind::Amqp => {
      anyhow::bail!("broker kind \"amqp\" requires building with the `amqp` feature")
    }
  }
}

struct AppParts {
  store:  Arc<SqliteStore>,
  tokens: TokenService<SqliteStore>,
}

/// Start the pipeline, serve until a shutdown signal and tear everything
/// down in order.
async fn run<T, C>(cfg: &ServerConfig, parts: AppParts, transport: T, consumer: C) -> anyhow::Result<()>
where
  T: Transport,
  C: BrokerConsumer + 'static,
{
  let address = cfg.address();
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  let observer: Arc<dyn PipelineObserver> = Arc::new(TracingObserver);
  let (trigger, shutdown) = shutdown::channel();

  let (producer, delivery) =
    BufferedProducer::spawn(transport, cfg.broker.delivery(), observer.clone());
  let events = EventPublisher::new(Arc::new(producer), cfg.broker.topics(), observer.clone());

  // A failed subscription is fatal; nothing is spawned for it.
  let consumer = ConsumerLoop::subscribe(
    consumer,
    vec![cfg.broker.consume_topic.clone()],
    shutdown,
    observer,
  )
  .await
  .context("failed to subscribe the event consumer")?
  .spawn();

  let app = pharmacy_api::router(AppState { store: parts.store, tokens: parts.tokens, events });

  tracing::info!("Listening on http://{address}");
  // The trigger lives inside the graceful-shutdown future. If the server
  // fails instead, dropping that future drops the trigger, which cancels the
  // consumer all the same.
  let served = axum::serve(listener, app)
    .with_graceful_shutdown(async move {
      shutdown_signal().await;
      trigger.trigger();
    })
    .await;

  let consumed = consumer.join().await;
  tracing::info!(
    processed = consumed.processed,
    read_errors = consumed.read_errors,
    commit_failures = consumed.commit_failures,
    "consumer released"
  );

  // The router, and with it the last publisher handle, is gone once `serve`
  // returns, so the delivery task drains and exits.
  let delivered = delivery.flushed().await;
  tracing::info!(delivered = delivered.delivered, failed = delivered.failed, "producer flushed");

  served.context("server error")
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl+C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{SignalKind, signal};
    match signal(SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => tracing::info!("Ctrl+C received, shutting down"),
    _ = terminate => tracing::info!("SIGTERM received, shutting down"),
  }
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
