//! Process-wide cooperative cancellation.
//!
//! A single [`ShutdownTrigger`] fans out to any number of [`Shutdown`]
//! handles. Nothing here knows about OS signals; the binary decides what
//! fires the trigger.

use tokio::sync::watch;

/// Fires the shutdown. Dropping the trigger also counts as firing it.
#[derive(Debug)]
pub struct ShutdownTrigger {
  tx: watch::Sender<bool>,
}

/// A cloneable view of the shutdown state.
#[derive(Debug, Clone)]
pub struct Shutdown {
  rx: watch::Receiver<bool>,
}

/// Create a linked trigger/handle pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
  let (tx, rx) = watch::channel(false);
  (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
  /// Signal every handle. Idempotent.
  pub fn trigger(&self) {
    self.tx.send_replace(true);
  }

  pub fn subscribe(&self) -> Shutdown { Shutdown { rx: self.tx.subscribe() } }
}

impl Shutdown {
  pub fn is_cancelled(&self) -> bool { *self.rx.borrow() }

  /// Resolve once shutdown has been requested. Returns immediately if it
  /// already has been.
  pub async fn cancelled(&mut self) {
    // An error means the trigger is gone, which is treated as cancellation.
    let _ = self.rx.wait_for(|cancelled| *cancelled).await;
  }
}
