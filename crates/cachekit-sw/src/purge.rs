//! Expired-entry purge protocol.
//!
//! A second worker owns expired-entry cleanup so it never runs on the
//! request path. The page posts it a one-shot structured message after
//! registration; the worker sweeps the precache bucket when, and only
//! when, that exact action arrives. Fire-and-forget: no acknowledgement
//! travels back.

use std::time::SystemTime;

use cachekit_store::BucketStore;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::SwError;

/// Action requesting an expired-entry sweep of the precache bucket.
pub const PURGE_EXPIRED_ACTION: &str = "PURGE_EXPIRED";

/// Structured message crossing the channel, serialized to JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub action: String,
}

impl WorkerCommand {
    /// The purge request.
    pub fn purge_expired() -> Self {
        Self {
            action: PURGE_EXPIRED_ACTION.to_string(),
        }
    }
}

/// Sending half of the purge protocol.
#[derive(Debug, Clone)]
pub struct PurgeChannel {
    tx: mpsc::UnboundedSender<String>,
}

impl PurgeChannel {
    /// Serialize and post a command to the companion worker.
    ///
    /// Delivery failure (the worker is gone) surfaces as
    /// [`SwError::PurgeDeliveryFailed`]; callers are expected to log it
    /// and move on.
    pub fn post(&self, command: &WorkerCommand) -> Result<(), SwError> {
        let payload = serde_json::to_string(command)
            .map_err(|e| SwError::PurgeDeliveryFailed(e.to_string()))?;
        self.tx
            .send(payload)
            .map_err(|e| SwError::PurgeDeliveryFailed(e.to_string()))
    }
}

/// Companion worker draining purge requests.
pub struct PurgeWorker {
    rx: mpsc::UnboundedReceiver<String>,
    store: BucketStore,
    precache_bucket: String,
}

impl PurgeWorker {
    /// Create a connected channel/worker pair over `store`.
    pub fn channel(
        store: BucketStore,
        precache_bucket: impl Into<String>,
    ) -> (PurgeChannel, PurgeWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            PurgeChannel { tx },
            PurgeWorker {
                rx,
                store,
                precache_bucket: precache_bucket.into(),
            },
        )
    }

    /// Process messages until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(payload) = self.rx.recv().await {
            self.handle(&payload).await;
        }
    }

    async fn handle(&self, payload: &str) {
        debug!(payload = %payload, "received message");

        let command: WorkerCommand = match serde_json::from_str(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "unreadable message ignored");
                return;
            }
        };

        match command.action.as_str() {
            PURGE_EXPIRED_ACTION => {
                info!(bucket = %self.precache_bucket, "purging expired entries");
                let bucket = self.store.open(&self.precache_bucket).await;
                let purged = bucket.sweep_expired(SystemTime::now()).await;
                info!(bucket = %self.precache_bucket, purged, "purge complete");
            }
            other => debug!(action = %other, "unknown action ignored"),
        }
    }
}
