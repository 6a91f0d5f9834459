//! Bridge status reporting.
//!
//! Two things live here: the [`StatusSink`] that receives human-readable
//! notifications for every session transition and error, and the structured
//! [`BridgeStatus`] snapshot the runner logs on startup and shutdown.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::Result;

/// One-way, best-effort channel for human-visible status messages.
///
/// Implementations must not block: the session calls `report` from the
/// connect task and from the write path.
pub trait StatusSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Shared handle to a status sink.
pub type SharedStatusSink = Arc<dyn StatusSink>;

/// Status sink that logs each message at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn report(&self, message: &str) {
        tracing::info!(target: "wearlink::status", "{}", message);
    }
}

/// Status sink that forwards messages into an unbounded channel.
///
/// Messages are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelStatusSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelStatusSink {
    /// Create a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelStatusSink {
    fn report(&self, message: &str) {
        tracing::debug!(status = %message, "Status");
        let _ = self.tx.send(message.to_string());
    }
}

impl<F> StatusSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Bridge status information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Bridge name (e.g., "rfcomm").
    pub bridge: String,
    /// Bridge version.
    pub version: String,
    /// Current status ("running", "offline", "error").
    pub status: String,
    /// Additional metadata (transport-specific).
    #[serde(flatten)]
    pub metadata: serde_json::Value,
}

impl BridgeStatus {
    /// Create a new status with "running" state.
    pub fn running(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: "running".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a status with "offline" state.
    pub fn offline(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: "offline".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Create a status with "error" state.
    pub fn error(
        bridge: impl Into<String>,
        version: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status: "error".to_string(),
            metadata: serde_json::json!({ "error": error.into() }),
        }
    }

    /// Add metadata to the status.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Render as a single JSON line.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
