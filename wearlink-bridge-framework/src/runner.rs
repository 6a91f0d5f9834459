//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;

use tokio::signal;

use wearlink_common::init_tracing;

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::connection::ConnectionManager;
use crate::error::{BridgeError, Result};
use crate::session::Session;
use crate::source::SensorHost;
use crate::status::{BridgeStatus, SharedStatusSink, TracingStatusSink};
use crate::writer::WriterStats;

/// Bridge runner that manages the lifecycle of a sensor bridge.
///
/// Handles:
/// - Logging initialization
/// - Session startup
/// - Graceful shutdown on Ctrl+C
/// - Status logging
///
/// # Example
///
/// ```ignore
/// use wearlink_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
///     let manager = build_manager(runner.config(), runner.status_sink());
///     let host = build_host(runner.config());
///
///     runner.run(manager, host).await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging and status.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Where session status messages go.
    status: SharedStatusSink,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner, initializing logging from the config.
    pub fn new(name: impl Into<String>, config: C) -> Result<Self> {
        Self::new_with_args(name, config, None)
    }

    /// Create a new bridge runner with CLI args for log level override.
    pub fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => config.logging().with_level(level.clone()),
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        Ok(Self::without_tracing(name, config))
    }

    /// Create a runner without touching the global subscriber.
    pub fn without_tracing(name: impl Into<String>, config: C) -> Self {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();
        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        Self {
            name,
            version,
            config,
            status: Arc::new(TracingStatusSink),
        }
    }

    /// Replace the status sink (defaults to [`TracingStatusSink`]).
    pub fn with_status_sink(mut self, status: SharedStatusSink) -> Self {
        self.status = status;
        self
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a clone of the status sink, for building the connection manager.
    pub fn status_sink(&self) -> SharedStatusSink {
        self.status.clone()
    }

    /// Run a session until Ctrl+C is received.
    pub async fn run(
        self,
        manager: ConnectionManager,
        host: Arc<dyn SensorHost>,
    ) -> Result<WriterStats> {
        self.run_until(manager, host, async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await
    }

    /// Run a session until `shutdown` completes.
    ///
    /// This will:
    /// 1. Start the session (sensors, then connect)
    /// 2. Log "running" status
    /// 3. Wait for the shutdown future
    /// 4. Shut the session down
    /// 5. Log "offline" status with the final counters
    pub async fn run_until<F>(
        self,
        manager: ConnectionManager,
        host: Arc<dyn SensorHost>,
        shutdown: F,
    ) -> Result<WriterStats>
    where
        F: Future<Output = ()>,
    {
        let session_config = self.config.session().clone();
        let session = Session::start(&session_config, manager, host, self.status.clone());

        let running = BridgeStatus::running(&self.name, &self.version).with_metadata(
            serde_json::json!({
                "peer": session_config.peer,
                "sampling_rate": session_config.sampling_rate,
                "sensors_ok": session.sensor_status().is_ok(),
            }),
        );
        tracing::info!(status = %running.to_json()?, "Bridge running. Press Ctrl+C to stop.");

        shutdown.await;
        tracing::info!(bridge = %self.name, "Received shutdown signal");

        session.shutdown().await;
        let stats = session.stats();

        let offline = BridgeStatus::offline(&self.name, &self.version)
            .with_metadata(serde_json::to_value(stats)?);
        tracing::info!(status = %offline.to_json()?, "Bridge offline");

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(stats)
    }
}
