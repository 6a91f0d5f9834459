//! WearLink Bridge Framework
//!
//! Core of a sensor bridge: stream heart-rate and accelerometer readings from
//! a wearable host to one paired peer as newline-terminated text frames.
//!
//! # Overview
//!
//! This framework provides:
//! - [`ConnectionManager`] for the one-shot connect to a bonded peer
//! - [`SensorSource`] for both-or-none sensor subscriptions
//! - [`StreamWriter`] and [`Uplink`] for serialized frame writes
//! - [`Session`] tying them together with idempotent shutdown
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for standardized status reporting
//!
//! Platform services (radio, permissions, bonded peers, sensors, status
//! display) are reached through the [`Transport`], [`PermissionAuthority`],
//! [`PeerRegistry`], [`SensorHost`] and [`StatusSink`] traits.
//!
//! # Example
//!
//! ```ignore
//! use wearlink_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, ConnectionManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
//!     let manager = ConnectionManager::new(transport, peers, permissions, runner.status_sink());
//!
//!     // Run until Ctrl+C
//!     runner.run(manager, host).await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod connection;
mod error;
mod runner;
mod session;
mod source;
mod status;
mod writer;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, SessionConfig};
pub use connection::{
    AdapterState, BoxedStream, Capability, Connection, ConnectionManager, ConnectionState,
    DuplexStream, PeerHandle, PeerRegistry, PeerSelector, PermissionAuthority, SERVICE_UUID,
    Transport,
};
pub use error::{
    AdapterFault, BridgeError, ConnectError, Result, SensorUnavailable, WriteError,
};
pub use runner::BridgeRunner;
pub use session::Session;
pub use source::{
    DEFAULT_FEED_CAPACITY, FeedHandle, ReadingSink, SamplingRate, SensorHost, SensorSource,
};
pub use status::{BridgeStatus, ChannelStatusSink, SharedStatusSink, StatusSink, TracingStatusSink};
pub use writer::{SharedConnection, StreamWriter, Uplink, WriterStats};

// Re-export commonly used types from wearlink-common
pub use wearlink_common::{Frame, LoggingConfig, Reading, SensorKind, Timestamp};
