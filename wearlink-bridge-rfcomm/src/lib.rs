//! WearLink bridge over RFCOMM.
//!
//! Streams heart-rate and accelerometer readings to one paired peer through
//! an RFCOMM TTY (`/dev/rfcommN`, bound with `rfcomm bind`) or, for testing,
//! a plain TCP connection.
//!
//! # Wire format
//!
//! ```text
//! HR:<bpm, 1 decimal>;<unix ms>\n
//! ACC:<x>,<y>,<z, 2 decimals>;<unix ms>\n
//! ```

pub mod adapter;
pub mod config;
pub mod registry;
pub mod sensors;
pub mod transport;

use std::sync::Arc;

use wearlink_bridge_framework::{ConnectionManager, SensorHost, SharedStatusSink};

use crate::config::RfcommBridgeConfig;
use crate::registry::{ConfiguredPeers, ConfiguredPermissions};
use crate::sensors::SimulatedSensorHost;
use crate::transport::RfcommTransport;

/// Build the connection manager described by the configuration.
pub fn build_manager(config: &RfcommBridgeConfig, status: SharedStatusSink) -> ConnectionManager {
    ConnectionManager::new(
        RfcommTransport::from(&config.transport),
        ConfiguredPeers::new(&config.peers),
        ConfiguredPermissions::new(&config.permissions),
        status,
    )
}

/// Build the sensor host described by the configuration.
pub fn build_host(config: &RfcommBridgeConfig) -> Arc<dyn SensorHost> {
    Arc::new(SimulatedSensorHost::new(config.sensors.clone()))
}
