//! Configuration for the RFCOMM bridge.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use wearlink_bridge_framework::{
    BridgeConfig, BridgeError, Capability, LoggingConfig, PeerHandle, SessionConfig,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Peer #{index}: name cannot be empty")]
    EmptyPeerName { index: usize },
    #[error("Peer '{name}': address cannot be empty")]
    EmptyPeerAddress { name: String },
    #[error("Serial transport: baud_rate must be greater than 0")]
    ZeroBaudRate,
    #[error("Serial transport: invalid adapter name '{0}'")]
    InvalidAdapter(String),
    #[error("Sensors: baseline_bpm must be between 30 and 220, got {0}")]
    BaselineOutOfRange(f64),
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        BridgeError::validation(err.to_string())
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfcommBridgeConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Session settings (peer preference, sampling rate, channel capacity)
    #[serde(default)]
    pub session: SessionConfig,

    /// How peers are reached
    #[serde(default)]
    pub transport: TransportConfig,

    /// Bonded peers, in enumeration order
    #[serde(default)]
    pub peers: Vec<PeerConfig>,

    /// Granted capabilities
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Simulated sensor settings
    #[serde(default)]
    pub sensors: SensorsConfig,
}

/// Transport configuration (serial or TCP).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// RFCOMM TTY devices bound with `rfcomm bind`
    Serial {
        /// Baud rate (default: 115200)
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        /// Local adapter name (default: "hci0")
        #[serde(default = "default_hci")]
        hci: String,
        /// Where adapters are listed (default: "/sys/class/bluetooth")
        #[serde(default = "default_sysfs_root")]
        sysfs_root: PathBuf,
    },
    /// Plain TCP, peers given as `host:port`
    Tcp,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Serial {
            baud_rate: default_baud_rate(),
            hci: default_hci(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

impl TransportConfig {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportConfig::Serial { .. } => "serial",
            TransportConfig::Tcp => "tcp",
        }
    }
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_hci() -> String {
    "hci0".to_string()
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/bluetooth")
}

/// A bonded peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Display name
    pub name: String,
    /// Device path (serial) or `host:port` (TCP)
    pub address: String,
}

impl From<&PeerConfig> for PeerHandle {
    fn from(peer: &PeerConfig) -> Self {
        PeerHandle::new(peer.name.clone(), peer.address.clone())
    }
}

/// Capabilities granted to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default = "default_granted")]
    pub granted: Vec<Capability>,
}

fn default_granted() -> Vec<Capability> {
    vec![Capability::Connect, Capability::Scan, Capability::BodySensors]
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            granted: default_granted(),
        }
    }
}

/// Simulated sensor host settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorsConfig {
    #[serde(default)]
    pub heart_rate: SensorToggle,

    #[serde(default)]
    pub accelerometer: SensorToggle,

    /// Resting heart rate the simulation wanders around (default: 72)
    #[serde(default = "default_baseline_bpm")]
    pub baseline_bpm: f64,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_baseline_bpm() -> f64 {
    72.0
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            heart_rate: SensorToggle::default(),
            accelerometer: SensorToggle::default(),
            baseline_bpm: default_baseline_bpm(),
            seed: None,
        }
    }
}

/// Whether a simulated sensor is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SensorToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

impl RfcommBridgeConfig {
    /// Check the bridge-specific sections.
    pub fn check(&self) -> Result<(), ConfigError> {
        for (index, peer) in self.peers.iter().enumerate() {
            if peer.name.trim().is_empty() {
                return Err(ConfigError::EmptyPeerName { index });
            }
            if peer.address.trim().is_empty() {
                return Err(ConfigError::EmptyPeerAddress {
                    name: peer.name.clone(),
                });
            }
        }

        if let TransportConfig::Serial { baud_rate, hci, .. } = &self.transport {
            if *baud_rate == 0 {
                return Err(ConfigError::ZeroBaudRate);
            }
            if hci.is_empty() || hci.contains('/') {
                return Err(ConfigError::InvalidAdapter(hci.clone()));
            }
        }

        let bpm = self.sensors.baseline_bpm;
        if !(30.0..=220.0).contains(&bpm) {
            return Err(ConfigError::BaselineOutOfRange(bpm));
        }

        Ok(())
    }
}

impl BridgeConfig for RfcommBridgeConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn session(&self) -> &SessionConfig {
        &self.session
    }

    fn validate(&self) -> wearlink_bridge_framework::Result<()> {
        self.session.validate()?;
        self.check()?;
        Ok(())
    }
}
