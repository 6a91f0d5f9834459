//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while setting a bridge up.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<wearlink_common::Error> for BridgeError {
    fn from(err: wearlink_common::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Why the local radio cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterFault {
    /// No adapter on this host.
    Missing,
    /// Adapter present but powered off or blocked.
    Disabled,
}

impl std::fmt::Display for AdapterFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterFault::Missing => write!(f, "Bluetooth not supported on this device!"),
            AdapterFault::Disabled => write!(f, "Please enable Bluetooth!"),
        }
    }
}

/// Failure of the one-shot connect.
///
/// The `Display` text is what the status sink shows.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("No paired devices found!")]
    NoPeers,

    #[error("Bluetooth connect permission not granted!")]
    PermissionDenied,

    #[error("{0}")]
    AdapterUnavailable(AdapterFault),

    #[error("Connection failed: {0}")]
    Io(#[source] std::io::Error),
}

/// Failure to put a frame on the stream.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The write or the flush failed; the connection must be treated as broken.
    #[error("Error sending data: {0}")]
    Io(#[source] std::io::Error),

    /// There is no open stream to write to.
    #[error("Connection is not open")]
    NotOpen,
}

/// A required sensor is missing on the host.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorUnavailable {
    #[error("Heart rate sensor not available!")]
    HeartRate,

    #[error("Accelerometer not available!")]
    Accelerometer,
}

impl From<wearlink_common::SensorKind> for SensorUnavailable {
    fn from(kind: wearlink_common::SensorKind) -> Self {
        match kind {
            wearlink_common::SensorKind::HeartRate => SensorUnavailable::HeartRate,
            wearlink_common::SensorKind::Accelerometer => SensorUnavailable::Accelerometer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wearlink_common::SensorKind;

    #[test]
    fn test_connect_error_messages() {
        assert_eq!(ConnectError::NoPeers.to_string(), "No paired devices found!");
        assert_eq!(
            ConnectError::AdapterUnavailable(AdapterFault::Disabled).to_string(),
            "Please enable Bluetooth!"
        );
        assert_eq!(
            ConnectError::AdapterUnavailable(AdapterFault::Missing).to_string(),
            "Bluetooth not supported on this device!"
        );

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timeout");
        assert_eq!(
            ConnectError::Io(io).to_string(),
            "Connection failed: read timeout"
        );
    }

    #[test]
    fn test_sensor_unavailable_from_kind() {
        assert_eq!(
            SensorUnavailable::from(SensorKind::HeartRate),
            SensorUnavailable::HeartRate
        );
        assert_eq!(
            SensorUnavailable::from(SensorKind::Accelerometer).to_string(),
            "Accelerometer not available!"
        );
    }
}
