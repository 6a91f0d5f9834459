use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix epoch milliseconds.
pub type Timestamp = i64;

/// A single decoded sensor value, tagged with its kind.
///
/// Readings carry no timestamp of their own: frames are stamped when they are
/// encoded, which is the moment the write is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reading {
    /// Heart rate in beats per minute.
    HeartRate { bpm: f64 },

    /// Acceleration along the device axes, in m/s².
    Acceleration { x: f64, y: f64, z: f64 },
}

impl Reading {
    /// Create a heart-rate reading.
    pub fn heart_rate(bpm: f64) -> Self {
        Reading::HeartRate { bpm }
    }

    /// Create an acceleration reading.
    pub fn acceleration(x: f64, y: f64, z: f64) -> Self {
        Reading::Acceleration { x, y, z }
    }

    /// The sensor this reading came from.
    pub fn kind(&self) -> SensorKind {
        match self {
            Reading::HeartRate { .. } => SensorKind::HeartRate,
            Reading::Acceleration { .. } => SensorKind::Accelerometer,
        }
    }
}

/// Sensor feeds a bridge subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    HeartRate,
    Accelerometer,
}

impl SensorKind {
    /// Both feeds, in registration order.
    pub const ALL: [SensorKind; 2] = [SensorKind::HeartRate, SensorKind::Accelerometer];

    /// Get the string representation used in configuration and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::HeartRate => "heart_rate",
            SensorKind::Accelerometer => "accelerometer",
        }
    }

    /// Wire prefix of frames produced from this sensor.
    pub fn frame_prefix(&self) -> &'static str {
        match self {
            SensorKind::HeartRate => "HR",
            SensorKind::Accelerometer => "ACC",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
