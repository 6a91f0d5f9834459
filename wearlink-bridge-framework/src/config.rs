//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::LoggingConfig;
use crate::connection::PeerSelector;
use crate::error::{BridgeError, Result};
use crate::source::{DEFAULT_FEED_CAPACITY, SamplingRate};

/// Session settings shared by all bridges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Preferred peer, by name or address. The first bonded peer when unset.
    #[serde(default)]
    pub peer: Option<String>,

    /// Requested delivery rate of both sensor feeds.
    #[serde(default)]
    pub sampling_rate: SamplingRate,

    /// Capacity of each feed channel.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

fn default_feed_capacity() -> usize {
    DEFAULT_FEED_CAPACITY
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            peer: None,
            sampling_rate: SamplingRate::default(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

impl SessionConfig {
    /// Peer selection policy derived from `peer`.
    pub fn selector(&self) -> PeerSelector {
        match &self.peer {
            Some(peer) => PeerSelector::Named(peer.clone()),
            None => PeerSelector::First,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed_capacity == 0 {
            return Err(BridgeError::validation(
                "session.feed_capacity must be at least 1",
            ));
        }
        if matches!(&self.peer, Some(p) if p.trim().is_empty()) {
            return Err(BridgeError::validation("session.peer cannot be empty"));
        }
        Ok(())
    }
}

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use wearlink_bridge_framework::{BridgeConfig, LoggingConfig, SessionConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub logging: LoggingConfig,
///     pub session: SessionConfig,
///     pub my_transport: MyTransportConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn session(&self) -> &SessionConfig {
///         &self.session
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the session configuration.
    fn session(&self) -> &SessionConfig;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation,
    /// keeping the session check.
    fn validate(&self) -> Result<()> {
        self.session().validate()
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }
}
