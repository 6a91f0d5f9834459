//! Bonded peers and permissions taken from configuration.

use std::collections::HashSet;

use wearlink_bridge_framework::{Capability, PeerHandle, PeerRegistry, PermissionAuthority};

use crate::config::{PeerConfig, PermissionsConfig};

/// Peers in the order they were declared.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPeers {
    peers: Vec<PeerHandle>,
}

impl ConfiguredPeers {
    pub fn new(peers: &[PeerConfig]) -> Self {
        Self {
            peers: peers.iter().map(PeerHandle::from).collect(),
        }
    }
}

impl PeerRegistry for ConfiguredPeers {
    fn bonded_peers(&self) -> Vec<PeerHandle> {
        self.peers.clone()
    }
}

#[derive(Debug, Clone)]
pub struct ConfiguredPermissions {
    granted: HashSet<Capability>,
}

impl ConfiguredPermissions {
    pub fn new(config: &PermissionsConfig) -> Self {
        Self {
            granted: config.granted.iter().copied().collect(),
        }
    }
}

impl PermissionAuthority for ConfiguredPermissions {
    fn is_authorized(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }
}
