//! Local Bluetooth adapter probe backed by sysfs.
//!
//! An adapter shows up as `<root>/<hci>`; its radio switch as
//! `<root>/<hci>/rfkillN/{soft,hard}`, where `1` means blocked.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use wearlink_bridge_framework::AdapterState;

#[derive(Debug, Clone)]
pub struct SysfsAdapter {
    root: PathBuf,
    hci: String,
}

impl SysfsAdapter {
    pub fn new(root: impl Into<PathBuf>, hci: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            hci: hci.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(&self.hci)
    }

    pub fn probe(&self) -> AdapterState {
        let dir = self.path();
        if !dir.is_dir() {
            debug!(adapter = %self.hci, path = %dir.display(), "Adapter not present");
            return AdapterState::Missing;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(adapter = %self.hci, error = %e, "Cannot list adapter");
                return AdapterState::Missing;
            }
        };

        let blocked = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("rfkill"))
            .any(|entry| is_blocked(&entry.path()));

        if blocked {
            debug!(adapter = %self.hci, "Adapter blocked by rfkill");
            AdapterState::Disabled
        } else {
            AdapterState::Ready
        }
    }
}

fn is_blocked(rfkill: &Path) -> bool {
    ["soft", "hard"].iter().any(|switch| {
        fs::read_to_string(rfkill.join(switch))
            .map(|value| value.trim() == "1")
            .unwrap_or(false)
    })
}
