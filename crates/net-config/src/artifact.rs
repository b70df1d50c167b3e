//! Engine-owned configuration files

use guest_network_core::{EthernetInterface, Result, VlanDevice};
use serde::Serialize;

/// Fixed suffix of every engine-owned file name
pub const ARTIFACT_SUFFIX: &str = "google-guest-agent";

/// Comment line marking files in formats without a native place for a
/// `managed` key (wicked ifcfg, netplan yaml)
pub const MARKER_COMMENT: &str = "# Added by Google Compute Engine Guest Agent.";

/// `{priority}-{identity}-google-guest-agent`
pub fn artifact_stem(priority: u32, identity: &str) -> String {
    format!("{}-{}-{}", priority, identity, ARTIFACT_SUFFIX)
}

/// One file the engine writes into a backend's config directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigArtifact {
    /// Name relative to the config directory
    pub file_name: String,
    pub content: String,
    /// Unix permission bits
    pub mode: u32,
}

impl ConfigArtifact {
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            mode: 0o644,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// Turns resolved descriptors into a backend's native configuration files
pub trait ConfigRenderer: Send + Sync {
    /// Exactly the files describing one Ethernet NIC
    fn render_ethernet(&self, iface: &EthernetInterface) -> Result<Vec<ConfigArtifact>>;

    /// The files describing one VLAN; written and rolled back together
    fn render_vlan(&self, vlan: &VlanDevice) -> Result<Vec<ConfigArtifact>>;

    /// Whether an existing file in the config directory belongs to the
    /// engine. Unreadable or unparseable content is never owned.
    fn is_owned(&self, file_name: &str, content: &str) -> bool;
}
