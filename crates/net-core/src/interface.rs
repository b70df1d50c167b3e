//! Live OS interface listing and MAC resolution

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::{NetworkError, SystemError, TopologyError};
use crate::types::MacAddr;
use crate::Result;

/// Default location of the kernel's interface listing
pub const DEFAULT_SYSFS_NET_DIR: &str = "/sys/class/net";

/// An interface currently known to the kernel
#[derive(Debug, Clone, PartialEq)]
pub struct LiveInterface {
    pub name: String,
    pub mac: Option<MacAddr>,
    /// Backed by a device (as opposed to VLAN, bridge or other virtual links)
    pub physical: bool,
}

impl LiveInterface {
    pub fn new(name: &str, mac: Option<MacAddr>) -> Self {
        Self {
            name: name.to_string(),
            mac,
            physical: true,
        }
    }

    pub fn with_physical(mut self, physical: bool) -> Self {
        self.physical = physical;
        self
    }
}

/// Source of live interfaces
#[async_trait]
pub trait InterfaceSource: Send + Sync {
    async fn list(&self) -> Result<Vec<LiveInterface>>;
}

/// Reads interfaces from a sysfs-style directory: one entry per interface,
/// each holding an `address` file and, for real NICs, a `device` link.
#[derive(Debug, Clone)]
pub struct SysfsInterfaceSource {
    root: PathBuf,
}

impl SysfsInterfaceSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for SysfsInterfaceSource {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_NET_DIR)
    }
}

#[async_trait]
impl InterfaceSource for SysfsInterfaceSource {
    async fn list(&self) -> Result<Vec<LiveInterface>> {
        let listing_error = |source: std::io::Error| {
            NetworkError::System(SystemError::InterfaceListing {
                path: self.root.clone(),
                source,
            })
        };

        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(listing_error)?;
        let mut interfaces = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
            let name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();

            let mac = match tokio::fs::read_to_string(path.join("address")).await {
                Ok(content) => content.parse::<MacAddr>().ok(),
                Err(e) => {
                    debug!("No address for interface {}: {}", name, e);
                    None
                }
            };
            let physical = tokio::fs::symlink_metadata(path.join("device"))
                .await
                .is_ok();

            interfaces.push(LiveInterface {
                name,
                mac,
                physical,
            });
        }

        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            "Found {} live interfaces under {:?}",
            interfaces.len(),
            self.root
        );
        Ok(interfaces)
    }
}

/// Find the OS name of the interface carrying `mac`. Virtual links share
/// their parent's MAC, so physical interfaces win a tie.
pub fn resolve_name_by_mac(interfaces: &[LiveInterface], mac: &MacAddr) -> Result<String> {
    let candidates: Vec<&LiveInterface> = interfaces
        .iter()
        .filter(|iface| iface.mac.as_ref() == Some(mac))
        .collect();

    let chosen = match candidates.as_slice() {
        [] => None,
        [only] => Some(*only),
        several => {
            let physical: Vec<&&LiveInterface> =
                several.iter().filter(|iface| iface.physical).collect();
            match physical.as_slice() {
                [only] => Some(**only),
                _ => {
                    warn!("MAC {} is carried by {} interfaces", mac, several.len());
                    return Err(NetworkError::Topology(TopologyError::AmbiguousMac {
                        mac: mac.to_string(),
                        names: several.iter().map(|iface| iface.name.clone()).collect(),
                    }));
                }
            }
        }
    };

    let iface = chosen.ok_or_else(|| {
        NetworkError::Topology(TopologyError::NoInterfaceForMac {
            mac: mac.to_string(),
        })
    })?;

    InterfaceValidator::validate_name(&iface.name)?;
    Ok(iface.name.clone())
}

/// Interface validation functions
pub struct InterfaceValidator;

impl InterfaceValidator {
    /// Validate an interface name before it is used in a file name
    pub fn validate_name(name: &str) -> Result<()> {
        let invalid = || {
            NetworkError::Topology(TopologyError::InvalidInterfaceName {
                name: name.to_string(),
            })
        };

        if name.is_empty() || name.len() > 15 {
            return Err(invalid());
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(invalid());
        }

        // Leading dot or dash would produce hidden or option-like file names
        if name.starts_with('.') || name.starts_with('-') {
            return Err(invalid());
        }

        Ok(())
    }
}
