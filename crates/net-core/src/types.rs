//! Core network types and data structures

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, NetworkError};
use guest_shared_types::SharedTypeError;

pub use guest_shared_types::{
    ChangeType, ConfigChange, DesiredTopology, MacAddr, NetworkInterface, VlanInterface,
};

impl From<SharedTypeError> for NetworkError {
    fn from(err: SharedTypeError) -> Self {
        match err {
            SharedTypeError::InvalidValue { field, value } => {
                NetworkError::Configuration(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value,
                })
            }
            SharedTypeError::ParseError(message) => {
                NetworkError::Configuration(ConfigError::Parse { line: 0, message })
            }
        }
    }
}

/// Ethernet NIC from metadata, resolved to its OS interface name
#[derive(Debug, Clone, PartialEq)]
pub struct EthernetInterface {
    /// Position in the metadata NIC list; 0 is the primary NIC
    pub index: usize,
    pub name: String,
    pub mac: MacAddr,
    pub ipv6: bool,
    pub mtu: Option<u32>,
    /// Names of the VLAN devices stacked on this NIC
    pub vlans: Vec<String>,
}

impl EthernetInterface {
    pub fn new(index: usize, name: &str, mac: MacAddr) -> Self {
        Self {
            index,
            name: name.to_string(),
            mac,
            ipv6: false,
            mtu: None,
            vlans: Vec::new(),
        }
    }

    pub fn with_ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }

    pub fn is_primary(&self) -> bool {
        self.index == 0
    }
}

/// VLAN sub-interface with its parent resolved to an OS interface name
#[derive(Debug, Clone, PartialEq)]
pub struct VlanDevice {
    pub tag: u16,
    /// OS name of the parent interface
    pub parent: String,
    /// Metadata MAC of the sub-interface, when it parses
    pub mac: Option<MacAddr>,
    pub ipv6: bool,
    pub mtu: Option<u32>,
}

impl VlanDevice {
    pub fn new(parent: &str, tag: u16) -> Self {
        Self {
            tag,
            parent: parent.to_string(),
            mac: None,
            ipv6: false,
            mtu: None,
        }
    }

    /// OS name of the VLAN device, `gcp.{parent}.{tag}`
    pub fn name(&self) -> String {
        crate::vlan::device_name(&self.parent, self.tag)
    }
}

/// The closed set of network-manager backends the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "netplan")]
    Netplan,
    #[serde(rename = "systemd-networkd")]
    SystemdNetworkd,
    #[serde(rename = "wicked")]
    Wicked,
    #[serde(rename = "NetworkManager")]
    NetworkManager,
    #[serde(rename = "dhclient")]
    Dhclient,
}

impl BackendKind {
    /// Declaration order, used to break priority ties
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Netplan,
        BackendKind::SystemdNetworkd,
        BackendKind::Wicked,
        BackendKind::NetworkManager,
        BackendKind::Dhclient,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Netplan => "netplan",
            BackendKind::SystemdNetworkd => "systemd-networkd",
            BackendKind::Wicked => "wicked",
            BackendKind::NetworkManager => "NetworkManager",
            BackendKind::Dhclient => "dhclient",
        }
    }

    pub fn declaration_index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|kind| kind == self)
            .unwrap_or(Self::ALL.len())
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BackendKind {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                NetworkError::Configuration(ConfigError::InvalidValue {
                    field: "backend".to_string(),
                    value: s.to_string(),
                })
            })
    }
}

/// Static identity of a backend: priority and the status keys its probe reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRecord {
    pub kind: BackendKind,
    /// Lower value wins; also the numeric prefix of artifact file names
    pub priority: u32,
    /// Status keys checked in order, first present wins
    pub state_keys: Vec<String>,
}

impl BackendRecord {
    pub fn new(kind: BackendKind, priority: u32) -> Self {
        Self {
            kind,
            priority,
            state_keys: Vec::new(),
        }
    }

    pub fn with_state_keys(mut self, keys: &[&str]) -> Self {
        self.state_keys = keys.iter().map(|key| key.to_string()).collect();
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
