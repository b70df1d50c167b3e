//! netplan YAML documents

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use guest_network_core::error::ConfigError;
use guest_network_core::{EthernetInterface, NetworkError, Result, VlanDevice};

use crate::artifact::{
    artifact_stem, ConfigArtifact, ConfigRenderer, ARTIFACT_SUFFIX, MARKER_COMMENT,
};

const YAML_EXTENSION: &str = ".yaml";

/// netplan warns about world-readable configuration
const YAML_MODE: u32 = 0o600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetplanDocument {
    pub network: NetplanNetwork,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetplanNetwork {
    pub version: u8,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ethernets: BTreeMap<String, NetplanEthernet>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vlans: BTreeMap<String, NetplanVlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetplanMatch {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DhcpOverrides {
    #[serde(rename = "use-dns")]
    pub use_dns: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetplanEthernet {
    #[serde(rename = "match")]
    pub match_name: NetplanMatch,
    pub dhcp4: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp6: Option<bool>,
    #[serde(
        rename = "dhcp4-overrides",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dhcp4_overrides: Option<DhcpOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetplanVlan {
    pub id: u16,
    pub link: String,
    pub dhcp4: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp6: Option<bool>,
    #[serde(
        rename = "dhcp4-overrides",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dhcp4_overrides: Option<DhcpOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
}

/// Renders one netplan document per device
#[derive(Debug, Clone)]
pub struct NetplanRenderer {
    priority: u32,
}

impl NetplanRenderer {
    pub fn new(priority: u32) -> Self {
        Self { priority }
    }

    fn artifact(&self, name: &str, network: NetplanNetwork) -> Result<ConfigArtifact> {
        let yaml = serde_yaml::to_string(&NetplanDocument { network }).map_err(|e| {
            NetworkError::Configuration(ConfigError::InvalidValue {
                field: "netplan".to_string(),
                value: e.to_string(),
            })
        })?;

        Ok(ConfigArtifact::new(
            format!("{}{}", artifact_stem(self.priority, name), YAML_EXTENSION),
            format!("{}\n{}", MARKER_COMMENT, yaml),
        )
        .with_mode(YAML_MODE))
    }

    fn dns_overrides(primary: bool) -> Option<DhcpOverrides> {
        (!primary).then_some(DhcpOverrides { use_dns: false })
    }
}

impl ConfigRenderer for NetplanRenderer {
    fn render_ethernet(&self, iface: &EthernetInterface) -> Result<Vec<ConfigArtifact>> {
        let ethernet = NetplanEthernet {
            match_name: NetplanMatch {
                name: iface.name.clone(),
            },
            dhcp4: true,
            dhcp6: iface.ipv6.then_some(true),
            dhcp4_overrides: Self::dns_overrides(iface.is_primary()),
            mtu: iface.mtu,
        };

        let network = NetplanNetwork {
            version: 2,
            ethernets: BTreeMap::from([(iface.name.clone(), ethernet)]),
            vlans: BTreeMap::new(),
        };

        Ok(vec![self.artifact(&iface.name, network)?])
    }

    fn render_vlan(&self, vlan: &VlanDevice) -> Result<Vec<ConfigArtifact>> {
        let name = vlan.name();
        let entry = NetplanVlan {
            id: vlan.tag,
            link: vlan.parent.clone(),
            dhcp4: true,
            dhcp6: vlan.ipv6.then_some(true),
            dhcp4_overrides: Self::dns_overrides(false),
            macaddress: vlan.mac.as_ref().map(|mac| mac.to_string()),
            mtu: vlan.mtu,
        };

        let network = NetplanNetwork {
            version: 2,
            ethernets: BTreeMap::new(),
            vlans: BTreeMap::from([(name.clone(), entry)]),
        };

        Ok(vec![self.artifact(&name, network)?])
    }

    fn is_owned(&self, file_name: &str, content: &str) -> bool {
        let candidate = file_name
            .strip_suffix(YAML_EXTENSION)
            .is_some_and(|stem| stem.ends_with(ARTIFACT_SUFFIX));

        if !candidate || content.lines().next().map(str::trim) != Some(MARKER_COMMENT) {
            return false;
        }

        match serde_yaml::from_str::<NetplanDocument>(content) {
            Ok(_) => true,
            Err(e) => {
                debug!("{} carries the marker but does not parse: {}", file_name, e);
                false
            }
        }
    }
}
