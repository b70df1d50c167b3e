use std::collections::BTreeMap;
use std::str::FromStr;

use mac_address::MacAddress;
use serde::{Deserialize, Serialize};

use crate::error::{SharedResult, SharedTypeError};

/// Desired network topology for one reconciliation pass, as reported by the
/// metadata server. The first Ethernet entry is the primary NIC.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesiredTopology {
    #[serde(default)]
    pub ethernet_interfaces: Vec<NetworkInterface>,
    /// VLAN sub-interfaces keyed by VLAN tag
    #[serde(default)]
    pub vlan_interfaces: BTreeMap<u16, VlanInterface>,
}

impl DesiredTopology {
    pub fn new(ethernet_interfaces: Vec<NetworkInterface>) -> Self {
        Self {
            ethernet_interfaces,
            vlan_interfaces: BTreeMap::new(),
        }
    }

    /// Add a VLAN keyed by its own tag
    pub fn with_vlan(mut self, vlan: VlanInterface) -> Self {
        self.vlan_interfaces.insert(vlan.vlan, vlan);
        self
    }

    /// Parse a metadata snapshot
    pub fn from_json(content: &str) -> SharedResult<Self> {
        serde_json::from_str(content).map_err(|e| SharedTypeError::ParseError(e.to_string()))
    }
}

/// A NIC entry from the metadata server
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub mac: String,
    #[serde(default)]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub ipv6s: Vec<String>,
    #[serde(default)]
    pub dhcpv6_refresh: Option<String>,
}

impl NetworkInterface {
    pub fn new(mac: &str) -> Self {
        Self {
            mac: mac.to_string(),
            ..Default::default()
        }
    }

    pub fn with_ipv6(mut self, address: &str) -> Self {
        self.ipv6s.push(address.to_string());
        self
    }

    pub fn mac_addr(&self) -> SharedResult<MacAddr> {
        self.mac.parse()
    }

    /// Whether the platform hands out IPv6 on this NIC
    pub fn ipv6_enabled(&self) -> bool {
        !self.ipv6s.is_empty()
            || self
                .dhcpv6_refresh
                .as_deref()
                .is_some_and(|refresh| !refresh.is_empty())
    }
}

/// A VLAN sub-interface entry from the metadata server
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VlanInterface {
    pub mac: String,
    /// Path-like reference to the parent NIC, e.g.
    /// `/computeMetadata/v1/instance/network-interfaces/0/`
    pub parent_interface: String,
    pub vlan: u16,
    #[serde(default)]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub ipv6: Vec<String>,
}

impl VlanInterface {
    pub fn new(mac: &str, parent_interface: &str, vlan: u16) -> Self {
        Self {
            mac: mac.to_string(),
            parent_interface: parent_interface.to_string(),
            vlan,
            ..Default::default()
        }
    }

    pub fn ipv6_enabled(&self) -> bool {
        !self.ipv6.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacAddr(pub MacAddress);

struct MacAddrVisitor;

impl<'de> serde::de::Visitor<'de> for MacAddrVisitor {
    type Value = MacAddr;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a MAC address string")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse::<MacAddr>()
            .map_err(|_| E::custom(format!("invalid MAC address: {}", v)))
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(MacAddrVisitor)
    }
}

impl Serialize for MacAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl FromStr for MacAddr {
    type Err = SharedTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<MacAddress>()
            .map(MacAddr)
            .map_err(|_| SharedTypeError::InvalidValue {
                field: "mac_address",
                value: s.to_string(),
            })
    }
}

/// Lower-case colon notation, the form sysfs and networkd use
impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string().to_lowercase())
    }
}
