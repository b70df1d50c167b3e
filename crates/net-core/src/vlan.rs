//! VLAN naming and topology resolution

use log::{debug, warn};

use crate::error::{NetworkError, TopologyError};
use crate::interface::{resolve_name_by_mac, LiveInterface};
use crate::types::{DesiredTopology, EthernetInterface, MacAddr, VlanDevice, VlanInterface};
use crate::Result;

/// Prefix of the VLAN devices the engine creates
pub const VLAN_DEVICE_PREFIX: &str = "gcp";

/// OS name of a VLAN device: `gcp.{parent}.{tag}`
pub fn device_name(parent: &str, tag: u16) -> String {
    format!("{}.{}.{}", VLAN_DEVICE_PREFIX, parent, tag)
}

/// Split a VLAN device name back into parent and tag
pub fn parse_device_name(name: &str) -> Option<(String, u16)> {
    let rest = name.strip_prefix(VLAN_DEVICE_PREFIX)?.strip_prefix('.')?;
    let (parent, tag) = rest.rsplit_once('.')?;
    let tag = tag.parse::<u16>().ok()?;
    if parent.is_empty() || validate_tag(tag).is_err() {
        return None;
    }
    Some((parent.to_string(), tag))
}

pub fn validate_tag(tag: u16) -> Result<()> {
    if tag == 0 || tag > 4094 {
        return Err(NetworkError::Topology(TopologyError::InvalidVlanTag { tag }));
    }
    Ok(())
}

/// Extract the parent NIC index from a path-like reference such as
/// `/computeMetadata/v1/instance/network-interfaces/0/`.
pub fn parse_parent_index(reference: &str) -> Result<usize> {
    let invalid = || {
        NetworkError::Topology(TopologyError::InvalidParentReference {
            reference: reference.to_string(),
        })
    };

    let segment = reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .ok_or_else(invalid)?;

    segment.parse::<usize>().map_err(|_| invalid())
}

/// Desired topology resolved to OS interface names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedTopology {
    pub ethernet: Vec<EthernetInterface>,
    pub vlans: Vec<VlanDevice>,
}

impl ResolvedTopology {
    /// Names of the Ethernet NICs only. VLAN devices may not exist yet
    /// when their units are first written.
    pub fn ethernet_names(&self) -> Vec<String> {
        self.ethernet.iter().map(|iface| iface.name.clone()).collect()
    }
}

/// Resolve metadata NICs to OS names. A malformed MAC is an error; a NIC
/// that is not live yet is skipped and keeps no artifact this pass.
pub fn resolve_ethernet(
    desired: &DesiredTopology,
    live: &[LiveInterface],
) -> Result<Vec<EthernetInterface>> {
    let mut resolved = Vec::new();

    for (index, nic) in desired.ethernet_interfaces.iter().enumerate() {
        let mac = parse_mac(&nic.mac)?;
        match resolve_name_by_mac(live, &mac) {
            Ok(name) => {
                debug!("NIC {} ({}) resolved to {}", index, mac, name);
                let mut iface =
                    EthernetInterface::new(index, &name, mac).with_ipv6(nic.ipv6_enabled());
                iface.mtu = nic.mtu;
                resolved.push(iface);
            }
            Err(e) => warn!("Skipping NIC {} ({}): {}", index, mac, e),
        }
    }

    Ok(resolved)
}

/// Resolve one VLAN: its parent index must address the metadata NIC list and
/// that NIC's MAC must belong to exactly one live interface.
pub fn resolve_vlan(
    vlan: &VlanInterface,
    desired: &DesiredTopology,
    live: &[LiveInterface],
) -> Result<VlanDevice> {
    validate_tag(vlan.vlan)?;

    let index = parse_parent_index(&vlan.parent_interface)?;
    let parent = desired.ethernet_interfaces.get(index).ok_or_else(|| {
        NetworkError::Topology(TopologyError::ParentIndexOutOfRange {
            tag: vlan.vlan,
            index,
            count: desired.ethernet_interfaces.len(),
        })
    })?;

    let parent_mac = parse_mac(&parent.mac)?;
    let parent_name = resolve_name_by_mac(live, &parent_mac)?;

    // The platform does not guarantee a well-formed MAC for sub-interfaces;
    // leave it to the kernel when it does not parse.
    let mac = vlan.mac.parse::<MacAddr>().ok();
    if mac.is_none() && !vlan.mac.is_empty() {
        debug!("VLAN {} MAC {:?} not usable, ignoring", vlan.vlan, vlan.mac);
    }

    Ok(VlanDevice {
        tag: vlan.vlan,
        parent: parent_name,
        mac,
        ipv6: vlan.ipv6_enabled(),
        mtu: vlan.mtu,
    })
}

/// Resolve every VLAN, failing on the first one that cannot be resolved so
/// that no VLAN artifact is written from a partially valid topology.
pub fn resolve_vlans(desired: &DesiredTopology, live: &[LiveInterface]) -> Result<Vec<VlanDevice>> {
    desired
        .vlan_interfaces
        .values()
        .map(|vlan| resolve_vlan(vlan, desired, live))
        .collect()
}

/// Resolve the whole topology
pub fn resolve_topology(
    desired: &DesiredTopology,
    live: &[LiveInterface],
) -> Result<ResolvedTopology> {
    let mut ethernet = resolve_ethernet(desired, live)?;
    let vlans = resolve_vlans(desired, live)?;

    // Parents list their VLANs so the backend can stack them
    for vlan in &vlans {
        if let Some(parent) = ethernet.iter_mut().find(|iface| iface.name == vlan.parent) {
            parent.vlans.push(vlan.name());
        }
    }

    Ok(ResolvedTopology { ethernet, vlans })
}

fn parse_mac(value: &str) -> Result<MacAddr> {
    value.parse::<MacAddr>().map_err(|_| {
        NetworkError::Topology(TopologyError::InvalidMac {
            mac: value.to_string(),
        })
    })
}
