//! systemd-networkd `.network` and `.netdev` units

use guest_network_core::{EthernetInterface, Result, VlanDevice};

use crate::artifact::{artifact_stem, ConfigArtifact, ConfigRenderer, ARTIFACT_SUFFIX};
use crate::ini::IniDocument;

/// Section carrying the ownership marker
pub const MARKER_SECTION: &str = "GuestAgent";
pub const MARKER_KEY: &str = "Managed";

/// Renders systemd-networkd units
#[derive(Debug, Clone)]
pub struct NetworkdRenderer {
    priority: u32,
}

impl NetworkdRenderer {
    pub fn new(priority: u32) -> Self {
        Self { priority }
    }

    fn dhcp_mode(ipv6: bool) -> &'static str {
        if ipv6 {
            "yes"
        } else {
            "ipv4"
        }
    }

    fn mark_owned(document: &mut IniDocument) {
        document.set(MARKER_SECTION, MARKER_KEY, "true");
    }
}

impl ConfigRenderer for NetworkdRenderer {
    fn render_ethernet(&self, iface: &EthernetInterface) -> Result<Vec<ConfigArtifact>> {
        let mut network = IniDocument::new();
        network
            .set("Match", "Name", &iface.name)
            .set("Network", "DHCP", Self::dhcp_mode(iface.ipv6))
            .set("Network", "DNSDefaultRoute", iface.is_primary().to_string());
        // networkd only creates a VLAN netdev listed by its parent's unit
        for vlan in &iface.vlans {
            network.append("Network", "VLAN", vlan);
        }
        if let Some(mtu) = iface.mtu {
            network.set("Link", "MTUBytes", mtu.to_string());
        }
        Self::mark_owned(&mut network);

        Ok(vec![ConfigArtifact::new(
            format!("{}.network", artifact_stem(self.priority, &iface.name)),
            network.render(),
        )])
    }

    fn render_vlan(&self, vlan: &VlanDevice) -> Result<Vec<ConfigArtifact>> {
        let name = vlan.name();
        let stem = artifact_stem(self.priority, &name);

        let mut netdev = IniDocument::new();
        netdev
            .set("NetDev", "Name", &name)
            .set("NetDev", "Kind", "vlan")
            .set(
                "NetDev",
                "Description",
                format!("VLAN {} on {}", vlan.tag, vlan.parent),
            );
        if let Some(mac) = &vlan.mac {
            netdev.set("NetDev", "MACAddress", mac.to_string());
        }
        if let Some(mtu) = vlan.mtu {
            netdev.set("NetDev", "MTUBytes", mtu.to_string());
        }
        netdev.set("VLAN", "Id", vlan.tag.to_string());
        Self::mark_owned(&mut netdev);

        let mut network = IniDocument::new();
        network
            .set("Match", "Name", &name)
            .set("Network", "DHCP", Self::dhcp_mode(vlan.ipv6))
            .set("Network", "DNSDefaultRoute", "false");
        Self::mark_owned(&mut network);

        Ok(vec![
            ConfigArtifact::new(format!("{}.netdev", stem), netdev.render()),
            ConfigArtifact::new(format!("{}.network", stem), network.render()),
        ])
    }

    fn is_owned(&self, file_name: &str, content: &str) -> bool {
        let candidate = [".network", ".netdev"].iter().any(|extension| {
            file_name
                .strip_suffix(extension)
                .is_some_and(|stem| stem.ends_with(ARTIFACT_SUFFIX))
        });
        if !candidate {
            return false;
        }

        IniDocument::parse(content)
            .ok()
            .and_then(|document| {
                document
                    .get(MARKER_SECTION, MARKER_KEY)
                    .map(|value| value.eq_ignore_ascii_case("true"))
            })
            .unwrap_or(false)
    }
}
