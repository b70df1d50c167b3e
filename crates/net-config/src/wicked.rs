//! wicked `ifcfg-*` files

use indexmap::IndexMap;

use guest_network_core::{EthernetInterface, Result, VlanDevice};

use crate::artifact::{ConfigArtifact, ConfigRenderer, MARKER_COMMENT};

const IFCFG_PREFIX: &str = "ifcfg-";

/// Renders wicked sysconfig files. Their names are fixed by wicked, so the
/// priority takes no part in them.
#[derive(Debug, Clone, Default)]
pub struct WickedRenderer;

impl WickedRenderer {
    pub fn new() -> Self {
        Self
    }

    fn bootproto(ipv6: bool) -> &'static str {
        if ipv6 {
            "dhcp"
        } else {
            "dhcp4"
        }
    }

    fn render(name: &str, variables: &IndexMap<&str, String>) -> ConfigArtifact {
        let mut content = format!("{}\n", MARKER_COMMENT);
        for (key, value) in variables {
            content.push_str(&format!("{}={}\n", key, value));
        }
        ConfigArtifact::new(format!("{}{}", IFCFG_PREFIX, name), content)
    }
}

impl ConfigRenderer for WickedRenderer {
    fn render_ethernet(&self, iface: &EthernetInterface) -> Result<Vec<ConfigArtifact>> {
        let mut variables = IndexMap::new();
        variables.insert("STARTMODE", "hotplug".to_string());
        variables.insert("BOOTPROTO", Self::bootproto(iface.ipv6).to_string());
        variables.insert(
            "DHCLIENT_SET_DEFAULT_ROUTE",
            if iface.is_primary() { "yes" } else { "no" }.to_string(),
        );
        if let Some(mtu) = iface.mtu {
            variables.insert("MTU", mtu.to_string());
        }

        Ok(vec![Self::render(&iface.name, &variables)])
    }

    fn render_vlan(&self, vlan: &VlanDevice) -> Result<Vec<ConfigArtifact>> {
        let mut variables = IndexMap::new();
        variables.insert("STARTMODE", "auto".to_string());
        variables.insert("BOOTPROTO", Self::bootproto(vlan.ipv6).to_string());
        variables.insert("DHCLIENT_SET_DEFAULT_ROUTE", "no".to_string());
        variables.insert("ETHERDEVICE", vlan.parent.clone());
        variables.insert("VLAN_ID", vlan.tag.to_string());
        if let Some(mac) = &vlan.mac {
            variables.insert("LLADDR", mac.to_string());
        }
        if let Some(mtu) = vlan.mtu {
            variables.insert("MTU", mtu.to_string());
        }

        Ok(vec![Self::render(&vlan.name(), &variables)])
    }

    fn is_owned(&self, file_name: &str, content: &str) -> bool {
        file_name.starts_with(IFCFG_PREFIX)
            && content.lines().any(|line| line.trim() == MARKER_COMMENT)
    }
}
