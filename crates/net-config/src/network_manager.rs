//! NetworkManager keyfiles

use guest_network_core::{EthernetInterface, Result, VlanDevice};

use crate::artifact::{artifact_stem, ConfigArtifact, ConfigRenderer, ARTIFACT_SUFFIX};
use crate::ini::IniDocument;

pub const MARKER_SECTION: &str = "guest-agent";
pub const MARKER_KEY: &str = "managed";

const KEYFILE_EXTENSION: &str = ".nmconnection";

/// NetworkManager refuses keyfiles readable by other users
const KEYFILE_MODE: u32 = 0o600;

/// Renders NetworkManager connection keyfiles
#[derive(Debug, Clone)]
pub struct NetworkManagerRenderer {
    priority: u32,
}

impl NetworkManagerRenderer {
    pub fn new(priority: u32) -> Self {
        Self { priority }
    }

    fn connection_id(name: &str) -> String {
        format!("{}-{}", ARTIFACT_SUFFIX, name)
    }

    fn set_ip(document: &mut IniDocument, ipv6: bool, primary: bool) {
        document.set("ipv4", "method", "auto");
        if !primary {
            document.set("ipv4", "ignore-auto-dns", "true");
        }
        document.set("ipv6", "method", if ipv6 { "auto" } else { "ignore" });
        if ipv6 && !primary {
            document.set("ipv6", "ignore-auto-dns", "true");
        }
    }

    fn artifact(&self, name: &str, document: &mut IniDocument) -> ConfigArtifact {
        document.set(MARKER_SECTION, MARKER_KEY, "true");
        ConfigArtifact::new(
            format!("{}{}", artifact_stem(self.priority, name), KEYFILE_EXTENSION),
            document.render(),
        )
        .with_mode(KEYFILE_MODE)
    }
}

impl ConfigRenderer for NetworkManagerRenderer {
    fn render_ethernet(&self, iface: &EthernetInterface) -> Result<Vec<ConfigArtifact>> {
        let mut document = IniDocument::new();
        document
            .set("connection", "id", Self::connection_id(&iface.name))
            .set("connection", "type", "ethernet")
            .set("connection", "interface-name", &iface.name)
            .set("connection", "autoconnect", "true");
        if let Some(mtu) = iface.mtu {
            document.set("ethernet", "mtu", mtu.to_string());
        }
        Self::set_ip(&mut document, iface.ipv6, iface.is_primary());

        Ok(vec![self.artifact(&iface.name, &mut document)])
    }

    fn render_vlan(&self, vlan: &VlanDevice) -> Result<Vec<ConfigArtifact>> {
        let name = vlan.name();

        let mut document = IniDocument::new();
        document
            .set("connection", "id", Self::connection_id(&name))
            .set("connection", "type", "vlan")
            .set("connection", "interface-name", &name)
            .set("connection", "autoconnect", "true")
            .set("vlan", "id", vlan.tag.to_string())
            .set("vlan", "parent", &vlan.parent);
        if let Some(mac) = &vlan.mac {
            document.set("ethernet", "cloned-mac-address", mac.to_string());
        }
        if let Some(mtu) = vlan.mtu {
            document.set("ethernet", "mtu", mtu.to_string());
        }
        Self::set_ip(&mut document, vlan.ipv6, false);

        Ok(vec![self.artifact(&name, &mut document)])
    }

    fn is_owned(&self, file_name: &str, content: &str) -> bool {
        let candidate = file_name
            .strip_suffix(KEYFILE_EXTENSION)
            .is_some_and(|stem| stem.ends_with(ARTIFACT_SUFFIX));
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
