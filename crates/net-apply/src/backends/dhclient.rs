//! dhclient backend: detection only, it takes no configuration files

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use guest_network_config::ConfigArtifact;
use guest_network_core::error::ProbeError;
use guest_network_core::lookup::PathLookup;
use guest_network_core::runner::CommandRunner;
use guest_network_core::{BackendKind, BackendRecord, EthernetInterface, Result, VlanDevice};

use crate::backend::{lookup_binary, NetworkBackend};

const DHCLIENT: &str = "dhclient";
const PGREP: &str = "pgrep";

pub struct Dhclient {
    record: BackendRecord,
    runner: Arc<dyn CommandRunner>,
    lookup: Arc<dyn PathLookup>,
}

impl Dhclient {
    pub fn new(priority: u32, runner: Arc<dyn CommandRunner>, lookup: Arc<dyn PathLookup>) -> Self {
        Self {
            record: BackendRecord::new(BackendKind::Dhclient, priority),
            runner,
            lookup,
        }
    }
}

#[async_trait]
impl NetworkBackend for Dhclient {
    fn record(&self) -> &BackendRecord {
        &self.record
    }

    fn config_dir(&self) -> Option<&Path> {
        None
    }

    async fn is_managing(&self, cancel: &CancellationToken, iface: &str) -> Result<bool> {
        if lookup_binary(self.lookup.as_ref(), DHCLIENT)?.is_none() {
            return Ok(false);
        }

        let pattern = format!("{}.*{}", DHCLIENT, iface);
        let output = self.runner.run(cancel, PGREP, &["-f", pattern.as_str()]).await?;

        // pgrep: 0 matched, 1 nothing matched, anything else is a failure
        match output.exit_code {
            Some(0) => Ok(true),
            Some(1) => {
                debug!("No dhclient process for {}", iface);
                Ok(false)
            }
            _ => Err(ProbeError::Status {
                backend: self.name().to_string(),
                stderr: output.stderr.trim().to_string(),
            }
            .into()),
        }
    }

    fn render_ethernet(&self, _iface: &EthernetInterface) -> Result<Vec<ConfigArtifact>> {
        Ok(Vec::new())
    }

    fn render_vlan(&self, _vlan: &VlanDevice) -> Result<Vec<ConfigArtifact>> {
        Ok(Vec::new())
    }

    fn is_owned(&self, _file_name: &str, _content: &str) -> bool {
        false
    }

    async fn activate(&self, _cancel: &CancellationToken, _names: &[String]) -> Result<()> {
        Ok(())
    }
}
