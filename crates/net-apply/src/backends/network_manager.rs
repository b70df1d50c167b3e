//! NetworkManager backend

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use guest_network_config::{ConfigArtifact, ConfigRenderer, NetworkManagerRenderer};
use guest_network_core::error::ProbeError;
use guest_network_core::lookup::PathLookup;
use guest_network_core::runner::CommandRunner;
use guest_network_core::{BackendKind, BackendRecord, EthernetInterface, Result, VlanDevice};

use crate::backend::{lookup_binary, service_is_active, NetworkBackend};

const NMCLI: &str = "nmcli";
const SERVICE: &str = "NetworkManager.service";
const STATE_KEY: &str = "GENERAL.STATE";

/// nmcli prints states like `100 (connected)`
const CONNECTED: &str = "(connected)";

pub struct NetworkManager {
    record: BackendRecord,
    config_dir: Option<PathBuf>,
    renderer: NetworkManagerRenderer,
    runner: Arc<dyn CommandRunner>,
    lookup: Arc<dyn PathLookup>,
}

impl NetworkManager {
    pub fn new(
        priority: u32,
        config_dir: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        lookup: Arc<dyn PathLookup>,
    ) -> Self {
        Self {
            record: BackendRecord::new(BackendKind::NetworkManager, priority)
                .with_state_keys(&[STATE_KEY]),
            config_dir,
            renderer: NetworkManagerRenderer::new(priority),
            runner,
            lookup,
        }
    }
}

#[async_trait]
impl NetworkBackend for NetworkManager {
    fn record(&self) -> &BackendRecord {
        &self.record
    }

    fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    async fn is_managing(&self, cancel: &CancellationToken, iface: &str) -> Result<bool> {
        if lookup_binary(self.lookup.as_ref(), NMCLI)?.is_none() {
            return Ok(false);
        }

        if !service_is_active(self.runner.as_ref(), cancel, SERVICE).await? {
            return Ok(false);
        }

        let output = self
            .runner
            .run(cancel, NMCLI, &["-g", STATE_KEY, "device", "show", iface])
            .await?;
        if !output.success() {
            return Err(ProbeError::Status {
                backend: self.name().to_string(),
                stderr: output.stderr.trim().to_string(),
            }
            .into());
        }

        let state = output.stdout.trim();
        if state.is_empty() {
            return Err(ProbeError::MissingStateKeys {
                keys: self.record.state_keys.clone(),
            }
            .into());
        }

        debug!("{} state of {} is {:?}", self.name(), iface, state);
        Ok(state.contains(CONNECTED))
    }

    fn render_ethernet(&self, iface: &EthernetInterface) -> Result<Vec<ConfigArtifact>> {
        self.renderer.render_ethernet(iface)
    }

    fn render_vlan(&self, vlan: &VlanDevice) -> Result<Vec<ConfigArtifact>> {
        self.renderer.render_vlan(vlan)
    }

    fn is_owned(&self, file_name: &str, content: &str) -> bool {
        self.renderer.is_owned(file_name, content)
    }

    async fn activate(&self, cancel: &CancellationToken, _names: &[String]) -> Result<()> {
        self.runner
            .run_quiet(cancel, NMCLI, &["connection", "reload"])
            .await
    }
}
