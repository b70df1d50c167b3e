//! netplan backend

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use guest_network_config::{ConfigArtifact, ConfigRenderer, NetplanRenderer};
use guest_network_core::lookup::PathLookup;
use guest_network_core::runner::CommandRunner;
use guest_network_core::{BackendKind, BackendRecord, EthernetInterface, Result, VlanDevice};

use crate::backend::{lookup_binary, NetworkBackend};

const NETPLAN: &str = "netplan";

/// netplan has no daemon of its own: it is in charge whenever it is installed
/// and its configuration directory exists.
pub struct Netplan {
    record: BackendRecord,
    config_dir: Option<PathBuf>,
    renderer: NetplanRenderer,
    runner: Arc<dyn CommandRunner>,
    lookup: Arc<dyn PathLookup>,
}

impl Netplan {
    pub fn new(
        priority: u32,
        config_dir: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        lookup: Arc<dyn PathLookup>,
    ) -> Self {
        Self {
            record: BackendRecord::new(BackendKind::Netplan, priority),
            config_dir,
            renderer: NetplanRenderer::new(priority),
            runner,
            lookup,
        }
    }
}

#[async_trait]
impl NetworkBackend for Netplan {
    fn record(&self) -> &BackendRecord {
        &self.record
    }

    fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    async fn is_managing(&self, _cancel: &CancellationToken, _iface: &str) -> Result<bool> {
        if lookup_binary(self.lookup.as_ref(), NETPLAN)?.is_none() {
            return Ok(false);
        }

        let Some(dir) = &self.config_dir else {
            return Ok(false);
        };

        let present = tokio::fs::metadata(dir)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !present {
            debug!("netplan installed but {:?} is missing", dir);
        }
        Ok(present)
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
        self.runner.run_quiet(cancel, NETPLAN, &["apply"]).await
    }
}
