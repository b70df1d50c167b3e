//! systemd-networkd backend

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use log::debug;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use guest_network_config::{ConfigArtifact, ConfigRenderer, NetworkdRenderer};
use guest_network_core::error::ProbeError;
use guest_network_core::lookup::PathLookup;
use guest_network_core::runner::CommandRunner;
use guest_network_core::{
    BackendKind, BackendRecord, EthernetInterface, NetworkError, Result, VlanDevice,
};

use crate::backend::{lookup_binary, service_is_active, NetworkBackend};

const NETWORKCTL: &str = "networkctl";
const SERVICE: &str = "systemd-networkd.service";

/// Oldest networkctl whose `status --json` output is usable
pub const MIN_NETWORKCTL_VERSION: u32 = 252;

/// Status keys checked in order; the first present decides
pub const STATE_KEYS: [&str; 2] = ["AdministrativeState", "SetupState"];

const CONFIGURED: &str = "configured";

static SYSTEMD_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^systemd\s+(\d+)").expect("systemd version pattern"));

pub struct SystemdNetworkd {
    record: BackendRecord,
    config_dir: Option<PathBuf>,
    renderer: NetworkdRenderer,
    runner: Arc<dyn CommandRunner>,
    lookup: Arc<dyn PathLookup>,
}

impl SystemdNetworkd {
    pub fn new(
        priority: u32,
        config_dir: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        lookup: Arc<dyn PathLookup>,
    ) -> Self {
        Self {
            record: BackendRecord::new(BackendKind::SystemdNetworkd, priority)
                .with_state_keys(&STATE_KEYS),
            config_dir,
            renderer: NetworkdRenderer::new(priority),
            runner,
            lookup,
        }
    }
}

/// Pull the major version out of `networkctl --version`, whose first line
/// reads like `systemd 252 (252.22-1~deb12u1)`.
pub fn parse_systemd_version(output: &str) -> Result<u32> {
    let malformed = |message: String| -> NetworkError {
        ProbeError::MalformedOutput {
            command: format!("{} --version", NETWORKCTL),
            message,
        }
        .into()
    };

    let first_line = output.lines().next().unwrap_or_default().trim();

    SYSTEMD_VERSION
        .captures(first_line)
        .and_then(|captures| captures.get(1))
        .and_then(|version| version.as_str().parse::<u32>().ok())
        .ok_or_else(|| malformed(format!("no version in {:?}", first_line)))
}

#[async_trait]
impl NetworkBackend for SystemdNetworkd {
    fn record(&self) -> &BackendRecord {
        &self.record
    }

    fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    async fn is_managing(&self, cancel: &CancellationToken, iface: &str) -> Result<bool> {
        if lookup_binary(self.lookup.as_ref(), NETWORKCTL)?.is_none() {
            return Ok(false);
        }

        let output = self.runner.run(cancel, NETWORKCTL, &["--version"]).await?;
        if !output.success() {
            return Err(ProbeError::Version {
                binary: NETWORKCTL.to_string(),
                stderr: output.stderr.trim().to_string(),
            }
            .into());
        }

        let version = parse_systemd_version(&output.stdout)?;
        if version < MIN_NETWORKCTL_VERSION {
            debug!(
                "networkctl version {} is older than {}",
                version, MIN_NETWORKCTL_VERSION
            );
            return Ok(false);
        }

        if !service_is_active(self.runner.as_ref(), cancel, SERVICE).await? {
            return Ok(false);
        }

        let output = self
            .runner
            .run(cancel, NETWORKCTL, &["status", iface, "--json=short"])
            .await?;
        if !output.success() {
            return Err(ProbeError::Status {
                backend: self.name().to_string(),
                stderr: output.stderr.trim().to_string(),
            }
            .into());
        }

        let status: serde_json::Value =
            serde_json::from_str(&output.stdout).map_err(|e| ProbeError::MalformedOutput {
                command: format!("{} status {} --json=short", NETWORKCTL, iface),
                message: e.to_string(),
            })?;

        for key in &self.record.state_keys {
            let Some(value) = status.get(key) else {
                continue;
            };
            let state = value.as_str().ok_or_else(|| ProbeError::MalformedOutput {
                command: format!("{} status {} --json=short", NETWORKCTL, iface),
                message: format!("{} is not a string: {}", key, value),
            })?;
            debug!("{} {} of {} is {:?}", self.name(), key, iface, state);
            return Ok(state == CONFIGURED);
        }

        Err(ProbeError::MissingStateKeys {
            keys: self.record.state_keys.clone(),
        }
        .into())
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

    async fn activate(&self, cancel: &CancellationToken, names: &[String]) -> Result<()> {
        self.runner.run_quiet(cancel, NETWORKCTL, &["reload"]).await?;

        if !names.is_empty() {
            let mut args = vec!["reconfigure"];
            args.extend(names.iter().map(String::as_str));
            self.runner.run_quiet(cancel, NETWORKCTL, &args).await?;
        }

        Ok(())
    }
}
