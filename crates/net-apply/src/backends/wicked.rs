//! wicked backend

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use guest_network_config::{ConfigArtifact, ConfigRenderer, WickedRenderer};
use guest_network_core::error::ProbeError;
use guest_network_core::lookup::PathLookup;
use guest_network_core::runner::CommandRunner;
use guest_network_core::{BackendKind, BackendRecord, EthernetInterface, Result, VlanDevice};

use crate::backend::{lookup_binary, service_is_active, NetworkBackend};

const WICKED: &str = "wicked";
const SERVICE: &str = "wickedd.service";

/// Interface states reported by `ifstatus --brief` that mean wicked owns it
const MANAGED_STATES: [&str; 2] = ["up", "setup-in-progress"];

pub struct Wicked {
    record: BackendRecord,
    config_dir: Option<PathBuf>,
    renderer: WickedRenderer,
    runner: Arc<dyn CommandRunner>,
    lookup: Arc<dyn PathLookup>,
}

impl Wicked {
    pub fn new(
        priority: u32,
        config_dir: Option<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        lookup: Arc<dyn PathLookup>,
    ) -> Self {
        Self {
            record: BackendRecord::new(BackendKind::Wicked, priority),
            config_dir,
            renderer: WickedRenderer::new(),
            runner,
            lookup,
        }
    }
}

#[async_trait]
impl NetworkBackend for Wicked {
    fn record(&self) -> &BackendRecord {
        &self.record
    }

    fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    async fn is_managing(&self, cancel: &CancellationToken, iface: &str) -> Result<bool> {
        if lookup_binary(self.lookup.as_ref(), WICKED)?.is_none() {
            return Ok(false);
        }

        if !service_is_active(self.runner.as_ref(), cancel, SERVICE).await? {
            return Ok(false);
        }

        // ifstatus exits non-zero for every state but "up", so the exit code
        // alone says nothing about failure.
        let output = self
            .runner
            .run(cancel, WICKED, &["ifstatus", "--brief", iface])
            .await?;

        let state = output.stdout.lines().find_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(name), Some(state)) if name == iface => Some(state.to_string()),
                _ => None,
            }
        });

        match state {
            Some(state) => {
                debug!("{} state of {} is {:?}", self.name(), iface, state);
                Ok(MANAGED_STATES.contains(&state.as_str()))
            }
            None if !output.success() => Err(ProbeError::Status {
                backend: self.name().to_string(),
                stderr: output.stderr.trim().to_string(),
            }
            .into()),
            None => Err(ProbeError::MalformedOutput {
                command: format!("{} ifstatus --brief {}", WICKED, iface),
                message: format!("no status line for {}", iface),
            }
            .into()),
        }
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
            .run_quiet(cancel, WICKED, &["ifreload", "all"])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{lookup_all, ScriptedRunner};

    const STATUS: &str = "wicked ifstatus --brief eth0";

    fn backend(runner: ScriptedRunner) -> Wicked {
        let runner = runner.on("systemctl is-active wickedd.service", 0, "active\n", "");
        Wicked::new(2, None, Arc::new(runner), Arc::new(lookup_all()))
    }

    #[tokio::test]
    async fn test_interface_states() {
        let cancel = CancellationToken::new();

        let up = backend(ScriptedRunner::new().on(STATUS, 0, "eth0            up\n", ""));
        assert!(up.is_managing(&cancel, "eth0").await.unwrap());

        let progress = backend(ScriptedRunner::new().on(
            STATUS,
            162,
            "eth0            setup-in-progress\n",
            "",
        ));
        assert!(progress.is_managing(&cancel, "eth0").await.unwrap());

        let down = backend(ScriptedRunner::new().on(
            STATUS,
            155,
            "eth0            device-not-running\n",
            "",
        ));
        assert!(!down.is_managing(&cancel, "eth0").await.unwrap());
    }

    #[tokio::test]
    async fn test_status_failure() {
        let cancel = CancellationToken::new();

        let failing = backend(ScriptedRunner::new().on(STATUS, 1, "", "wickedd not reachable"));
        let err = failing.is_managing(&cancel, "eth0").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to check wicked network status: wickedd not reachable"
        );

        let garbled = backend(ScriptedRunner::new().on(STATUS, 0, "eth1 up\n", ""));
        assert!(garbled.is_managing(&cancel, "eth0").await.is_err());
    }
}
