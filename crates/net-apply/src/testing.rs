//! Test doubles for the command runner, PATH lookup and backend seams

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use tokio_util::sync::CancellationToken;

use guest_network_config::{ConfigArtifact, ConfigRenderer, NetworkdRenderer};
use guest_network_core::error::{ProbeError, SystemError};
use guest_network_core::interface::{InterfaceSource, LiveInterface};
use guest_network_core::lookup::{LookupError, PathLookup};
use guest_network_core::runner::{format_command, CommandOutput, CommandRunner};
use guest_network_core::{
    BackendKind, BackendRecord, EthernetInterface, NetworkError, Result, VlanDevice,
};

use crate::backend::NetworkBackend;

mock! {
    pub Lookup {}

    impl PathLookup for Lookup {
        fn lookup(&self, binary: &str) -> std::result::Result<PathBuf, LookupError>;
    }
}

/// Lookup double that finds every binary under `/usr/bin`
pub fn lookup_all() -> MockLookup {
    let mut lookup = MockLookup::new();
    lookup
        .expect_lookup()
        .returning(|binary| Ok(PathBuf::from("/usr/bin").join(binary)));
    lookup
}

/// Lookup double that finds nothing
pub fn lookup_none() -> MockLookup {
    let mut lookup = MockLookup::new();
    lookup
        .expect_lookup()
        .returning(|_| Err(LookupError::NotFound));
    lookup
}

/// Runner answering from a table keyed by the full command line; unknown
/// commands fail to spawn, like a missing binary would.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, CommandOutput>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, command: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.respond(command, exit_code, stdout, stderr);
        self
    }

    pub fn respond(&self, command: &str, exit_code: i32, stdout: &str, stderr: &str) {
        self.responses.lock().unwrap().insert(
            command.to_string(),
            CommandOutput {
                exit_code: Some(exit_code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                duration_ms: 0,
            },
        );
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    fn default_timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn run_with_timeout(
        &self,
        cancel: &CancellationToken,
        _limit: Duration,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput> {
        let command = format_command(program, args);
        if cancel.is_cancelled() {
            return Err(NetworkError::System(SystemError::Cancelled { operation: command }));
        }

        self.calls.lock().unwrap().push(command.clone());
        self.responses
            .lock()
            .unwrap()
            .get(&command)
            .cloned()
            .ok_or_else(|| {
                NetworkError::System(SystemError::CommandSpawn {
                    command,
                    message: "no scripted response".to_string(),
                })
            })
    }
}

/// Probe outcome of a [`FakeBackend`]
#[derive(Debug, Clone)]
pub enum Probe {
    Managing,
    Absent,
    Fails(&'static str),
}

/// Backend with a fixed probe outcome that renders systemd-networkd units
/// into `config_dir`
pub struct FakeBackend {
    record: BackendRecord,
    config_dir: Option<PathBuf>,
    renderer: NetworkdRenderer,
    probe: Probe,
    probes: AtomicUsize,
    activations: Mutex<Vec<Vec<String>>>,
}

impl FakeBackend {
    pub fn new(kind: BackendKind, priority: u32, probe: Probe) -> Self {
        Self {
            record: BackendRecord::new(kind, priority),
            config_dir: None,
            renderer: NetworkdRenderer::new(priority),
            probe,
            probes: AtomicUsize::new(0),
            activations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_config_dir(mut self, dir: &Path) -> Self {
        self.config_dir = Some(dir.to_path_buf());
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn activations(&self) -> Vec<Vec<String>> {
        self.activations.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkBackend for FakeBackend {
    fn record(&self) -> &BackendRecord {
        &self.record
    }

    fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    async fn is_managing(&self, _cancel: &CancellationToken, _iface: &str) -> Result<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match &self.probe {
            Probe::Managing => Ok(true),
            Probe::Absent => Ok(false),
            Probe::Fails(stderr) => Err(ProbeError::Status {
                backend: self.name().to_string(),
                stderr: stderr.to_string(),
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

    async fn activate(&self, _cancel: &CancellationToken, names: &[String]) -> Result<()> {
        self.activations.lock().unwrap().push(names.to_vec());
        Ok(())
    }
}

/// Fixed set of live interfaces
#[derive(Default)]
pub struct StaticInterfaces {
    interfaces: Mutex<Vec<LiveInterface>>,
}

impl StaticInterfaces {
    pub fn new(interfaces: Vec<LiveInterface>) -> Self {
        Self {
            interfaces: Mutex::new(interfaces),
        }
    }

    pub fn numbered(prefix: &str, count: usize) -> Self {
        Self::new(numbered_interfaces(prefix, count))
    }

    pub fn set(&self, interfaces: Vec<LiveInterface>) {
        *self.interfaces.lock().unwrap() = interfaces;
    }
}

#[async_trait]
impl InterfaceSource for StaticInterfaces {
    async fn list(&self) -> Result<Vec<LiveInterface>> {
        Ok(self.interfaces.lock().unwrap().clone())
    }
}

/// Interfaces `{prefix}0..` carrying the MACs of [`nic_mac`]
pub fn numbered_interfaces(prefix: &str, count: usize) -> Vec<LiveInterface> {
    (0..count)
        .map(|n| {
            let mac = nic_mac(n).parse().unwrap();
            LiveInterface::new(&format!("{}{}", prefix, n), Some(mac))
        })
        .collect()
}

/// MAC of the n-th test NIC
pub fn nic_mac(n: usize) -> String {
    format!("42:01:0a:00:00:{:02x}", n + 2)
}
