//! Network setup orchestration
//!
//! One pass: list live interfaces, resolve the desired topology, pick the
//! backend managing the primary NIC, reconcile its config directory, clear
//! artifacts left in every other backend's directory, then activate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use guest_network_core::interface::{InterfaceSource, SysfsInterfaceSource};
use guest_network_core::lookup::SystemPathLookup;
use guest_network_core::runner::ProcessRunner;
use guest_network_core::vlan::{resolve_topology, ResolvedTopology};
use guest_network_core::{ConfigChange, DesiredTopology, Result};

use crate::backend::NetworkBackend;
use crate::backends::BackendRegistry;
use crate::reconcile::{ArtifactUnit, ReconcileReport, Reconciler};
use crate::selector::select_backend;
use crate::settings::Settings;

/// Result of a full setup pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct SetupReport {
    /// Backend selected for the primary NIC
    pub backend: Option<String>,
    /// Changes made in the selected backend's directory
    pub reconcile: Option<ReconcileReport>,
    /// Artifacts removed from the other backends' directories
    pub rolled_back: Vec<ReconcileReport>,
    /// Whether activation commands ran
    pub activated: bool,
    pub duration_ms: u64,
}

impl SetupReport {
    /// Every change of the pass, selected backend first
    pub fn changes(&self) -> Vec<&ConfigChange> {
        self.reconcile
            .iter()
            .chain(self.rolled_back.iter())
            .flat_map(|report| report.changes.iter())
            .collect()
    }

    pub fn changed(&self) -> bool {
        !self.changes().is_empty()
    }
}

/// Artifacts a pass would write, without touching the filesystem
#[derive(Debug, Clone, Serialize)]
pub struct SetupPlan {
    pub backend: String,
    pub config_dir: Option<PathBuf>,
    pub units: Vec<ArtifactUnit>,
}

/// Owned artifacts of one backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub priority: u32,
    pub config_dir: Option<PathBuf>,
    pub owned: Vec<String>,
}

pub struct NetworkService {
    registry: BackendRegistry,
    interfaces: Arc<dyn InterfaceSource>,
}

impl NetworkService {
    pub fn new(registry: BackendRegistry, interfaces: Arc<dyn InterfaceSource>) -> Self {
        Self {
            registry,
            interfaces,
        }
    }

    /// Wire the production runner, PATH lookup and sysfs listing
    pub fn from_settings(settings: &Settings) -> Self {
        let registry = BackendRegistry::from_settings(
            settings,
            Arc::new(ProcessRunner::new(settings.command_timeout())),
            Arc::new(SystemPathLookup),
        );
        let interfaces = Arc::new(SysfsInterfaceSource::new(&settings.sysfs_net_dir));
        Self::new(registry, interfaces)
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Backend currently managing `iface`, if any
    pub async fn detect(
        &self,
        cancel: &CancellationToken,
        iface: &str,
    ) -> Result<Option<Arc<dyn NetworkBackend>>> {
        select_backend(self.registry.backends(), cancel, iface).await
    }

    /// Map the desired topology onto live interface names
    pub async fn resolve(&self, desired: &DesiredTopology) -> Result<ResolvedTopology> {
        let live = self.interfaces.list().await?;
        debug!("{} live interfaces", live.len());
        resolve_topology(desired, &live)
    }

    /// OS name of the primary NIC, when it is live
    pub async fn primary_interface(&self, desired: &DesiredTopology) -> Result<Option<String>> {
        let topology = self.resolve(desired).await?;
        Ok(primary_name(&topology))
    }

    /// Render what `setup` would write for `desired`
    pub async fn plan(
        &self,
        cancel: &CancellationToken,
        desired: &DesiredTopology,
    ) -> Result<Option<SetupPlan>> {
        let topology = self.resolve(desired).await?;
        let Some(backend) = self.select_for(cancel, &topology).await? else {
            return Ok(None);
        };

        let reconciler = Reconciler::new(backend.clone());
        Ok(Some(SetupPlan {
            backend: backend.name().to_string(),
            config_dir: backend.config_dir().map(|dir| dir.to_path_buf()),
            units: reconciler.render(&topology)?,
        }))
    }

    /// Full reconciliation pass
    pub async fn setup(
        &self,
        cancel: &CancellationToken,
        desired: &DesiredTopology,
    ) -> Result<SetupReport> {
        let start_time = Instant::now();
        let mut report = SetupReport::default();

        // Resolution fails before anything is written
        let topology = self.resolve(desired).await?;
        let Some(backend) = self.select_for(cancel, &topology).await? else {
            return Ok(report);
        };
        report.backend = Some(backend.name().to_string());

        let reconciled = Reconciler::new(backend.clone())
            .setup(cancel, &topology)
            .await?;

        for other in self.registry.backends() {
            if other.name() == backend.name() || other.config_dir() == backend.config_dir() {
                continue;
            }
            let rolled_back = Reconciler::new(other.clone()).rollback(cancel).await?;
            if rolled_back.changed() {
                report.rolled_back.push(rolled_back);
            }
        }

        if reconciled.changed() {
            let names = topology.ethernet_names();
            info!("Activating {} for {}", backend.name(), names.join(", "));
            backend.activate(cancel, &names).await?;
            report.activated = true;
        } else {
            debug!("{} configuration unchanged", backend.name());
        }
        report.reconcile = Some(reconciled);

        report.duration_ms = start_time.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Remove owned artifacts from every backend
    pub async fn rollback_all(&self, cancel: &CancellationToken) -> Result<Vec<ReconcileReport>> {
        let mut reports = Vec::new();
        for backend in self.registry.backends() {
            reports.push(Reconciler::new(backend.clone()).rollback(cancel).await?);
        }
        Ok(reports)
    }

    /// Owned artifacts per backend, in probe order
    pub async fn status(&self) -> Result<Vec<BackendStatus>> {
        let mut statuses = Vec::new();
        for backend in self.registry.backends() {
            let owned = Reconciler::new(backend.clone()).owned_files().await?;
            statuses.push(BackendStatus {
                name: backend.name().to_string(),
                priority: backend.record().priority,
                config_dir: backend.config_dir().map(|dir| dir.to_path_buf()),
                owned,
            });
        }
        Ok(statuses)
    }

    async fn select_for(
        &self,
        cancel: &CancellationToken,
        topology: &ResolvedTopology,
    ) -> Result<Option<Arc<dyn NetworkBackend>>> {
        let Some(primary) = primary_name(topology) else {
            warn!("Primary NIC is not present, skipping network setup");
            return Ok(None);
        };

        let selected = self.detect(cancel, &primary).await?;
        if selected.is_none() {
            warn!("No supported network manager manages {}, skipping network setup", primary);
        }
        Ok(selected)
    }
}

fn primary_name(topology: &ResolvedTopology) -> Option<String> {
    topology
        .ethernet
        .iter()
        .find(|iface| iface.is_primary())
        .map(|iface| iface.name.clone())
}
