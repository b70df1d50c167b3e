//! Reconciliation of a backend's config directory
//!
//! A pass renders every desired artifact, writes the ones that are missing
//! or stale, and only then deletes owned files that are no longer desired.
//! Files without the ownership marker are never touched.

use std::collections::HashSet;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use guest_network_config::{ConfigArtifact, ARTIFACT_SUFFIX};
use guest_network_core::error::SystemError;
use guest_network_core::vlan::ResolvedTopology;
use guest_network_core::{ChangeType, ConfigChange, NetworkError, Result};

use crate::backend::NetworkBackend;

/// Outcome of one reconciliation or rollback pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub backend: String,
    pub config_dir: Option<PathBuf>,
    pub changes: Vec<ConfigChange>,
    /// Targets left alone because a foreign file already occupies them
    pub skipped: Vec<PathBuf>,
    pub duration_ms: u64,
}

impl ReconcileReport {
    fn new(backend: &dyn NetworkBackend) -> Self {
        Self {
            backend: backend.name().to_string(),
            config_dir: backend.config_dir().map(Path::to_path_buf),
            ..Default::default()
        }
    }

    /// Whether any file was created, updated or deleted
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn count(&self, change_type: ChangeType) -> usize {
        self.changes
            .iter()
            .filter(|change| change.change_type == change_type)
            .count()
    }
}

/// The artifacts of one device; written all together or not at all
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactUnit {
    pub device: String,
    pub artifacts: Vec<ConfigArtifact>,
}

/// A file replaced during a unit write, kept to undo the unit
struct Replaced {
    path: PathBuf,
    previous: Option<String>,
    mode: u32,
}

/// Marker-carrying files of a config directory, plus temp files left by an
/// interrupted write
#[derive(Debug, Default)]
struct DirScan {
    owned: Vec<String>,
    stale_temps: Vec<String>,
}

/// Reconciles one backend's config directory
pub struct Reconciler {
    backend: Arc<dyn NetworkBackend>,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn NetworkBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn NetworkBackend> {
        &self.backend
    }

    /// Render every artifact of the topology, Ethernet devices first
    pub fn render(&self, topology: &ResolvedTopology) -> Result<Vec<ArtifactUnit>> {
        let mut units = Vec::new();

        for iface in &topology.ethernet {
            units.push(ArtifactUnit {
                device: iface.name.clone(),
                artifacts: self.backend.render_ethernet(iface)?,
            });
        }

        for vlan in &topology.vlans {
            units.push(ArtifactUnit {
                device: vlan.name(),
                artifacts: self.backend.render_vlan(vlan)?,
            });
        }

        units.retain(|unit| !unit.artifacts.is_empty());
        Ok(units)
    }

    /// Names of the files in the config directory that carry the marker
    pub async fn owned_files(&self) -> Result<Vec<String>> {
        match self.backend.config_dir() {
            Some(dir) => Ok(self.scan(dir).await?.owned),
            None => Ok(Vec::new()),
        }
    }

    async fn scan(&self, dir: &Path) -> Result<DirScan> {
        let mut scan = DirScan::default();

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{:?} does not exist, nothing owned", dir);
                return Ok(scan);
            }
            Err(source) => {
                return Err(NetworkError::System(SystemError::ConfigDir {
                    path: dir.to_path_buf(),
                    source,
                }))
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|source| {
            NetworkError::System(SystemError::ConfigDir {
                path: dir.to_path_buf(),
                source,
            })
        })? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let content = match read_existing(&entry.path()).await {
                Ok(Some(content)) => content,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Skipping unreadable {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            // A crash mid-write may have truncated the marker away
            let stale_temp = temp_target(&file_name).map(|target| {
                target.contains(ARTIFACT_SUFFIX) || self.backend.is_owned(target, &content)
            });
            match stale_temp {
                Some(true) => scan.stale_temps.push(file_name),
                Some(false) => {}
                None if self.backend.is_owned(&file_name, &content) => scan.owned.push(file_name),
                None => {}
            }
        }

        scan.owned.sort();
        scan.stale_temps.sort();
        Ok(scan)
    }

    /// Remove temp files an interrupted pass left behind. They are not
    /// reported as changes.
    async fn sweep_temps(&self, dir: &Path, temps: &[String]) {
        for file_name in temps {
            let path = dir.join(file_name);
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed stale {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove stale {:?}: {}", path, e),
            }
        }
    }

    /// Make the config directory match the topology
    pub async fn setup(
        &self,
        cancel: &CancellationToken,
        topology: &ResolvedTopology,
    ) -> Result<ReconcileReport> {
        let start_time = Instant::now();
        let mut report = ReconcileReport::new(self.backend.as_ref());

        let Some(dir) = self.backend.config_dir() else {
            debug!("{} takes no configuration files", self.backend.name());
            return Ok(report);
        };

        let units = self.render(topology)?;
        let DirScan { owned, stale_temps } = self.scan(dir).await?;
        self.sweep_temps(dir, &stale_temps).await;

        if !units.is_empty() {
            ensure_active(cancel, "setup")?;
            fs::create_dir_all(dir).await.map_err(|source| {
                NetworkError::System(SystemError::ConfigDir {
                    path: dir.to_path_buf(),
                    source,
                })
            })?;
        }

        let mut desired = HashSet::new();
        for unit in &units {
            ensure_active(cancel, "setup")?;
            desired.extend(unit.artifacts.iter().map(|a| a.file_name.clone()));
            self.write_unit(dir, unit, &mut report).await?;
        }

        for file_name in owned.iter().filter(|name| !desired.contains(*name)) {
            ensure_active(cancel, "setup")?;
            self.delete(dir, file_name, &mut report).await?;
        }

        report.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "{}: {} created, {} updated, {} deleted, {} skipped in {}ms",
            report.backend,
            report.count(ChangeType::Create),
            report.count(ChangeType::Update),
            report.count(ChangeType::Delete),
            report.skipped.len(),
            report.duration_ms
        );

        Ok(report)
    }

    /// Remove every owned file from the config directory
    pub async fn rollback(&self, cancel: &CancellationToken) -> Result<ReconcileReport> {
        let start_time = Instant::now();
        let mut report = ReconcileReport::new(self.backend.as_ref());

        let Some(dir) = self.backend.config_dir() else {
            return Ok(report);
        };

        let DirScan { owned, stale_temps } = self.scan(dir).await?;
        self.sweep_temps(dir, &stale_temps).await;

        for file_name in owned {
            ensure_active(cancel, "rollback")?;
            self.delete(dir, &file_name, &mut report).await?;
        }

        report.duration_ms = start_time.elapsed().as_millis() as u64;
        if report.changed() {
            info!(
                "Rolled back {} {} artifacts",
                report.changes.len(),
                report.backend
            );
        }
        Ok(report)
    }

    async fn write_unit(
        &self,
        dir: &Path,
        unit: &ArtifactUnit,
        report: &mut ReconcileReport,
    ) -> Result<()> {
        let mut current = Vec::with_capacity(unit.artifacts.len());
        for artifact in &unit.artifacts {
            let path = dir.join(&artifact.file_name);
            let existing = read_existing(&path)
                .await
                .map_err(|source| NetworkError::System(SystemError::ConfigWrite {
                    path: path.clone(),
                    source,
                }))?;

            if let Some(content) = &existing {
                if !self.backend.is_owned(&artifact.file_name, content) {
                    warn!(
                        "{:?} is not managed by the guest agent, leaving {} unconfigured",
                        path, unit.device
                    );
                    report.skipped.push(path);
                    return Ok(());
                }
            }
            current.push((path, existing));
        }

        let mut replaced: Vec<Replaced> = Vec::new();
        let mut changes = Vec::new();

        for (artifact, (path, existing)) in unit.artifacts.iter().zip(current) {
            if existing.as_deref() == Some(artifact.content.as_str()) {
                debug!("{:?} is up to date", path);
                continue;
            }

            if let Err(e) = write_atomic(&path, &artifact.content, artifact.mode).await {
                warn!("Writing {} failed, undoing its other files", unit.device);
                undo(&replaced).await;
                return Err(e);
            }

            let change_type = if existing.is_some() {
                ChangeType::Update
            } else {
                ChangeType::Create
            };
            debug!("{} {:?}", change_type, path);
            changes.push(ConfigChange::new(
                change_type,
                self.backend.name(),
                &artifact.file_name,
            ));
            replaced.push(Replaced {
                path,
                previous: existing,
                mode: artifact.mode,
            });
        }

        report.changes.extend(changes);
        Ok(())
    }

    async fn delete(&self, dir: &Path, file_name: &str, report: &mut ReconcileReport) -> Result<()> {
        let path = dir.join(file_name);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(NetworkError::System(SystemError::ConfigDelete { path, source }))
            }
        }

        debug!("Deleted {:?}", path);
        report.changes.push(ConfigChange::new(
            ChangeType::Delete,
            self.backend.name(),
            file_name,
        ));
        Ok(())
    }
}

fn ensure_active(cancel: &CancellationToken, operation: &str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(NetworkError::System(SystemError::Cancelled {
            operation: operation.to_string(),
        }));
    }
    Ok(())
}

/// Current content of a regular file, `None` when absent. Content that is
/// not UTF-8 is read lossily; it cannot carry a marker anyway.
async fn read_existing(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn temp_name(file_name: &str) -> String {
    format!(".{}.tmp", file_name)
}

/// Target name of a temp file written by `write_atomic`
fn temp_target(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix('.')?
        .strip_suffix(".tmp")
        .filter(|target| !target.is_empty())
}

/// Write through a hidden temp file in the same directory, then rename over
/// the target
async fn write_atomic(path: &Path, content: &str, mode: u32) -> Result<()> {
    let write_error = |source| {
        NetworkError::System(SystemError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = path.with_file_name(temp_name(&file_name));

    let result = async {
        fs::write(&temp_path, content).await?;
        fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(mode)).await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path).await;
        return Err(write_error(e));
    }
    Ok(())
}

async fn undo(replaced: &[Replaced]) {
    for file in replaced.iter().rev() {
        let result = match &file.previous {
            Some(content) => write_atomic(&file.path, content, file.mode).await,
            None => fs::remove_file(&file.path)
                .await
                .map_err(|source| {
                    NetworkError::System(SystemError::ConfigDelete {
                        path: file.path.clone(),
                        source,
                    })
                }),
        };
        if let Err(e) = result {
            warn!("Failed to undo {:?}: {}", file.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, Probe};
    use guest_network_config::{ConfigRenderer, NetworkdRenderer};
    use guest_network_core::{BackendKind, EthernetInterface, VlanDevice};
    use tempfile::TempDir;

    fn reconciler(dir: &Path) -> Reconciler {
        Reconciler::new(Arc::new(
            FakeBackend::new(BackendKind::SystemdNetworkd, 1, Probe::Managing).with_config_dir(dir),
        ))
    }

    fn ethernet(index: usize, name: &str) -> EthernetInterface {
        EthernetInterface::new(index, name, "42:01:0a:00:00:02".parse().unwrap())
    }

    fn files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_rewrite_is_skipped_when_unchanged() {
        let dir = TempDir::new().unwrap();
        let reconciler = reconciler(dir.path());
        let cancel = CancellationToken::new();
        let topology = ResolvedTopology {
            ethernet: vec![ethernet(0, "eth0")],
            vlans: vec![],
        };

        let first = reconciler.setup(&cancel, &topology).await.unwrap();
        assert_eq!(first.count(ChangeType::Create), 1);

        let second = reconciler.setup(&cancel, &topology).await.unwrap();
        assert!(!second.changed());
        assert_eq!(files(dir.path()), vec!["1-eth0-google-guest-agent.network"]);
    }

    #[tokio::test]
    async fn test_stale_owned_file_is_updated() {
        let dir = TempDir::new().unwrap();
        let reconciler = reconciler(dir.path());
        std::fs::write(
            dir.path().join("1-eth0-google-guest-agent.network"),
            "[Match]\nName=eth0\n\n[GuestAgent]\nManaged=true\n",
        )
        .unwrap();

        let topology = ResolvedTopology {
            ethernet: vec![ethernet(0, "eth0")],
            vlans: vec![],
        };
        let report = reconciler
            .setup(&CancellationToken::new(), &topology)
            .await
            .unwrap();

        assert_eq!(report.count(ChangeType::Update), 1);
        let content =
            std::fs::read_to_string(dir.path().join("1-eth0-google-guest-agent.network")).unwrap();
        assert!(content.contains("DHCP=ipv4"));
    }

    #[tokio::test]
    async fn test_foreign_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let reconciler = reconciler(dir.path());
        let target = dir.path().join("1-eth0-google-guest-agent.network");
        std::fs::write(&target, "[Match]\nName=eth0\n").unwrap();

        let topology = ResolvedTopology {
            ethernet: vec![ethernet(0, "eth0")],
            vlans: vec![],
        };
        let report = reconciler
            .setup(&CancellationToken::new(), &topology)
            .await
            .unwrap();

        assert!(!report.changed());
        assert_eq!(report.skipped, vec![target.clone()]);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "[Match]\nName=eth0\n");
    }

    #[tokio::test]
    async fn test_interrupted_write_leftovers_are_removed() {
        let dir = TempDir::new().unwrap();
        let reconciler = reconciler(dir.path());
        let leftover = dir.path().join(".1-eth1-google-guest-agent.network.tmp");
        let truncated = dir.path().join(".1-eth2-google-guest-agent.network.tmp");
        let foreign = dir.path().join(".custom.network.tmp");
        std::fs::write(
            &leftover,
            "[Match]\nName=eth1\n\n[GuestAgent]\nManaged=true\n",
        )
        .unwrap();
        std::fs::write(&truncated, "[Match]\nNa").unwrap();
        std::fs::write(&foreign, "[Match]\nName=eth9\n").unwrap();

        assert!(reconciler.owned_files().await.unwrap().is_empty());

        let topology = ResolvedTopology {
            ethernet: vec![ethernet(0, "eth0")],
            vlans: vec![],
        };
        let report = reconciler
            .setup(&CancellationToken::new(), &topology)
            .await
            .unwrap();

        assert_eq!(report.changes.len(), 1);
        assert_eq!(
            files(dir.path()),
            vec![".custom.network.tmp", "1-eth0-google-guest-agent.network"]
        );

        std::fs::write(&leftover, "[Match]\nName=eth1\n").unwrap();
        reconciler.rollback(&CancellationToken::new()).await.unwrap();
        assert_eq!(files(dir.path()), vec![".custom.network.tmp"]);
    }

    #[test]
    fn test_temp_names() {
        assert_eq!(
            temp_name("1-eth0-google-guest-agent.network"),
            ".1-eth0-google-guest-agent.network.tmp"
        );
        assert_eq!(
            temp_target(".1-eth0-google-guest-agent.network.tmp"),
            Some("1-eth0-google-guest-agent.network")
        );
        assert_eq!(temp_target("1-eth0-google-guest-agent.network"), None);
        assert_eq!(temp_target("..tmp"), None);
    }

    #[tokio::test]
    async fn test_files_get_requested_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keyfile");

        write_atomic(&path, "secret", 0o600).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(files(dir.path()), vec!["keyfile"]);
    }

    #[tokio::test]
    async fn test_failed_unit_is_undone() {
        let dir = TempDir::new().unwrap();
        let reconciler = reconciler(dir.path());
        let renderer = NetworkdRenderer::new(1);

        let mut artifacts = renderer.render_vlan(&VlanDevice::new("eth0", 22)).unwrap();
        let netdev = dir.path().join(&artifacts[0].file_name);
        let previous = "[NetDev]\nName=gcp.eth0.22\n\n[GuestAgent]\nManaged=true\n";
        std::fs::write(&netdev, previous).unwrap();
        // The second file cannot be written: its directory does not exist
        artifacts[1].file_name = format!("missing/{}", artifacts[1].file_name);

        let unit = ArtifactUnit {
            device: "gcp.eth0.22".to_string(),
            artifacts,
        };
        let mut report = ReconcileReport::default();
        let err = reconciler
            .write_unit(dir.path(), &unit, &mut report)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NetworkError::System(SystemError::ConfigWrite { .. })
        ));
        assert!(!report.changed());
        assert_eq!(std::fs::read_to_string(&netdev).unwrap(), previous);
        assert_eq!(files(dir.path()), vec![unit.artifacts[0].file_name.clone()]);
    }

    #[tokio::test]
    async fn test_cancelled_pass_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let reconciler = reconciler(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let topology = ResolvedTopology {
            ethernet: vec![ethernet(0, "eth0")],
            vlans: vec![],
        };
        let err = reconciler.setup(&cancel, &topology).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_backend_without_directory_is_a_no_op() {
        let reconciler = Reconciler::new(Arc::new(FakeBackend::new(
            BackendKind::Dhclient,
            4,
            Probe::Managing,
        )));
        let topology = ResolvedTopology {
            ethernet: vec![ethernet(0, "eth0")],
            vlans: vec![],
        };

        let report = reconciler
            .setup(&CancellationToken::new(), &topology)
            .await
            .unwrap();
        assert!(!report.changed());
        assert!(reconciler.owned_files().await.unwrap().is_empty());
    }
}
