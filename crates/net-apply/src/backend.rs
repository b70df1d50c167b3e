//! Network-manager backend capability and shared probe steps

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio_util::sync::CancellationToken;

use guest_network_config::ConfigArtifact;
use guest_network_core::error::ProbeError;
use guest_network_core::lookup::{LookupError, PathLookup};
use guest_network_core::runner::CommandRunner;
use guest_network_core::{BackendRecord, EthernetInterface, Result, VlanDevice};

/// One OS network manager the engine can detect and configure
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    fn record(&self) -> &BackendRecord;

    fn name(&self) -> &'static str {
        self.record().name()
    }

    /// Directory holding this backend's artifacts, if it takes any
    fn config_dir(&self) -> Option<&Path>;

    /// Whether `iface` is currently configured under this backend. Absence
    /// of the backend is `Ok(false)`; errors are operational anomalies.
    async fn is_managing(&self, cancel: &CancellationToken, iface: &str) -> Result<bool>;

    fn render_ethernet(&self, iface: &EthernetInterface) -> Result<Vec<ConfigArtifact>>;

    fn render_vlan(&self, vlan: &VlanDevice) -> Result<Vec<ConfigArtifact>>;

    fn is_owned(&self, file_name: &str, content: &str) -> bool;

    /// Make the running manager pick up changed files for `names`
    async fn activate(&self, cancel: &CancellationToken, names: &[String]) -> Result<()>;
}

/// Resolve a control binary. Not being installed is an absence signal.
pub(crate) fn lookup_binary(lookup: &dyn PathLookup, binary: &str) -> Result<Option<PathBuf>> {
    match lookup.lookup(binary) {
        Ok(path) => Ok(Some(path)),
        Err(LookupError::NotFound) => {
            debug!("{} not found in PATH", binary);
            Ok(None)
        }
        Err(e) => Err(ProbeError::Lookup {
            binary: binary.to_string(),
            message: e.to_string(),
        }
        .into()),
    }
}

/// `systemctl is-active {unit}`; any non-zero exit means inactive
pub(crate) async fn service_is_active(
    runner: &dyn CommandRunner,
    cancel: &CancellationToken,
    unit: &str,
) -> Result<bool> {
    let output = runner.run(cancel, "systemctl", &["is-active", unit]).await?;
    if !output.success() {
        debug!("{} is not active: {}", unit, output.stdout.trim());
    }
    Ok(output.success())
}
