//! Backend implementations and the priority-ordered registry

mod dhclient;
mod netplan;
mod network_manager;
mod networkd;
mod wicked;

use std::sync::Arc;

use log::debug;

use guest_network_core::lookup::PathLookup;
use guest_network_core::runner::CommandRunner;
use guest_network_core::BackendKind;

use crate::backend::NetworkBackend;
use crate::settings::Settings;

pub use dhclient::Dhclient;
pub use netplan::Netplan;
pub use network_manager::NetworkManager;
pub use networkd::{parse_systemd_version, SystemdNetworkd, MIN_NETWORKCTL_VERSION};
pub use wicked::Wicked;

/// Static list of backends in the order probes run: ascending priority,
/// ties broken by declaration order
#[derive(Clone)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn NetworkBackend>>,
}

impl BackendRegistry {
    pub fn new(mut backends: Vec<Arc<dyn NetworkBackend>>) -> Self {
        backends.sort_by_key(|backend| {
            let record = backend.record();
            (record.priority, record.kind.declaration_index())
        });
        Self { backends }
    }

    /// Build every enabled backend from settings
    pub fn from_settings(
        settings: &Settings,
        runner: Arc<dyn CommandRunner>,
        lookup: Arc<dyn PathLookup>,
    ) -> Self {
        let mut backends: Vec<Arc<dyn NetworkBackend>> = Vec::new();

        for kind in BackendKind::ALL {
            let config = settings.backends.get(kind);
            if !config.enabled {
                debug!("Backend {} disabled by settings", kind);
                continue;
            }

            let priority = config.priority;
            let config_dir = config.config_dir.clone();
            let runner = runner.clone();
            let lookup = lookup.clone();

            let backend: Arc<dyn NetworkBackend> = match kind {
                BackendKind::Netplan => Arc::new(Netplan::new(priority, config_dir, runner, lookup)),
                BackendKind::SystemdNetworkd => {
                    Arc::new(SystemdNetworkd::new(priority, config_dir, runner, lookup))
                }
                BackendKind::Wicked => Arc::new(Wicked::new(priority, config_dir, runner, lookup)),
                BackendKind::NetworkManager => {
                    Arc::new(NetworkManager::new(priority, config_dir, runner, lookup))
                }
                BackendKind::Dhclient => Arc::new(Dhclient::new(priority, runner, lookup)),
            };
            backends.push(backend);
        }

        Self::new(backends)
    }

    pub fn backends(&self) -> &[Arc<dyn NetworkBackend>] {
        &self.backends
    }

    pub fn get(&self, kind: BackendKind) -> Option<&Arc<dyn NetworkBackend>> {
        self.backends
            .iter()
            .find(|backend| backend.record().kind == kind)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|backend| backend.name()).collect()
    }
}
