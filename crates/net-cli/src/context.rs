//! Shared state for CLI commands

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;
use tokio_util::sync::CancellationToken;

use guest_network_apply::{NetworkService, Settings};

pub struct AppContext {
    pub settings: Settings,
    pub service: NetworkService,
    /// Tripped on Ctrl-C; every command passes it down
    pub cancel: CancellationToken,
}

impl AppContext {
    pub fn new(settings: Settings, service: NetworkService) -> Self {
        Self {
            settings,
            service,
            cancel: CancellationToken::new(),
        }
    }

    /// Load settings and wire the production backends
    pub fn bootstrap(config: Option<&Path>) -> Result<Arc<Self>> {
        let settings = Settings::load(config).context("Failed to load settings")?;
        debug!("Settings: {:?}", settings);

        let service = NetworkService::from_settings(&settings);
        debug!("Backends in probe order: {:?}", service.registry().names());

        Ok(Arc::new(Self::new(settings, service)))
    }
}
