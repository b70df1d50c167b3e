//! Detect command

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::commands::read_topology;
use crate::context::AppContext;

pub struct DetectCommand {
    context: Arc<AppContext>,
}

impl DetectCommand {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, interface: Option<&str>, topology: Option<&Path>) -> Result<()> {
        let iface = self.target_interface(interface, topology).await?;

        match self.detect(&iface).await? {
            Some(backend) => println!("{}: {}", iface, backend),
            None => println!("{}: no supported network manager", iface),
        }
        Ok(())
    }

    /// Name of the backend managing `iface`
    pub async fn detect(&self, iface: &str) -> Result<Option<&'static str>> {
        let backend = self
            .context
            .service
            .detect(&self.context.cancel, iface)
            .await
            .with_context(|| format!("Failed to detect the network manager of {}", iface))?;

        Ok(backend.map(|backend| backend.name()))
    }

    /// The explicit interface, or the primary NIC of the snapshot
    pub async fn target_interface(
        &self,
        interface: Option<&str>,
        topology: Option<&Path>,
    ) -> Result<String> {
        if let Some(iface) = interface {
            return Ok(iface.to_string());
        }

        let Some(path) = topology else {
            bail!("Either --interface or --topology is required");
        };

        let desired = read_topology(path)?;
        self.context
            .service
            .primary_interface(&desired)
            .await
            .context("Failed to resolve the primary NIC")?
            .context("The primary NIC of the topology is not present on this system")
    }
}
