//! CLI commands

use std::path::Path;

use anyhow::{Context, Result};

use guest_network_core::DesiredTopology;

pub mod detect;
pub mod rollback;
pub mod setup;
pub mod status;

pub use detect::DetectCommand;
pub use rollback::RollbackCommand;
pub use setup::SetupCommand;
pub use status::StatusCommand;

/// Read a metadata snapshot (`{"ethernetInterfaces": [...], "vlanInterfaces": {...}}`)
pub fn read_topology(path: &Path) -> Result<DesiredTopology> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read topology file: {}", path.display()))?;

    DesiredTopology::from_json(&content)
        .with_context(|| format!("Failed to parse topology file: {}", path.display()))
}
