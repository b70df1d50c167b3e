//! Status command

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use guest_network_apply::BackendStatus;

use crate::context::AppContext;

pub struct StatusCommand {
    context: Arc<AppContext>,
}

impl StatusCommand {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, format: &str) -> Result<()> {
        let statuses = self.collect().await?;
        match format {
            "text" => print!("{}", format_table(&statuses)),
            "json" => println!("{}", serde_json::to_string_pretty(&statuses)?),
            other => bail!("Unsupported output format: {}", other),
        }
        Ok(())
    }

    pub async fn collect(&self) -> Result<Vec<BackendStatus>> {
        self.context
            .service
            .status()
            .await
            .context("Failed to list engine-owned files")
    }
}

pub fn format_table(statuses: &[BackendStatus]) -> String {
    let mut out = format!(
        "{:<18} {:<9} {:<40} {}\n",
        "Backend", "Priority", "Directory", "Owned files"
    );
    out.push_str(&format!("{}\n", "-".repeat(80)));

    for status in statuses {
        let dir = status
            .config_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<18} {:<9} {:<40} {}\n",
            status.name,
            status.priority,
            dir,
            status.owned.len()
        ));
        for file in &status.owned {
            out.push_str(&format!("    {}\n", file));
        }
    }
    out
}
