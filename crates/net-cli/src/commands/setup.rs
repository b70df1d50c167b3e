//! Setup command

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use guest_network_apply::{SetupPlan, SetupReport};
use guest_network_core::ChangeType;

use crate::commands::read_topology;
use crate::context::AppContext;

pub struct SetupCommand {
    context: Arc<AppContext>,
}

impl SetupCommand {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub async fn execute(&self, topology: &Path, dry_run: bool) -> Result<()> {
        if dry_run {
            match self.plan(topology).await? {
                Some(plan) => print!("{}", format_plan(&plan)),
                None => println!("No supported network manager manages the primary NIC"),
            }
            return Ok(());
        }

        let report = self.run(topology).await?;
        print!("{}", format_report(&report));
        Ok(())
    }

    pub async fn run(&self, topology: &Path) -> Result<SetupReport> {
        let desired = read_topology(topology)?;
        self.context
            .service
            .setup(&self.context.cancel, &desired)
            .await
            .context("Network setup failed")
    }

    pub async fn plan(&self, topology: &Path) -> Result<Option<SetupPlan>> {
        let desired = read_topology(topology)?;
        self.context
            .service
            .plan(&self.context.cancel, &desired)
            .await
            .context("Failed to render network configuration")
    }
}

/// Rendered artifacts, one block per file
pub fn format_plan(plan: &SetupPlan) -> String {
    let dir = plan
        .config_dir
        .as_ref()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut out = format!("Backend: {} ({})\n", plan.backend, dir);
    for unit in &plan.units {
        for artifact in &unit.artifacts {
            out.push_str(&format!(
                "\n--- {} ({:o})\n{}",
                artifact.file_name, artifact.mode, artifact.content
            ));
        }
    }
    out
}

pub fn format_report(report: &SetupReport) -> String {
    let Some(backend) = &report.backend else {
        return "No supported network manager manages the primary NIC\n".to_string();
    };

    let mut out = format!("Backend: {}\n", backend);
    let changes = report.changes();
    if changes.is_empty() {
        out.push_str("Configuration up to date\n");
    }
    for change in changes {
        let marker = match change.change_type {
            ChangeType::Create => "+",
            ChangeType::Update => "~",
            ChangeType::Delete => "-",
        };
        out.push_str(&format!("  {} {} ({})\n", marker, change.target, change.backend));
    }

    if let Some(reconciled) = &report.reconcile {
        for path in &reconciled.skipped {
            out.push_str(&format!("  ! {} not managed by the guest agent, skipped\n", path.display()));
        }
    }
    if report.activated {
        out.push_str(&format!("Activated {}\n", backend));
    }
    out
}
