//! Rollback command

use std::sync::Arc;

use anyhow::{Context, Result};

use guest_network_apply::ReconcileReport;

use crate::context::AppContext;

pub struct RollbackCommand {
    context: Arc<AppContext>,
}

impl RollbackCommand {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub async fn execute(&self) -> Result<()> {
        let reports = self.run().await?;

        let removed: Vec<_> = reports
            .iter()
            .flat_map(|report| report.changes.iter())
            .collect();
        if removed.is_empty() {
            println!("Nothing to roll back");
        }
        for change in removed {
            println!("  - {} ({})", change.target, change.backend);
        }
        Ok(())
    }

    pub async fn run(&self) -> Result<Vec<ReconcileReport>> {
        self.context
            .service
            .rollback_all(&self.context.cancel)
            .await
            .context("Rollback failed")
    }
}
