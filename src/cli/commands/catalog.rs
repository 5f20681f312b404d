use anyhow::{Context, Result};
use std::path::PathBuf;

use approval_flow::{ApprovalFlowConfig, Catalog};

use super::{open_store, print_json, Command};

pub struct MigrateCommand;

impl Command for MigrateCommand {
    async fn execute(&self, config: &ApprovalFlowConfig) -> Result<()> {
        let store = open_store(config).await?;
        // auto_migrate may be off; an explicit migrate always runs.
        store.migrate().await?;
        store.shutdown().await;
        println!("Database at {} is up to date", config.database.url);
        Ok(())
    }
}

pub struct ImportCommand {
    pub path: PathBuf,
}

impl ImportCommand {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Command for ImportCommand {
    async fn execute(&self, config: &ApprovalFlowConfig) -> Result<()> {
        let catalog = Catalog::load(&self.path)
            .await
            .with_context(|| format!("failed to read catalog `{}`", self.path.display()))?;
        let store = open_store(config).await?;
        let summary = catalog.import_into(&store).await?;
        store.shutdown().await;
        print_json(&summary)
    }
}
