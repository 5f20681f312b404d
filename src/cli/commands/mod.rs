use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use approval_flow::{ApprovalFlowConfig, SqliteStore, WorkflowEngine};

pub mod catalog;
pub mod inspect;
pub mod stages;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, config: &ApprovalFlowConfig) -> Result<()>;
}

pub async fn open_store(config: &ApprovalFlowConfig) -> Result<SqliteStore> {
    let store = SqliteStore::connect(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("failed to open database `{}`", config.database.url))?;
    if config.database.auto_migrate {
        store.migrate().await?;
    }
    Ok(store)
}

pub async fn open_engine(config: &ApprovalFlowConfig) -> Result<WorkflowEngine<SqliteStore>> {
    let store = open_store(config).await?;
    Ok(WorkflowEngine::new(store, config.engine.clone()))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn load_config(path: Option<&Path>) -> Result<ApprovalFlowConfig> {
    ApprovalFlowConfig::load_env_file()?;
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("configuration file `{}` does not exist", path.display());
            }
            ApprovalFlowConfig::load_from(path)
        }
        None => ApprovalFlowConfig::load(),
    }
}

pub async fn show_how_to_start() -> Result<()> {
    println!("approval-flow - multi-stage approval workflows");
    println!();
    println!("To get started:");
    println!("  approval-flow migrate                       # Create the database schema");
    println!("  approval-flow import catalog.toml           # Load the org chart and workflows");
    println!("  approval-flow start --workflow 1 --requestor 7 --field amount=250");
    println!("  approval-flow next --request 1              # See who has to act");
    println!("  approval-flow complete --stage 2 --action approve --acting-user 3");
    println!("  approval-flow history --request 1           # Full stage history");
    Ok(())
}
