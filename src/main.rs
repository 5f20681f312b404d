use anyhow::Result;
use clap::Parser;

mod cli;

use approval_flow::init_telemetry;
use cli::commands::catalog::{ImportCommand, MigrateCommand};
use cli::commands::inspect::{HistoryCommand, NextCommand};
use cli::commands::stages::{CompleteCommand, StartCommand};
use cli::commands::{load_config, show_how_to_start, Command};
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return tokio::runtime::Runtime::new()?.block_on(async { show_how_to_start().await });
    };

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = cli.database {
        config.database.url = url;
    }
    init_telemetry(&config.observability)?;

    tokio::runtime::Runtime::new()?.block_on(async {
        match command {
            Commands::Migrate => MigrateCommand.execute(&config).await,
            Commands::Import { path } => ImportCommand::new(path).execute(&config).await,
            Commands::Start {
                workflow,
                requestor,
                acting_user,
                fields,
            } => {
                StartCommand {
                    workflow_id: workflow,
                    requestor_id: requestor,
                    acting_user_id: acting_user,
                    fields,
                }
                .execute(&config)
                .await
            }
            Commands::Complete {
                stage,
                action,
                acting_user,
                fields,
                comment,
            } => {
                CompleteCommand {
                    stage_id: stage,
                    action,
                    acting_user_id: acting_user,
                    fields,
                    comment,
                }
                .execute(&config)
                .await
            }
            Commands::Next { request } => NextCommand { request_id: request }.execute(&config).await,
            Commands::History { request } => {
                HistoryCommand { request_id: request }
                    .execute(&config)
                    .await
            }
        }
    })
}
