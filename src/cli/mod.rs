use clap::{Parser, Subcommand};
use std::path::PathBuf;

use approval_flow::model::{EmployeeId, FieldValue, InstanceStageId, RequestId, StageAction, WorkflowId};

pub mod commands;

#[derive(Parser)]
#[command(name = "approval-flow")]
#[command(about = "Multi-stage approval workflow engine")]
#[command(long_about = "approval-flow runs submitted requests through ordered approval stages, \
                       opening sub-stages, resolving assignees from the organisation chart and \
                       recording every decision. Start with 'approval-flow import catalog.toml'.")]
pub struct Cli {
    /// Configuration file (defaults to ./approval-flow.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, overriding the configured one
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply database migrations
    Migrate,
    /// Load departments, positions, employees and workflows from a TOML catalog
    Import {
        /// Catalog file
        path: PathBuf,
    },
    /// Submit a new request against a workflow
    Start {
        #[arg(long)]
        workflow: WorkflowId,
        /// Employee the request is for
        #[arg(long)]
        requestor: EmployeeId,
        /// Employee submitting the request (defaults to the requestor)
        #[arg(long)]
        acting_user: Option<EmployeeId>,
        /// Submitted field, repeatable
        #[arg(long = "field", value_parser = parse_field, help = "Form field as key=value")]
        fields: Vec<(String, FieldValue)>,
    },
    /// Approve or reject a pending stage
    Complete {
        #[arg(long)]
        stage: InstanceStageId,
        #[arg(long, help = "approve or reject")]
        action: StageAction,
        #[arg(long)]
        acting_user: EmployeeId,
        #[arg(long = "field", value_parser = parse_field, help = "Stage field as key=value")]
        fields: Vec<(String, FieldValue)>,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Show the stage a request is waiting on
    Next {
        #[arg(long)]
        request: RequestId,
    },
    /// Show every stage row of a request, superseded rows included
    History {
        #[arg(long)]
        request: RequestId,
    },
}

pub fn parse_field(raw: &str) -> Result<(String, FieldValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("field name missing in `{raw}`"));
    }
    Ok((key.to_string(), FieldValue::infer(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_parse_with_inferred_types() {
        assert_eq!(
            parse_field("amount=250").unwrap(),
            ("amount".to_string(), FieldValue::Integer(250))
        );
        assert_eq!(
            parse_field("note=a=b").unwrap(),
            ("note".to_string(), FieldValue::from("a=b"))
        );
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=5").is_err());
    }
}
