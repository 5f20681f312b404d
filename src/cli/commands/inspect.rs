use anyhow::Result;

use approval_flow::model::RequestId;
use approval_flow::ApprovalFlowConfig;

use super::{open_engine, print_json, Command};

pub struct NextCommand {
    pub request_id: RequestId,
}

impl Command for NextCommand {
    async fn execute(&self, config: &ApprovalFlowConfig) -> Result<()> {
        let engine = open_engine(config).await?;
        print_json(&engine.next_stage(self.request_id).await?)
    }
}

pub struct HistoryCommand {
    pub request_id: RequestId,
}

impl Command for HistoryCommand {
    async fn execute(&self, config: &ApprovalFlowConfig) -> Result<()> {
        let engine = open_engine(config).await?;
        let request = engine.request(self.request_id).await?;
        let stages = engine.history(self.request_id).await?;
        print_json(&serde_json::json!({
            "request": request,
            "stages": stages,
        }))
    }
}
