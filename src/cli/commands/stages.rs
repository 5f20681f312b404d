use anyhow::Result;

use approval_flow::model::{EmployeeId, FieldResponses, FieldValue, InstanceStageId, StageAction, WorkflowId};
use approval_flow::store::WorkflowStore;
use approval_flow::{load_acting_user, ApprovalFlowConfig, CompleteStage, StartRequest};

use super::{open_engine, print_json, Command};

pub struct StartCommand {
    pub workflow_id: WorkflowId,
    pub requestor_id: EmployeeId,
    pub acting_user_id: Option<EmployeeId>,
    pub fields: Vec<(String, FieldValue)>,
}

impl Command for StartCommand {
    async fn execute(&self, config: &ApprovalFlowConfig) -> Result<()> {
        let engine = open_engine(config).await?;
        let acting_id = self.acting_user_id.unwrap_or(self.requestor_id);

        let mut tx = engine.store().begin().await?;
        let acting_user = load_acting_user(&mut tx, acting_id).await?;
        drop(tx);

        let request = engine
            .start_request(StartRequest {
                workflow_id: self.workflow_id,
                requestor_id: self.requestor_id,
                acted_by_user_id: acting_id,
                form_responses: collect(&self.fields),
                acting_user,
            })
            .await?;
        engine.metrics().log_stats();
        print_json(&request)
    }
}

pub struct CompleteCommand {
    pub stage_id: InstanceStageId,
    pub action: StageAction,
    pub acting_user_id: EmployeeId,
    pub fields: Vec<(String, FieldValue)>,
    pub comment: Option<String>,
}

impl Command for CompleteCommand {
    async fn execute(&self, config: &ApprovalFlowConfig) -> Result<()> {
        let engine = open_engine(config).await?;

        let mut tx = engine.store().begin().await?;
        let acting_user = load_acting_user(&mut tx, self.acting_user_id).await?;
        drop(tx);

        let outcome = engine
            .complete_stage(CompleteStage {
                stage_id: self.stage_id,
                action: self.action,
                acted_by_user_id: self.acting_user_id,
                field_responses: collect(&self.fields),
                comment: self.comment.clone(),
                acting_user,
            })
            .await?;
        engine.metrics().log_stats();
        print_json(&outcome)
    }
}

fn collect(fields: &[(String, FieldValue)]) -> FieldResponses {
    fields.iter().cloned().collect()
}
