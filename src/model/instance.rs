// Persistent execution state: the request root and its stage instances

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::form::{FieldResponses, FormResponses};
use super::ids::{EmployeeId, InstanceStageId, RequestId, StageDefinitionId, WorkflowId};
use super::step::StepKey;
use crate::definitions::StageDefinition;

/// Request lifecycle. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status `{other}`")),
        }
    }
}

/// Stage instance lifecycle: Created -> Pending -> {Approved, Rejected}.
/// `Submitted` marks the first stage, completed by the submission itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Created,
    Submitted,
    Pending,
    Approved,
    Rejected,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Created => "created",
            StageStatus::Submitted => "submitted",
            StageStatus::Pending => "pending",
            StageStatus::Approved => "approved",
            StageStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "created" => Ok(StageStatus::Created),
            "submitted" => Ok(StageStatus::Submitted),
            "pending" => Ok(StageStatus::Pending),
            "approved" => Ok(StageStatus::Approved),
            "rejected" => Ok(StageStatus::Rejected),
            other => Err(format!("unknown stage status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    Approve,
    Reject,
}

impl StageAction {
    pub fn resulting_status(&self) -> StageStatus {
        match self {
            StageAction::Approve => StageStatus::Approved,
            StageAction::Reject => StageStatus::Rejected,
        }
    }
}

impl fmt::Display for StageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageAction::Approve => f.write_str("approve"),
            StageAction::Reject => f.write_str("reject"),
        }
    }
}

impl FromStr for StageAction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(StageAction::Approve),
            "reject" | "rejected" => Ok(StageAction::Reject),
            other => Err(format!("action must be `approve` or `reject`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub id: RequestId,
    pub workflow_id: WorkflowId,
    pub requestor_id: EmployeeId,
    pub created_by: EmployeeId,
    pub status: RequestStatus,
    pub form_responses: FormResponses,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkflowRequest {
    pub workflow_id: WorkflowId,
    pub requestor_id: EmployeeId,
    pub created_by: EmployeeId,
    pub form_responses: FormResponses,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstanceStage {
    pub id: InstanceStageId,
    pub workflow_request_id: RequestId,
    pub stage_id: StageDefinitionId,
    pub stage_name: String,
    pub step: StepKey,
    pub parent_step: Option<i64>,
    pub is_sub_stage: bool,
    pub is_resubmission: bool,
    pub assigned_to_user_id: Option<EmployeeId>,
    pub acted_by_user_id: Option<EmployeeId>,
    pub status: StageStatus,
    pub field_responses: Option<FieldResponses>,
    pub comment: Option<String>,
    pub acted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowInstanceStage {
    pub fn is_pending(&self) -> bool {
        self.status == StageStatus::Pending
    }
}

/// Row to insert. Built from a stage definition (or from a rejected row when
/// replaying a sub-stage).
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstanceStage {
    pub workflow_request_id: RequestId,
    pub stage_id: StageDefinitionId,
    pub stage_name: String,
    pub step: StepKey,
    pub parent_step: Option<i64>,
    pub is_sub_stage: bool,
    pub assigned_to_user_id: Option<EmployeeId>,
    pub acted_by_user_id: Option<EmployeeId>,
    pub status: StageStatus,
    pub field_responses: Option<FieldResponses>,
    pub comment: Option<String>,
    pub acted_at: Option<DateTime<Utc>>,
}

impl NewInstanceStage {
    pub fn pending(request_id: RequestId, stage: &StageDefinition, assignee: EmployeeId) -> Self {
        Self {
            workflow_request_id: request_id,
            stage_id: stage.id,
            stage_name: stage.name.clone(),
            step: stage.step,
            parent_step: stage.parent_step,
            is_sub_stage: stage.is_sub_stage,
            assigned_to_user_id: Some(assignee),
            acted_by_user_id: None,
            status: StageStatus::Pending,
            field_responses: None,
            comment: None,
            acted_at: None,
        }
    }

    /// A stage that is complete the moment it is created: the submission
    /// itself, or a self-approval skip.
    pub fn completed(
        request_id: RequestId,
        stage: &StageDefinition,
        status: StageStatus,
        assignee: EmployeeId,
        acted_by: EmployeeId,
        acted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            assigned_to_user_id: Some(assignee),
            acted_by_user_id: Some(acted_by),
            status,
            acted_at: Some(acted_at),
            ..Self::pending(request_id, stage, assignee)
        }
    }

    pub fn with_responses(mut self, responses: FieldResponses) -> Self {
        self.field_responses = Some(responses);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Fresh Pending replay of an earlier row: same definition, step and
    /// assignee, no outcome.
    pub fn replay_of(stage: &WorkflowInstanceStage) -> Self {
        Self {
            workflow_request_id: stage.workflow_request_id,
            stage_id: stage.stage_id,
            stage_name: stage.stage_name.clone(),
            step: stage.step,
            parent_step: stage.parent_step,
            is_sub_stage: stage.is_sub_stage,
            assigned_to_user_id: stage.assigned_to_user_id,
            acted_by_user_id: None,
            status: StageStatus::Pending,
            field_responses: None,
            comment: None,
            acted_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_round_trip_through_storage_text() {
        for status in [
            StageStatus::Created,
            StageStatus::Submitted,
            StageStatus::Pending,
            StageStatus::Approved,
            StageStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<StageStatus>().unwrap(), status);
        }
        assert!("open".parse::<RequestStatus>().is_err());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
    }

    #[test]
    fn actions_parse_case_insensitively() {
        assert_eq!("Approve".parse::<StageAction>().unwrap(), StageAction::Approve);
        assert_eq!("REJECT".parse::<StageAction>().unwrap(), StageAction::Reject);
        assert!("escalate".parse::<StageAction>().is_err());
    }
}
