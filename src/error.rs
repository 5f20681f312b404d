use thiserror::Error;

use crate::model::{InstanceStageId, RequestId, RequestStatus, StageStatus, WorkflowId};

/// Failures surfaced by the workflow engine. None are retried internally;
/// the surrounding transaction is rolled back and the error returned as-is.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow `{workflow_id}` not found or has no stages")]
    WorkflowNotFound { workflow_id: WorkflowId },

    #[error("stage `{stage_id}` not found")]
    StageNotFound { stage_id: InstanceStageId },

    #[error("workflow request `{request_id}` not found")]
    RequestNotFound { request_id: RequestId },

    #[error("stage `{stage_id}` is `{status}`; only pending stages can be completed")]
    InvalidState {
        stage_id: InstanceStageId,
        status: StageStatus,
    },

    #[error("workflow request `{request_id}` is already `{status}`")]
    RequestClosed {
        request_id: RequestId,
        status: RequestStatus,
    },

    #[error("no assignee could be resolved for stage `{stage}`: {reason}")]
    AssignmentUnresolved { stage: String, reason: String },

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("stored record is unreadable: {0}")]
    CorruptRecord(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::ValidationError(message.into())
    }

    pub fn unresolved(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        WorkflowError::AssignmentUnresolved {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag, used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::WorkflowNotFound { .. } => "workflow_not_found",
            WorkflowError::StageNotFound { .. } => "stage_not_found",
            WorkflowError::RequestNotFound { .. } => "request_not_found",
            WorkflowError::InvalidState { .. } => "invalid_state",
            WorkflowError::RequestClosed { .. } => "request_closed",
            WorkflowError::AssignmentUnresolved { .. } => "assignment_unresolved",
            WorkflowError::ValidationError(_) => "validation_error",
            WorkflowError::CorruptRecord(_) => "corrupt_record",
            WorkflowError::Storage(_) => "storage",
            WorkflowError::Migration(_) => "migration",
            WorkflowError::Serialization(_) => "serialization",
        }
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
