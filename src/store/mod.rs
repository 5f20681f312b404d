// Persistence seam for the engine
//
// Every engine operation runs on one `WorkflowTx`. The traits are split by
// collaborator so that assignment resolution can be exercised against a
// mocked directory.

pub mod query;
pub mod sqlite;

pub use query::StageQuery;
pub use sqlite::{SqliteStore, SqliteTx};

use async_trait::async_trait;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::definitions::WorkflowDefinition;
use crate::error::Result;
use crate::model::{
    Department, DepartmentId, Employee, EmployeeId, InstanceStageId, NewInstanceStage,
    NewWorkflowRequest, Position, PositionId, RequestId, WorkflowId, WorkflowInstanceStage,
    WorkflowRequest,
};

/// Read-only access to workflow templates.
#[async_trait]
pub trait DefinitionSource: Send {
    /// The workflow with its stages ordered ascending by step.
    async fn workflow(&mut self, id: WorkflowId) -> Result<Option<WorkflowDefinition>>;
}

/// Read-only access to the organisational directory.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait EmployeeDirectory: Send {
    async fn find_employee(&mut self, id: EmployeeId) -> Result<Option<Employee>>;

    async fn find_position(&mut self, id: PositionId) -> Result<Option<Position>>;

    async fn find_department(&mut self, id: DepartmentId) -> Result<Option<Department>>;

    /// Employees holding `position`, lowest employee id first.
    async fn occupants_of(&mut self, position: PositionId) -> Result<Vec<Employee>>;
}

/// Execution-state rows: requests and their stage instances.
#[async_trait]
pub trait InstanceRepository: Send {
    async fn insert_request(&mut self, request: NewWorkflowRequest) -> Result<WorkflowRequest>;

    async fn find_request(&mut self, id: RequestId) -> Result<Option<WorkflowRequest>>;

    /// Takes the write lock for the request row. `false` if it does not exist.
    async fn lock_request(&mut self, id: RequestId) -> Result<bool>;

    async fn update_request(&mut self, request: &WorkflowRequest) -> Result<()>;

    async fn insert_stage(&mut self, stage: NewInstanceStage) -> Result<WorkflowInstanceStage>;

    async fn find_stage(&mut self, id: InstanceStageId) -> Result<Option<WorkflowInstanceStage>>;

    /// Takes the write lock for the stage row. `false` if it does not exist.
    async fn lock_stage(&mut self, id: InstanceStageId) -> Result<bool>;

    async fn update_stage(&mut self, stage: &WorkflowInstanceStage) -> Result<()>;

    /// Stage rows matching `query`, ascending by step.
    async fn stages(&mut self, query: &StageQuery) -> Result<Vec<WorkflowInstanceStage>>;
}

/// One atomic unit of engine work.
#[async_trait]
pub trait WorkflowTx: DefinitionSource + EmployeeDirectory + InstanceRepository {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    type Tx: WorkflowTx;

    async fn begin(&self) -> Result<Self::Tx>;
}

/// Commits on success, rolls back on failure. The operation's own error is
/// always the one returned.
pub async fn settle<T, R>(tx: T, outcome: Result<R>) -> Result<R>
where
    T: WorkflowTx,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(
                    error = %rollback_err,
                    cause = err.kind(),
                    "Transaction rollback failed"
                );
            }
            Err(err)
        }
    }
}
