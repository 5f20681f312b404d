// Domain model shared by the definition store, tracker and transition engine

pub mod directory;
pub mod form;
pub mod ids;
pub mod instance;
pub mod step;

pub use directory::{ActingUser, Department, DepartmentSummary, Employee, Position, PositionSummary};
pub use form::{ApproverEntry, FieldResponses, FieldValue, FormResponses, RequestorSnapshot};
pub use ids::{
    DepartmentId, EmployeeId, FormId, InstanceStageId, OrganizationId, PositionId, RequestId,
    StageDefinitionId, WorkflowId,
};
pub use instance::{
    NewInstanceStage, NewWorkflowRequest, RequestStatus, StageAction, StageStatus,
    WorkflowInstanceStage, WorkflowRequest,
};
pub use step::StepKey;
