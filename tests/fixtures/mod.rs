//! Shared fixtures: an in-memory store seeded with a small org chart and
//! one workflow per engine path.
#![allow(dead_code)]

use approval_flow::model::{
    ActingUser, EmployeeId, FieldResponses, FieldValue, InstanceStageId, RequestId, StageAction,
    StepKey, WorkflowId, WorkflowInstanceStage, WorkflowRequest,
};
use approval_flow::store::WorkflowStore;
use approval_flow::{
    load_acting_user, Catalog, CompleteStage, EngineConfig, Result, SqliteStore, StartRequest,
    TransitionOutcome, WorkflowEngine,
};

pub const LEAVE: WorkflowId = WorkflowId::new(1);
pub const BUDGET: WorkflowId = WorkflowId::new(2);
pub const VENDOR: WorkflowId = WorkflowId::new(3);
pub const EXPENSE: WorkflowId = WorkflowId::new(4);
pub const AUDIT: WorkflowId = WorkflowId::new(5);
pub const NOTICE: WorkflowId = WorkflowId::new(6);
pub const TRAVEL: WorkflowId = WorkflowId::new(7);

pub const CEO: EmployeeId = EmployeeId::new(1);
pub const DIRECTOR: EmployeeId = EmployeeId::new(2);
pub const MANAGER: EmployeeId = EmployeeId::new(3);
pub const STAFF: EmployeeId = EmployeeId::new(4);
pub const ACCOUNTANT: EmployeeId = EmployeeId::new(5);
pub const SECOND_ACCOUNTANT: EmployeeId = EmployeeId::new(9);
pub const LEGAL: EmployeeId = EmployeeId::new(6);

pub fn catalog() -> Catalog {
    Catalog::from_toml(include_str!("org_catalog.toml")).expect("fixture catalog parses")
}

pub async fn seed(store: &SqliteStore) {
    catalog()
        .import_into(store)
        .await
        .expect("fixture catalog imports");
}

pub async fn engine() -> WorkflowEngine<SqliteStore> {
    engine_with(EngineConfig::default()).await
}

pub async fn engine_with(settings: EngineConfig) -> WorkflowEngine<SqliteStore> {
    let store = SqliteStore::in_memory().await.expect("in-memory store");
    seed(&store).await;
    WorkflowEngine::new(store, settings)
}

pub async fn acting_user(engine: &WorkflowEngine<SqliteStore>, id: EmployeeId) -> ActingUser {
    let mut tx = engine.store().begin().await.unwrap();
    load_acting_user(&mut tx, id).await.unwrap()
}

pub fn form(pairs: &[(&str, FieldValue)]) -> FieldResponses {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

pub async fn try_start(
    engine: &WorkflowEngine<SqliteStore>,
    workflow_id: WorkflowId,
    requestor: EmployeeId,
    fields: FieldResponses,
) -> Result<WorkflowRequest> {
    let acting_user = acting_user(engine, requestor).await;
    engine
        .start_request(StartRequest {
            workflow_id,
            requestor_id: requestor,
            acted_by_user_id: requestor,
            form_responses: fields,
            acting_user,
        })
        .await
}

pub async fn start(
    engine: &WorkflowEngine<SqliteStore>,
    workflow_id: WorkflowId,
    requestor: EmployeeId,
    fields: FieldResponses,
) -> WorkflowRequest {
    try_start(engine, workflow_id, requestor, fields)
        .await
        .expect("request starts")
}

pub async fn complete(
    engine: &WorkflowEngine<SqliteStore>,
    stage_id: InstanceStageId,
    action: StageAction,
    actor: EmployeeId,
    fields: FieldResponses,
) -> Result<TransitionOutcome> {
    let acting_user = acting_user(engine, actor).await;
    engine
        .complete_stage(CompleteStage {
            stage_id,
            action,
            acted_by_user_id: actor,
            field_responses: fields,
            comment: None,
            acting_user,
        })
        .await
}

pub async fn approve(
    engine: &WorkflowEngine<SqliteStore>,
    stage_id: InstanceStageId,
    actor: EmployeeId,
) -> TransitionOutcome {
    complete(engine, stage_id, StageAction::Approve, actor, FieldResponses::new())
        .await
        .expect("approval succeeds")
}

pub async fn history(
    engine: &WorkflowEngine<SqliteStore>,
    request_id: RequestId,
) -> Vec<WorkflowInstanceStage> {
    engine.history(request_id).await.unwrap()
}

/// The live (not superseded) row at `step`.
pub fn live_at(stages: &[WorkflowInstanceStage], step: StepKey) -> &WorkflowInstanceStage {
    stages
        .iter()
        .find(|stage| stage.step == step && !stage.is_resubmission)
        .unwrap_or_else(|| panic!("no live stage at step {step}"))
}

pub async fn row_count(engine: &WorkflowEngine<SqliteStore>, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(engine.store().pool())
        .await
        .unwrap()
}
