// Request creation and read access to execution state

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::assignment::{load_acting_user, resolve_assignee, AssignmentContext, Fallback};
use crate::config::EngineConfig;
use crate::definitions::{load_workflow, validate_fields};
use crate::error::{Result, WorkflowError};
use crate::model::{
    ActingUser, EmployeeId, FieldResponses, FormResponses, NewInstanceStage, NewWorkflowRequest,
    RequestId, RequestStatus, RequestorSnapshot, StageStatus, WorkflowId, WorkflowInstanceStage,
    WorkflowRequest,
};
use crate::store::{
    settle, EmployeeDirectory, InstanceRepository, StageQuery, WorkflowStore, WorkflowTx,
};

#[derive(Debug, Clone)]
pub struct StartRequest {
    pub workflow_id: WorkflowId,
    pub requestor_id: EmployeeId,
    pub acted_by_user_id: EmployeeId,
    pub form_responses: FieldResponses,
    pub acting_user: ActingUser,
}

/// Where a request currently waits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextStage {
    pub current_stage: Option<WorkflowInstanceStage>,
    pub is_complete: bool,
    pub requires_action: bool,
}

impl NextStage {
    fn waiting_on(stage: WorkflowInstanceStage) -> Self {
        Self {
            current_stage: Some(stage),
            is_complete: false,
            requires_action: true,
        }
    }

    fn complete() -> Self {
        Self {
            current_stage: None,
            is_complete: true,
            requires_action: false,
        }
    }
}

pub struct InstanceTracker<S> {
    store: Arc<S>,
    settings: EngineConfig,
}

impl<S: WorkflowStore> InstanceTracker<S> {
    pub fn new(store: Arc<S>, settings: EngineConfig) -> Self {
        Self { store, settings }
    }

    /// Creates the request, its submitted first stage and the first stage
    /// that needs someone to act, atomically.
    pub async fn start_request(&self, start: StartRequest) -> Result<WorkflowRequest> {
        let mut tx = self.store.begin().await?;
        let outcome = self.start_in(&mut tx, start).await;
        settle(tx, outcome).await
    }

    async fn start_in(&self, tx: &mut S::Tx, start: StartRequest) -> Result<WorkflowRequest> {
        let workflow = load_workflow(tx, start.workflow_id).await?;
        let mains = workflow.main_stages();
        let Some(&first) = mains.first() else {
            return Err(WorkflowError::WorkflowNotFound {
                workflow_id: workflow.id,
            });
        };

        validate_fields(&first.form_fields, &start.form_responses)?;
        let requestor = load_requestor(tx, start.requestor_id).await?;

        let now = Utc::now();
        let snapshot = RequestorSnapshot {
            employee_id: requestor.id,
            name: requestor.name.clone(),
            department: requestor.department_name(),
            position: requestor.position_name(),
            submitted_at: now,
        };
        let form_responses = FormResponses::from_submission(start.form_responses, snapshot);
        let mut request = tx
            .insert_request(NewWorkflowRequest {
                workflow_id: workflow.id,
                requestor_id: start.requestor_id,
                created_by: start.acted_by_user_id,
                form_responses,
            })
            .await?;

        let acting_id = start.acting_user.id;
        tx.insert_stage(
            NewInstanceStage::completed(
                request.id,
                first,
                StageStatus::Submitted,
                acting_id,
                start.acted_by_user_id,
                now,
            )
            .with_responses(request.form_responses.fields.clone()),
        )
        .await?;

        let mut next_index = 1;
        if self.self_approves(&start.acting_user) {
            if let Some(&skipped) = mains.get(1) {
                tx.insert_stage(
                    NewInstanceStage::completed(
                        request.id,
                        skipped,
                        StageStatus::Approved,
                        acting_id,
                        acting_id,
                        now,
                    )
                    .with_comment("auto-approved at submission"),
                )
                .await?;
                info!(
                    request_id = %request.id,
                    step = %skipped.step,
                    acting_user = %acting_id,
                    "Self-approval skip applied"
                );
                next_index = 2;
            }
        }

        match mains.get(next_index) {
            Some(&next) => {
                let fallback = Fallback::HierarchyParentOf(requestor.position_id());
                let context =
                    AssignmentContext::new(fallback).with_lookup(&request.form_responses.fields);
                let assignment = resolve_assignee(tx, next, &context).await?;
                let pending = tx
                    .insert_stage(NewInstanceStage::pending(
                        request.id,
                        next,
                        assignment.employee_id,
                    ))
                    .await?;
                info!(
                    request_id = %request.id,
                    workflow_id = %workflow.id,
                    stage_id = %pending.id,
                    step = %pending.step,
                    assignee = %assignment.employee_id,
                    "Workflow request started"
                );
            }
            None => {
                request.status = RequestStatus::Approved;
                tx.update_request(&request).await?;
                info!(
                    request_id = %request.id,
                    workflow_id = %workflow.id,
                    "Workflow request approved at submission, no further stages"
                );
            }
        }

        Ok(request)
    }

    fn self_approves(&self, acting_user: &ActingUser) -> bool {
        match self.settings.self_approval_hierarchy_level {
            Some(level) => acting_user.hierarchy_level() == Some(level),
            None => false,
        }
    }

    /// The earliest pending stage of a request, or completion.
    pub async fn next_stage(&self, request_id: RequestId) -> Result<NextStage> {
        let mut tx = self.store.begin().await?;
        let outcome = next_stage_in(&mut tx, request_id).await;
        settle(tx, outcome).await
    }

    pub async fn request(&self, request_id: RequestId) -> Result<WorkflowRequest> {
        let mut tx = self.store.begin().await?;
        let outcome = tx
            .find_request(request_id)
            .await
            .and_then(|found| found.ok_or(WorkflowError::RequestNotFound { request_id }));
        settle(tx, outcome).await
    }

    /// Every stage row of a request in step order, superseded rows included.
    pub async fn history(&self, request_id: RequestId) -> Result<Vec<WorkflowInstanceStage>> {
        let mut tx = self.store.begin().await?;
        let outcome = history_in(&mut tx, request_id).await;
        settle(tx, outcome).await
    }
}

async fn next_stage_in<T: WorkflowTx>(tx: &mut T, request_id: RequestId) -> Result<NextStage> {
    let request = tx
        .find_request(request_id)
        .await?
        .ok_or(WorkflowError::RequestNotFound { request_id })?;

    if request.status.is_terminal() {
        return Ok(NextStage::complete());
    }

    let pending = tx
        .stages(&StageQuery::for_request(request_id).with_status(StageStatus::Pending))
        .await?;
    Ok(pending
        .into_iter()
        .next()
        .map_or_else(NextStage::complete, NextStage::waiting_on))
}

async fn history_in<T: WorkflowTx>(
    tx: &mut T,
    request_id: RequestId,
) -> Result<Vec<WorkflowInstanceStage>> {
    if tx.find_request(request_id).await?.is_none() {
        return Err(WorkflowError::RequestNotFound { request_id });
    }
    tx.stages(&StageQuery::for_request(request_id).including_resubmitted())
        .await
}

async fn load_requestor<D>(directory: &mut D, requestor_id: EmployeeId) -> Result<ActingUser>
where
    D: EmployeeDirectory + ?Sized,
{
    load_acting_user(directory, requestor_id)
        .await
        .map_err(|err| match err {
            WorkflowError::ValidationError(_) => {
                WorkflowError::validation(format!("unknown requestor `{requestor_id}`"))
            }
            other => other,
        })
}
