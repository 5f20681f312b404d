//! The stage state machine.
//!
//! `complete_stage` runs as one transaction: lock the stage, lock the
//! request, append the approver audit entry, record the outcome, then open
//! whatever comes next. Any failure rolls every write back.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::assignment::{resolve_assignee, AssignmentContext, Fallback};
use crate::definitions::{load_workflow, validate_fields, WorkflowDefinition};
use crate::error::{Result, WorkflowError};
use crate::model::{
    ActingUser, ApproverEntry, EmployeeId, FieldResponses, InstanceStageId, NewInstanceStage,
    RequestId, RequestStatus, StageAction, StageStatus, StepKey, WorkflowInstanceStage,
    WorkflowRequest,
};
use crate::store::{
    settle, EmployeeDirectory, InstanceRepository, StageQuery, WorkflowStore, WorkflowTx,
};

#[derive(Debug, Clone)]
pub struct CompleteStage {
    pub stage_id: InstanceStageId,
    pub action: StageAction,
    pub acted_by_user_id: EmployeeId,
    pub field_responses: FieldResponses,
    pub comment: Option<String>,
    pub acting_user: ActingUser,
}

/// What a successful `complete_stage` led to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// Sub-stage approved; siblings under the same main step are still open.
    AwaitingSiblings { pending: usize },
    /// Main stage approved and its sub-stages instantiated.
    SubStagesOpened { stage_ids: Vec<InstanceStageId> },
    NextMainStage {
        stage_id: InstanceStageId,
        step: StepKey,
    },
    /// Sub-stage rejected; the completed prefix of its branch was replayed.
    ResubmissionQueued { replayed: Vec<InstanceStageId> },
    RequestApproved,
    RequestRejected,
}

impl TransitionOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransitionOutcome::RequestApproved | TransitionOutcome::RequestRejected
        )
    }
}

pub struct StageTransitionEngine<S> {
    store: Arc<S>,
}

impl<S: WorkflowStore> StageTransitionEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn complete_stage(&self, command: CompleteStage) -> Result<TransitionOutcome> {
        let mut tx = self.store.begin().await?;
        let outcome = complete_in(&mut tx, command).await;
        settle(tx, outcome).await
    }
}

async fn complete_in<T>(tx: &mut T, command: CompleteStage) -> Result<TransitionOutcome>
where
    T: WorkflowTx,
{
    let stage_id = command.stage_id;
    if !tx.lock_stage(stage_id).await? {
        return Err(WorkflowError::StageNotFound { stage_id });
    }
    let mut stage = tx
        .find_stage(stage_id)
        .await?
        .ok_or(WorkflowError::StageNotFound { stage_id })?;

    let request_id = stage.workflow_request_id;
    if !tx.lock_request(request_id).await? {
        return Err(WorkflowError::RequestNotFound { request_id });
    }
    let mut request = tx
        .find_request(request_id)
        .await?
        .ok_or(WorkflowError::RequestNotFound { request_id })?;
    let workflow = load_workflow(tx, request.workflow_id).await?;

    let now = Utc::now();
    let acting_user = &command.acting_user;
    request.form_responses.approvers.push(ApproverEntry {
        employee_id: acting_user.id,
        name: acting_user.name.clone(),
        position: acting_user.position_name(),
        department: acting_user.department_name(),
        stage_id,
        action: command.action,
        acted_at: now,
    });
    tx.update_request(&request).await?;

    if !stage.is_pending() {
        return Err(WorkflowError::InvalidState {
            stage_id,
            status: stage.status,
        });
    }
    if request.status.is_terminal() {
        return Err(WorkflowError::RequestClosed {
            request_id,
            status: request.status,
        });
    }

    let definition = workflow.stage(stage.stage_id).ok_or_else(|| {
        WorkflowError::CorruptRecord(format!(
            "stage `{}` references unknown definition `{}`",
            stage.id, stage.stage_id
        ))
    })?;
    if command.action == StageAction::Approve {
        validate_fields(&definition.form_fields, &command.field_responses)?;
    }

    stage.status = command.action.resulting_status();
    stage.acted_by_user_id = Some(command.acted_by_user_id);
    stage.acted_at = Some(now);
    stage.field_responses = Some(command.field_responses);
    stage.comment = command.comment;
    tx.update_stage(&stage).await?;

    info!(
        request_id = %request_id,
        stage_id = %stage_id,
        step = %stage.step,
        action = %command.action,
        acted_by = %command.acted_by_user_id,
        "Stage completed"
    );

    let outcome = match (command.action, stage.is_sub_stage) {
        (StageAction::Reject, true) => replay_branch(tx, &stage).await?,
        (StageAction::Reject, false) => {
            request.status = RequestStatus::Rejected;
            tx.update_request(&request).await?;
            TransitionOutcome::RequestRejected
        }
        // The branch advances once no live sibling is still Pending, whatever
        // the approval order. Approving 2.2 and then 2.1 advances on 2.1, not
        // on the highest-step sibling.
        (StageAction::Approve, true) => {
            let open = tx
                .stages(
                    &StageQuery::for_request(request_id)
                        .children_of(stage.step.main)
                        .with_status(StageStatus::Pending),
                )
                .await?;
            if open.is_empty() {
                advance_past(tx, &workflow, &mut request, &stage, acting_user).await?
            } else {
                TransitionOutcome::AwaitingSiblings {
                    pending: open.len(),
                }
            }
        }
        (StageAction::Approve, false) => {
            open_sub_stages_or_advance(tx, &workflow, &mut request, &stage, acting_user).await?
        }
    };

    info!(
        request_id = %request_id,
        stage_id = %stage_id,
        outcome = ?outcome,
        "Stage transition applied"
    );
    Ok(outcome)
}

/// Supersedes every completed sibling at or before the rejected step and
/// queues a fresh pending copy of each.
async fn replay_branch<T>(tx: &mut T, rejected: &WorkflowInstanceStage) -> Result<TransitionOutcome>
where
    T: InstanceRepository + ?Sized,
{
    let siblings = tx
        .stages(
            &StageQuery::for_request(rejected.workflow_request_id)
                .children_of(rejected.step.main)
                .up_to(rejected.step),
        )
        .await?;
    let mut completed: Vec<WorkflowInstanceStage> = siblings
        .into_iter()
        .filter(|sibling| !sibling.is_pending())
        .collect();

    // Supersede first: the live-step index allows one active row per step.
    for original in &mut completed {
        original.is_resubmission = true;
        tx.update_stage(original).await?;
    }

    let mut replayed = Vec::with_capacity(completed.len());
    for original in &completed {
        let replay = tx.insert_stage(NewInstanceStage::replay_of(original)).await?;
        replayed.push(replay.id);
    }

    info!(
        request_id = %rejected.workflow_request_id,
        step = %rejected.step,
        replayed = replayed.len(),
        "Sub-stage branch queued for resubmission"
    );
    Ok(TransitionOutcome::ResubmissionQueued { replayed })
}

async fn open_sub_stages_or_advance<T>(
    tx: &mut T,
    workflow: &WorkflowDefinition,
    request: &mut WorkflowRequest,
    stage: &WorkflowInstanceStage,
    acting_user: &ActingUser,
) -> Result<TransitionOutcome>
where
    T: EmployeeDirectory + InstanceRepository + ?Sized,
{
    let sub_stages = workflow.sub_stages_of(stage.step.main);
    if sub_stages.is_empty() {
        return advance_past(tx, workflow, request, stage, acting_user).await;
    }

    let context = lookup_context(stage, request, Fallback::Employee(acting_user.id));
    let mut stage_ids = Vec::with_capacity(sub_stages.len());
    for sub_stage in sub_stages {
        let assignment = resolve_assignee(tx, sub_stage, &context).await?;
        let opened = tx
            .insert_stage(NewInstanceStage::pending(
                request.id,
                sub_stage,
                assignment.employee_id,
            ))
            .await?;
        stage_ids.push(opened.id);
    }
    Ok(TransitionOutcome::SubStagesOpened { stage_ids })
}

/// Opens the next main stage or, when there is none, approves the request.
async fn advance_past<T>(
    tx: &mut T,
    workflow: &WorkflowDefinition,
    request: &mut WorkflowRequest,
    stage: &WorkflowInstanceStage,
    acting_user: &ActingUser,
) -> Result<TransitionOutcome>
where
    T: EmployeeDirectory + InstanceRepository + ?Sized,
{
    let context = lookup_context(
        stage,
        request,
        Fallback::HierarchyParentOf(acting_user.position_id()),
    );
    let next = create_next_main_stage(tx, workflow, request.id, stage.step, &context).await?;

    match next {
        Some(opened) => Ok(TransitionOutcome::NextMainStage {
            stage_id: opened.id,
            step: opened.step,
        }),
        None => {
            request.status = RequestStatus::Approved;
            tx.update_request(request).await?;
            info!(request_id = %request.id, "Workflow request approved");
            Ok(TransitionOutcome::RequestApproved)
        }
    }
}

/// Creates the pending instance of the first main stage after
/// `current_step`. `None` means the workflow has no further main stage.
pub async fn create_next_main_stage<T>(
    tx: &mut T,
    workflow: &WorkflowDefinition,
    request_id: RequestId,
    current_step: StepKey,
    context: &AssignmentContext<'_>,
) -> Result<Option<WorkflowInstanceStage>>
where
    T: EmployeeDirectory + InstanceRepository + ?Sized,
{
    let Some(next) = workflow.next_main_stage_after(current_step) else {
        return Ok(None);
    };

    let assignment = resolve_assignee(tx, next, context).await?;
    let opened = tx
        .insert_stage(NewInstanceStage::pending(
            request_id,
            next,
            assignment.employee_id,
        ))
        .await?;

    info!(
        request_id = %request_id,
        stage_id = %opened.id,
        step = %opened.step,
        assignee = %assignment.employee_id,
        "Opened next main stage"
    );
    Ok(Some(opened))
}

/// Lookup fields resolve from the stage's own responses first, then from the
/// request form.
fn lookup_context<'a>(
    stage: &'a WorkflowInstanceStage,
    request: &'a WorkflowRequest,
    fallback: Fallback,
) -> AssignmentContext<'a> {
    let mut context = AssignmentContext::new(fallback);
    if let Some(responses) = stage.field_responses.as_ref() {
        context = context.with_lookup(responses);
    }
    context.with_lookup(&request.form_responses.fields)
}
