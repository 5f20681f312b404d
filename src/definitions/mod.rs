// Workflow definition access
//
// Definitions are owned by an external collaborator; the engine only reads
// them, through the same transaction as the writes they inform.

pub mod types;
pub mod validation;

pub use types::{FieldType, FormField, StageAssignment, StageDefinition, WorkflowDefinition};
pub use validation::{validate_definition, validate_fields};

use crate::error::{Result, WorkflowError};
use crate::model::WorkflowId;
use crate::store::DefinitionSource;

/// Loads a workflow with its stages in ascending step order.
///
/// A missing workflow and a workflow without stages are the same failure to
/// callers: there is nothing to execute.
pub async fn load_workflow<S>(source: &mut S, workflow_id: WorkflowId) -> Result<WorkflowDefinition>
where
    S: DefinitionSource + ?Sized,
{
    let mut workflow = source
        .workflow(workflow_id)
        .await?
        .ok_or(WorkflowError::WorkflowNotFound { workflow_id })?;

    if workflow.stages.is_empty() {
        return Err(WorkflowError::WorkflowNotFound { workflow_id });
    }

    workflow.stages.sort_by_key(|stage| stage.step);
    validate_definition(&workflow)?;

    tracing::debug!(
        workflow_id = %workflow.id,
        stages = workflow.stages.len(),
        "Loaded workflow definition"
    );
    Ok(workflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StepKey;

    fn purchase_workflow() -> WorkflowDefinition {
        WorkflowDefinition::new(10, "purchase")
            .with_stage(StageDefinition::main(1, "submit", 1))
            .with_stage(StageDefinition::sub(4, "finance", 2, 2))
            .with_stage(StageDefinition::main(2, "manager", 2))
            .with_stage(StageDefinition::sub(3, "legal", 2, 1))
            .with_stage(StageDefinition::main(5, "director", 3))
            .normalized()
    }

    #[test]
    fn sub_stages_are_listed_in_step_order() {
        let workflow = purchase_workflow();
        let names: Vec<&str> = workflow
            .sub_stages_of(2)
            .iter()
            .map(|stage| stage.name.as_str())
            .collect();
        assert_eq!(names, vec!["legal", "finance"]);
        assert!(workflow.sub_stages_of(3).is_empty());
    }

    #[test]
    fn next_main_stage_skips_sub_stages() {
        let workflow = purchase_workflow();
        let after_sub = workflow.next_main_stage_after(StepKey::sub(2, 2)).unwrap();
        assert_eq!(after_sub.name, "director");
        let after_main = workflow.next_main_stage_after(StepKey::main(2)).unwrap();
        assert_eq!(after_main.name, "director");
        assert!(workflow.next_main_stage_after(StepKey::main(3)).is_none());
    }

    #[test]
    fn normalization_derives_sub_stage_fields() {
        let workflow = purchase_workflow();
        let legal = workflow
            .stages
            .iter()
            .find(|stage| stage.name == "legal")
            .unwrap();
        assert!(legal.is_sub_stage);
        assert_eq!(legal.parent_step, Some(2));
        assert_eq!(legal.workflow_id, workflow.id);
        assert!(validate_definition(&workflow).is_ok());
    }
}
