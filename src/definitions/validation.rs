// Structural checks on workflow templates and schema checks on submitted fields

use chrono::NaiveDate;
use std::collections::HashSet;

use super::types::{FieldType, FormField, WorkflowDefinition};
use crate::error::{Result, WorkflowError};
use crate::model::{FieldResponses, FieldValue};

/// Rejects templates the engine cannot execute deterministically.
pub fn validate_definition(workflow: &WorkflowDefinition) -> Result<()> {
    let mut steps = HashSet::new();
    let mut main_steps = HashSet::new();

    for stage in &workflow.stages {
        if !steps.insert(stage.step) {
            return Err(WorkflowError::validation(format!(
                "workflow `{}` has more than one stage at step {}",
                workflow.id, stage.step
            )));
        }
        if stage.is_sub_stage != stage.step.is_sub() {
            return Err(WorkflowError::validation(format!(
                "stage `{}` step {} does not match its sub-stage flag",
                stage.name, stage.step
            )));
        }
        if stage.parent_step != stage.step.parent() {
            return Err(WorkflowError::validation(format!(
                "stage `{}` at step {} must reference parent step {:?}, found {:?}",
                stage.name,
                stage.step,
                stage.step.parent(),
                stage.parent_step
            )));
        }
        if !stage.is_sub_stage {
            main_steps.insert(stage.step.main);
        }
    }

    if main_steps.is_empty() {
        return Err(WorkflowError::validation(format!(
            "workflow `{}` has no main stages",
            workflow.id
        )));
    }

    if let Some(orphan) = workflow
        .stages
        .iter()
        .find(|stage| stage.is_sub_stage && !main_steps.contains(&stage.step.main))
    {
        return Err(WorkflowError::validation(format!(
            "sub-stage `{}` at step {} has no main stage {}",
            orphan.name, orphan.step, orphan.step.main
        )));
    }

    Ok(())
}

/// Checks a submission against a stage's field schema. Fields not named in
/// the schema are passed through untouched.
pub fn validate_fields(schema: &[FormField], responses: &FieldResponses) -> Result<()> {
    let mut problems = Vec::new();

    for field in schema {
        match responses.get(&field.id) {
            None => {
                if field.required {
                    problems.push(format!("`{}` is required", field.id));
                }
            }
            Some(value) if value.is_blank() => {
                if field.required {
                    problems.push(format!("`{}` must not be blank", field.id));
                }
            }
            Some(value) => {
                if !matches_type(field.field_type, value) {
                    problems.push(format!("`{}` must be a {:?} value", field.id, field.field_type));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::validation(problems.join("; ")))
    }
}

fn matches_type(field_type: FieldType, value: &FieldValue) -> bool {
    match field_type {
        FieldType::Text => true,
        FieldType::Number => matches!(value, FieldValue::Integer(_) | FieldValue::Number(_)),
        FieldType::Boolean => matches!(value, FieldValue::Bool(_)),
        FieldType::Employee => value.as_employee_id().is_some(),
        FieldType::Date => value
            .as_text()
            .is_some_and(|text| NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").is_ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::StageDefinition;

    fn travel_schema() -> Vec<FormField> {
        vec![
            FormField::new("destination", FieldType::Text).required(),
            FormField::new("amount", FieldType::Number).required(),
            FormField::new("departure", FieldType::Date),
            FormField::new("approver", FieldType::Employee),
        ]
    }

    #[test]
    fn accepts_complete_submission_with_extra_fields() {
        let mut responses = FieldResponses::new();
        responses.insert("destination".into(), "Porto".into());
        responses.insert("amount".into(), FieldValue::Number(320.5));
        responses.insert("departure".into(), "2026-11-02".into());
        responses.insert("approver".into(), FieldValue::Integer(4));
        responses.insert("notes".into(), "window seat".into());

        assert!(validate_fields(&travel_schema(), &responses).is_ok());
    }

    #[test]
    fn reports_every_problem_at_once() {
        let mut responses = FieldResponses::new();
        responses.insert("destination".into(), "   ".into());
        responses.insert("departure".into(), "next tuesday".into());

        let err = validate_fields(&travel_schema(), &responses).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("`destination` must not be blank"));
        assert!(message.contains("`amount` is required"));
        assert!(message.contains("`departure` must be a Date value"));
    }

    #[test]
    fn rejects_duplicate_steps_and_orphan_sub_stages() {
        let duplicate = WorkflowDefinition::new(1, "dup")
            .with_stage(StageDefinition::main(1, "submit", 1))
            .with_stage(StageDefinition::main(2, "again", 1))
            .normalized();
        assert!(validate_definition(&duplicate).is_err());

        let orphan = WorkflowDefinition::new(2, "orphan")
            .with_stage(StageDefinition::main(1, "submit", 1))
            .with_stage(StageDefinition::sub(2, "review", 2, 1))
            .normalized();
        let err = validate_definition(&orphan).unwrap_err();
        assert!(err.to_string().contains("has no main stage 2"));
    }

    #[test]
    fn rejects_mismatched_parent_step() {
        let mut workflow = WorkflowDefinition::new(3, "bad parent")
            .with_stage(StageDefinition::main(1, "submit", 1))
            .with_stage(StageDefinition::main(2, "review", 2))
            .with_stage(StageDefinition::sub(3, "legal", 2, 1))
            .normalized();
        workflow.stages[2].parent_step = Some(1);

        assert!(matches!(
            validate_definition(&workflow),
            Err(WorkflowError::ValidationError(_))
        ));
    }
}
