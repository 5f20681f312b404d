// Workflow templates: an ordered set of main stages, each optionally owning sub-stages

use serde::{Deserialize, Serialize};

use crate::model::{
    DepartmentId, FormId, OrganizationId, PositionId, StageDefinitionId, StepKey, WorkflowId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub organization_id: OrganizationId,
    pub form_id: FormId,
    pub name: String,
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub id: StageDefinitionId,
    #[serde(default = "unassigned_workflow")]
    pub workflow_id: WorkflowId,
    pub name: String,
    pub step: StepKey,
    #[serde(default)]
    pub parent_step: Option<i64>,
    #[serde(default)]
    pub is_sub_stage: bool,
    #[serde(default)]
    pub assignment: StageAssignment,
    #[serde(default)]
    pub form_fields: Vec<FormField>,
}

fn unassigned_workflow() -> WorkflowId {
    WorkflowId::new(0)
}

/// How the owner of a stage is chosen. All three are optional; see
/// `assignment::resolve_assignee` for precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAssignment {
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub position_id: Option<PositionId>,
    /// Form field whose submitted value is the assignee's employee id.
    #[serde(default)]
    pub lookup_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Boolean,
    Date,
    Employee,
}

impl FormField {
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            field_type,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl StageDefinition {
    pub fn main(id: i64, name: impl Into<String>, step: i64) -> Self {
        Self {
            id: StageDefinitionId::new(id),
            workflow_id: unassigned_workflow(),
            name: name.into(),
            step: StepKey::main(step),
            parent_step: None,
            is_sub_stage: false,
            assignment: StageAssignment::default(),
            form_fields: Vec::new(),
        }
    }

    pub fn sub(id: i64, name: impl Into<String>, parent: i64, ordinal: u32) -> Self {
        Self {
            step: StepKey::sub(parent, ordinal),
            parent_step: Some(parent),
            is_sub_stage: true,
            ..Self::main(id, name, parent)
        }
    }

    pub fn assigned_to_position(mut self, position: PositionId) -> Self {
        self.assignment.position_id = Some(position);
        self
    }

    pub fn assigned_to_department(mut self, department: DepartmentId) -> Self {
        self.assignment.department_id = Some(department);
        self
    }

    pub fn assigned_via_field(mut self, field: impl Into<String>) -> Self {
        self.assignment.lookup_field = Some(field.into());
        self
    }

    pub fn with_field(mut self, field: FormField) -> Self {
        self.form_fields.push(field);
        self
    }
}

impl WorkflowDefinition {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(id),
            organization_id: OrganizationId::new(1),
            form_id: FormId::new(id),
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: StageDefinition) -> Self {
        self.stages.push(stage);
        self
    }

    /// Fills in the fields that follow from the step key and the owning
    /// workflow, and orders stages by step. Catalog files only need to spell
    /// out `step`.
    pub fn normalized(mut self) -> Self {
        for stage in &mut self.stages {
            stage.workflow_id = self.id;
            stage.is_sub_stage = stage.step.is_sub();
            stage.parent_step = stage.step.parent();
        }
        self.stages.sort_by_key(|stage| stage.step);
        self
    }

    pub fn stage(&self, id: StageDefinitionId) -> Option<&StageDefinition> {
        self.stages.iter().find(|stage| stage.id == id)
    }

    /// Main stages in step order.
    pub fn main_stages(&self) -> Vec<&StageDefinition> {
        let mut mains: Vec<&StageDefinition> =
            self.stages.iter().filter(|stage| !stage.is_sub_stage).collect();
        mains.sort_by_key(|stage| stage.step);
        mains
    }

    /// Sub-stages owned by `main_step`, in step order.
    pub fn sub_stages_of(&self, main_step: i64) -> Vec<&StageDefinition> {
        let mut subs: Vec<&StageDefinition> = self
            .stages
            .iter()
            .filter(|stage| stage.is_sub_stage && stage.parent_step == Some(main_step))
            .collect();
        subs.sort_by_key(|stage| stage.step);
        subs
    }

    /// The main stage with the smallest step strictly greater than `step`.
    pub fn next_main_stage_after(&self, step: StepKey) -> Option<&StageDefinition> {
        self.stages
            .iter()
            .filter(|stage| !stage.is_sub_stage && stage.step > step)
            .min_by_key(|stage| stage.step)
    }
}
