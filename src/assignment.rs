//! Stage assignee resolution.
//!
//! Precedence, first match wins:
//!
//! 1. the stage's lookup field, read from the first lookup map holding it
//! 2. the stage's fixed position
//! 3. the caller's fallback: the hierarchy parent of a position, or a fixed
//!    employee
//!
//! When several employees hold one position the lowest employee id wins. A
//! lookup field with no usable value, or a position nobody holds, falls
//! through to the next rule.

use serde::Serialize;
use tracing::debug;

use crate::definitions::StageDefinition;
use crate::error::{Result, WorkflowError};
use crate::model::{ActingUser, EmployeeId, FieldResponses, PositionId};
use crate::store::EmployeeDirectory;

/// What to use when neither the lookup field nor the fixed position yields
/// an assignee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// An occupant of the parent of this position.
    HierarchyParentOf(Option<PositionId>),
    /// This employee, unconditionally.
    Employee(EmployeeId),
}

#[derive(Debug, Clone)]
pub struct AssignmentContext<'a> {
    /// Searched in order for the stage's lookup field.
    pub lookups: Vec<&'a FieldResponses>,
    pub fallback: Fallback,
}

impl<'a> AssignmentContext<'a> {
    pub fn new(fallback: Fallback) -> Self {
        Self {
            lookups: Vec::new(),
            fallback,
        }
    }

    pub fn with_lookup(mut self, responses: &'a FieldResponses) -> Self {
        self.lookups.push(responses);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    LookupField,
    FixedPosition,
    HierarchyParent,
    ActingUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub employee_id: EmployeeId,
    pub source: AssignmentSource,
}

pub async fn resolve_assignee<D>(
    directory: &mut D,
    stage: &StageDefinition,
    context: &AssignmentContext<'_>,
) -> Result<Assignment>
where
    D: EmployeeDirectory + ?Sized,
{
    let mut tried = Vec::new();

    if let Some(field) = stage.assignment.lookup_field.as_deref() {
        let value = context.lookups.iter().find_map(|lookup| lookup.get(field));
        match value.and_then(|value| value.as_employee_id()) {
            Some(employee_id) => {
                return Ok(resolved(stage, employee_id, AssignmentSource::LookupField));
            }
            None => tried.push(format!("lookup field `{field}` has no employee id")),
        }
    }

    if let Some(position) = stage.assignment.position_id {
        match first_occupant(directory, position).await? {
            Some(employee_id) => {
                return Ok(resolved(stage, employee_id, AssignmentSource::FixedPosition));
            }
            None => tried.push(format!("position `{position}` has no occupant")),
        }
    }

    match context.fallback {
        Fallback::Employee(employee_id) => {
            Ok(resolved(stage, employee_id, AssignmentSource::ActingUser))
        }
        Fallback::HierarchyParentOf(Some(position_id)) => {
            let position = directory.find_position(position_id).await?.ok_or_else(|| {
                WorkflowError::unresolved(&stage.name, format!("position `{position_id}` does not exist"))
            })?;
            let Some(parent) = position.parent_id else {
                tried.push(format!("position `{}` has no parent", position.name));
                return Err(WorkflowError::unresolved(&stage.name, tried.join(", ")));
            };
            match first_occupant(directory, parent).await? {
                Some(employee_id) => {
                    Ok(resolved(stage, employee_id, AssignmentSource::HierarchyParent))
                }
                None => {
                    tried.push(format!("parent position `{parent}` has no occupant"));
                    Err(WorkflowError::unresolved(&stage.name, tried.join(", ")))
                }
            }
        }
        Fallback::HierarchyParentOf(None) => {
            tried.push("no position to climb from".to_string());
            Err(WorkflowError::unresolved(&stage.name, tried.join(", ")))
        }
    }
}

fn resolved(stage: &StageDefinition, employee_id: EmployeeId, source: AssignmentSource) -> Assignment {
    debug!(
        stage = %stage.name,
        step = %stage.step,
        assignee = %employee_id,
        ?source,
        "Resolved stage assignee"
    );
    Assignment {
        employee_id,
        source,
    }
}

async fn first_occupant<D>(directory: &mut D, position: PositionId) -> Result<Option<EmployeeId>>
where
    D: EmployeeDirectory + ?Sized,
{
    let occupants = directory.occupants_of(position).await?;
    Ok(occupants.iter().map(|employee| employee.id).min())
}

/// Builds the acting user snapshot from the directory.
///
/// The department comes from the employee record, else from their position.
pub async fn load_acting_user<D>(directory: &mut D, employee_id: EmployeeId) -> Result<ActingUser>
where
    D: EmployeeDirectory + ?Sized,
{
    let employee = directory
        .find_employee(employee_id)
        .await?
        .ok_or_else(|| WorkflowError::validation(format!("unknown employee `{employee_id}`")))?;

    let mut user = ActingUser::new(employee.id, &employee.name);
    let mut department_id = employee.department_id;

    if let Some(position_id) = employee.position_id {
        if let Some(position) = directory.find_position(position_id).await? {
            department_id = department_id.or(position.department_id);
            user = user.with_position(&position);
        }
    }
    if let Some(department_id) = department_id {
        if let Some(department) = directory.find_department(department_id).await? {
            user = user.with_department(&department);
        }
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Department, DepartmentId, Employee, FieldValue, Position};
    use crate::store::MockEmployeeDirectory;
    use mockall::predicate::eq;

    fn employee(id: i64, position: i64) -> Employee {
        Employee {
            id: EmployeeId::new(id),
            name: format!("employee-{id}"),
            position_id: Some(PositionId::new(position)),
            department_id: None,
        }
    }

    fn position(id: i64, parent: Option<i64>, level: i64) -> Position {
        Position {
            id: PositionId::new(id),
            name: format!("position-{id}"),
            department_id: Some(DepartmentId::new(1)),
            parent_id: parent.map(PositionId::new),
            hierarchy_level: level,
        }
    }

    fn review_stage() -> StageDefinition {
        StageDefinition::main(2, "review", 2)
    }

    #[tokio::test]
    async fn lookup_field_wins_over_position() {
        let mut directory = MockEmployeeDirectory::new();
        directory.expect_occupants_of().never();

        let stage = review_stage()
            .assigned_via_field("reviewer")
            .assigned_to_position(PositionId::new(5));
        let mut form = FieldResponses::new();
        form.insert("reviewer".into(), FieldValue::from("41"));
        let context = AssignmentContext::new(Fallback::HierarchyParentOf(None)).with_lookup(&form);

        let assignment = resolve_assignee(&mut directory, &stage, &context).await.unwrap();
        assert_eq!(assignment.employee_id, EmployeeId::new(41));
        assert_eq!(assignment.source, AssignmentSource::LookupField);
    }

    #[tokio::test]
    async fn earlier_lookup_maps_shadow_later_ones() {
        let mut directory = MockEmployeeDirectory::new();
        let stage = review_stage().assigned_via_field("reviewer");

        let mut stage_responses = FieldResponses::new();
        stage_responses.insert("reviewer".into(), FieldValue::Integer(8));
        let mut request_form = FieldResponses::new();
        request_form.insert("reviewer".into(), FieldValue::Integer(9));
        let context = AssignmentContext::new(Fallback::Employee(EmployeeId::new(1)))
            .with_lookup(&stage_responses)
            .with_lookup(&request_form);

        let assignment = resolve_assignee(&mut directory, &stage, &context).await.unwrap();
        assert_eq!(assignment.employee_id, EmployeeId::new(8));
    }

    #[tokio::test]
    async fn fixed_position_picks_lowest_employee_id() {
        let mut directory = MockEmployeeDirectory::new();
        directory
            .expect_occupants_of()
            .with(eq(PositionId::new(5)))
            .returning(|_| Ok(vec![employee(30, 5), employee(12, 5), employee(19, 5)]));

        let stage = review_stage().assigned_to_position(PositionId::new(5));
        let context = AssignmentContext::new(Fallback::HierarchyParentOf(None));

        let assignment = resolve_assignee(&mut directory, &stage, &context).await.unwrap();
        assert_eq!(assignment.employee_id, EmployeeId::new(12));
        assert_eq!(assignment.source, AssignmentSource::FixedPosition);
    }

    #[tokio::test]
    async fn empty_lookup_and_vacant_position_fall_through_to_hierarchy_parent() {
        let mut directory = MockEmployeeDirectory::new();
        directory
            .expect_occupants_of()
            .with(eq(PositionId::new(5)))
            .returning(|_| Ok(Vec::new()));
        directory
            .expect_find_position()
            .with(eq(PositionId::new(2)))
            .returning(|_| Ok(Some(position(2, Some(3), 1))));
        directory
            .expect_occupants_of()
            .with(eq(PositionId::new(3)))
            .returning(|_| Ok(vec![employee(77, 3)]));

        let stage = review_stage()
            .assigned_via_field("reviewer")
            .assigned_to_position(PositionId::new(5));
        let mut form = FieldResponses::new();
        form.insert("reviewer".into(), FieldValue::from(""));
        let context = AssignmentContext::new(Fallback::HierarchyParentOf(Some(PositionId::new(2))))
            .with_lookup(&form);

        let assignment = resolve_assignee(&mut directory, &stage, &context).await.unwrap();
        assert_eq!(assignment.employee_id, EmployeeId::new(77));
        assert_eq!(assignment.source, AssignmentSource::HierarchyParent);
    }

    #[tokio::test]
    async fn top_of_hierarchy_is_unresolved() {
        let mut directory = MockEmployeeDirectory::new();
        directory
            .expect_find_position()
            .returning(|_| Ok(Some(position(1, None, 5))));

        let context = AssignmentContext::new(Fallback::HierarchyParentOf(Some(PositionId::new(1))));
        let err = resolve_assignee(&mut directory, &review_stage(), &context)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::AssignmentUnresolved { .. }));
        assert!(err.to_string().contains("has no parent"));
    }

    #[tokio::test]
    async fn acting_user_fallback_always_resolves() {
        let mut directory = MockEmployeeDirectory::new();
        let context = AssignmentContext::new(Fallback::Employee(EmployeeId::new(4)));

        let assignment = resolve_assignee(&mut directory, &review_stage(), &context)
            .await
            .unwrap();
        assert_eq!(assignment.employee_id, EmployeeId::new(4));
        assert_eq!(assignment.source, AssignmentSource::ActingUser);
    }

    #[tokio::test]
    async fn acting_user_takes_department_from_position() {
        let mut directory = MockEmployeeDirectory::new();
        directory
            .expect_find_employee()
            .returning(|id| Ok(Some(employee(id.get(), 2))));
        directory
            .expect_find_position()
            .returning(|_| Ok(Some(position(2, Some(3), 3))));
        directory.expect_find_department().returning(|id| {
            Ok(Some(Department {
                id,
                name: "Finance".into(),
            }))
        });

        let user = load_acting_user(&mut directory, EmployeeId::new(5)).await.unwrap();
        assert_eq!(user.hierarchy_level(), Some(3));
        assert_eq!(user.department_name().as_deref(), Some("Finance"));
    }

    #[tokio::test]
    async fn unknown_acting_user_is_a_validation_error() {
        let mut directory = MockEmployeeDirectory::new();
        directory.expect_find_employee().returning(|_| Ok(None));

        let err = load_acting_user(&mut directory, EmployeeId::new(5))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::ValidationError(_)));
    }
}
