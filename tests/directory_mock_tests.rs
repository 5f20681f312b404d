// Embedding callers can drive assignment against a mocked directory

use approval_flow::assignment::AssignmentSource;
use approval_flow::model::{
    Department, DepartmentId, Employee, EmployeeId, Position, PositionId, StepKey,
};
use approval_flow::store::MockEmployeeDirectory;
use approval_flow::{
    load_acting_user, resolve_assignee, AssignmentContext, Fallback, StageDefinition, WorkflowError,
};
use mockall::predicate::eq;

fn clerk() -> Employee {
    Employee {
        id: EmployeeId::new(21),
        name: "Ines".into(),
        position_id: Some(PositionId::new(4)),
        department_id: None,
    }
}

fn clerk_position() -> Position {
    Position {
        id: PositionId::new(4),
        name: "Clerk".into(),
        department_id: Some(DepartmentId::new(2)),
        parent_id: Some(PositionId::new(3)),
        hierarchy_level: 1,
    }
}

#[tokio::test]
async fn acting_user_takes_department_from_position() {
    let mut directory = MockEmployeeDirectory::new();
    directory
        .expect_find_employee()
        .with(eq(EmployeeId::new(21)))
        .returning(|_| Ok(Some(clerk())));
    directory
        .expect_find_position()
        .with(eq(PositionId::new(4)))
        .returning(|_| Ok(Some(clerk_position())));
    directory
        .expect_find_department()
        .with(eq(DepartmentId::new(2)))
        .returning(|id| {
            Ok(Some(Department {
                id,
                name: "Finance".into(),
            }))
        });

    let user = load_acting_user(&mut directory, EmployeeId::new(21)).await.unwrap();

    assert_eq!(user.name, "Ines");
    assert_eq!(user.position_id(), Some(PositionId::new(4)));
    assert_eq!(user.department.map(|d| d.name).as_deref(), Some("Finance"));
}

#[tokio::test]
async fn unknown_acting_user_is_a_validation_error() {
    let mut directory = MockEmployeeDirectory::new();
    directory.expect_find_employee().returning(|_| Ok(None));
    directory.expect_find_position().never();

    let err = load_acting_user(&mut directory, EmployeeId::new(404)).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ValidationError(_)));
}

#[tokio::test]
async fn hierarchy_fallback_climbs_one_level() {
    let mut directory = MockEmployeeDirectory::new();
    directory
        .expect_find_position()
        .with(eq(PositionId::new(4)))
        .returning(|_| Ok(Some(clerk_position())));
    directory
        .expect_occupants_of()
        .with(eq(PositionId::new(3)))
        .returning(|_| {
            Ok(vec![Employee {
                id: EmployeeId::new(8),
                name: "Ravi".into(),
                position_id: Some(PositionId::new(3)),
                department_id: None,
            }])
        });

    let stage = StageDefinition::main(5, "Supervisor review", 2);
    assert_eq!(stage.step, StepKey::main(2));
    let context = AssignmentContext::new(Fallback::HierarchyParentOf(Some(PositionId::new(4))));

    let assignment = resolve_assignee(&mut directory, &stage, &context).await.unwrap();
    assert_eq!(assignment.employee_id, EmployeeId::new(8));
    assert_eq!(assignment.source, AssignmentSource::HierarchyParent);
}
