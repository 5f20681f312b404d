// Organisational directory records consumed by assignment resolution

use serde::{Deserialize, Serialize};

use super::ids::{DepartmentId, EmployeeId, PositionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub name: String,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
    /// Position this one reports to.
    #[serde(default)]
    pub parent_id: Option<PositionId>,
    #[serde(default)]
    pub hierarchy_level: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    #[serde(default)]
    pub position_id: Option<PositionId>,
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub id: PositionId,
    pub name: String,
    pub hierarchy_level: i64,
}

impl From<&Position> for PositionSummary {
    fn from(position: &Position) -> Self {
        Self {
            id: position.id,
            name: position.name.clone(),
            hierarchy_level: position.hierarchy_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentSummary {
    pub id: DepartmentId,
    pub name: String,
}

impl From<&Department> for DepartmentSummary {
    fn from(department: &Department) -> Self {
        Self {
            id: department.id,
            name: department.name.clone(),
        }
    }
}

/// The authenticated caller as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: EmployeeId,
    pub name: String,
    pub position: Option<PositionSummary>,
    pub department: Option<DepartmentSummary>,
}

impl ActingUser {
    pub fn new(id: EmployeeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            position: None,
            department: None,
        }
    }

    pub fn with_position(mut self, position: &Position) -> Self {
        self.position = Some(PositionSummary::from(position));
        self
    }

    pub fn with_department(mut self, department: &Department) -> Self {
        self.department = Some(DepartmentSummary::from(department));
        self
    }

    pub fn hierarchy_level(&self) -> Option<i64> {
        self.position.as_ref().map(|p| p.hierarchy_level)
    }

    pub fn position_id(&self) -> Option<PositionId> {
        self.position.as_ref().map(|p| p.id)
    }

    pub fn position_name(&self) -> Option<String> {
        self.position.as_ref().map(|p| p.name.clone())
    }

    pub fn department_name(&self) -> Option<String> {
        self.department.as_ref().map(|d| d.name.clone())
    }
}
