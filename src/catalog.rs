// Seed catalog: directory records and workflow templates in one TOML file

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::definitions::WorkflowDefinition;
use crate::error::Result;
use crate::model::{Department, Employee, Position};
use crate::store::SqliteStore;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Catalog {
    #[serde(default)]
    pub departments: Vec<Department>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub workflows: Vec<WorkflowDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub departments: usize,
    pub positions: usize,
    pub employees: usize,
    pub workflows: usize,
}

impl Catalog {
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&raw)
    }

    /// Upserts everything into `store`. Workflows are validated before any
    /// of their rows are written.
    pub async fn import_into(&self, store: &SqliteStore) -> Result<ImportSummary> {
        for department in &self.departments {
            store.save_department(department).await?;
        }
        for position in &self.positions {
            store.save_position(position).await?;
        }
        for employee in &self.employees {
            store.save_employee(employee).await?;
        }
        for workflow in &self.workflows {
            store.save_workflow(workflow).await?;
        }

        let summary = ImportSummary {
            departments: self.departments.len(),
            positions: self.positions.len(),
            employees: self.employees.len(),
            workflows: self.workflows.len(),
        };
        info!(?summary, "Catalog imported");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StepKey, WorkflowId};
    use crate::store::{DefinitionSource, EmployeeDirectory, WorkflowStore};

    const CATALOG: &str = r#"
        [[departments]]
        id = 1
        name = "Operations"

        [[positions]]
        id = 1
        name = "Director"
        department_id = 1
        hierarchy_level = 4

        [[positions]]
        id = 2
        name = "Analyst"
        department_id = 1
        parent_id = 1
        hierarchy_level = 1

        [[employees]]
        id = 10
        name = "Noor"
        position_id = 1

        [[employees]]
        id = 11
        name = "Tomas"
        position_id = 2

        [[workflows]]
        id = 1
        organization_id = 1
        form_id = 1
        name = "Equipment purchase"

        [[workflows.stages]]
        id = 1
        name = "Request"
        step = 1
        form_fields = [{ id = "item", type = "text", required = true }]

        [[workflows.stages]]
        id = 2
        name = "Director review"
        step = 2
        assignment = { position_id = 1 }

        [[workflows.stages]]
        id = 3
        name = "IT check"
        step = "2.1"
        assignment = { lookup_field = "it_reviewer" }
    "#;

    #[tokio::test]
    async fn imports_directory_and_workflows() {
        let catalog = Catalog::from_toml(CATALOG).unwrap();
        let store = SqliteStore::in_memory().await.unwrap();

        let summary = catalog.import_into(&store).await.unwrap();
        assert_eq!(summary.positions, 2);
        assert_eq!(summary.workflows, 1);

        let mut tx = store.begin().await.unwrap();
        let workflow = tx.workflow(WorkflowId::new(1)).await.unwrap().unwrap();
        assert_eq!(workflow.stages.len(), 3);
        assert_eq!(workflow.stages[2].step, StepKey::sub(2, 1));
        assert_eq!(workflow.stages[0].form_fields[0].id, "item");

        let analyst = tx
            .find_position(crate::model::PositionId::new(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(analyst.parent_id, Some(crate::model::PositionId::new(1)));
    }

    #[test]
    fn rejects_malformed_steps() {
        let raw = CATALOG.replace("step = \"2.1\"", "step = \"2.0\"");
        assert!(Catalog::from_toml(&raw).is_err());
    }
}
