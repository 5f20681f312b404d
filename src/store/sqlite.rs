use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    DefinitionSource, EmployeeDirectory, InstanceRepository, StageQuery, WorkflowStore, WorkflowTx,
};
use crate::definitions::{
    validate_definition, FormField, StageAssignment, StageDefinition, WorkflowDefinition,
};
use crate::error::{Result, WorkflowError};
use crate::model::{
    Department, DepartmentId, Employee, EmployeeId, FieldResponses, FormId, InstanceStageId,
    NewInstanceStage, NewWorkflowRequest, OrganizationId, Position, PositionId, RequestId,
    StageDefinitionId, StepKey, WorkflowId, WorkflowInstanceStage, WorkflowRequest,
};

const REQUEST_COLUMNS: &str = "id, workflow_id, requestor_id, created_by, status, \
     form_responses, created_at, updated_at";

const STAGE_COLUMNS: &str = "id, workflow_request_id, stage_id, stage_name, main_step, \
     sub_ordinal, parent_step, is_sub_stage, is_resubmission, assigned_to_user_id, \
     acted_by_user_id, status, field_responses, comment, acted_at, created_at";

/// SQLite-backed workflow store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every pooled connection to `:memory:` would be its own database.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        info!(url, in_memory, "Connected to workflow database");
        Ok(Self { pool })
    }

    /// Fresh migrated in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let store = Self::connect("sqlite::memory:", 1).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }

    pub async fn save_department(&self, department: &Department) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO departments (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(department.id.get())
        .bind(&department.name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_position(&self, position: &Position) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (id, name, department_id, parent_id, hierarchy_level)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                department_id = excluded.department_id,
                parent_id = excluded.parent_id,
                hierarchy_level = excluded.hierarchy_level
            "#,
        )
        .bind(position.id.get())
        .bind(&position.name)
        .bind(position.department_id.map(DepartmentId::get))
        .bind(position.parent_id.map(PositionId::get))
        .bind(position.hierarchy_level)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_employee(&self, employee: &Employee) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO employees (id, name, position_id, department_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                position_id = excluded.position_id,
                department_id = excluded.department_id
            "#,
        )
        .bind(employee.id.get())
        .bind(&employee.name)
        .bind(employee.position_id.map(PositionId::get))
        .bind(employee.department_id.map(DepartmentId::get))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Validates and upserts a workflow template with all of its stages in
    /// one transaction.
    pub async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<()> {
        let workflow = workflow.clone().normalized();
        validate_definition(&workflow)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO workflows (id, organization_id, form_id, name)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                organization_id = excluded.organization_id,
                form_id = excluded.form_id,
                name = excluded.name
            "#,
        )
        .bind(workflow.id.get())
        .bind(workflow.organization_id.get())
        .bind(workflow.form_id.get())
        .bind(&workflow.name)
        .execute(&mut *tx)
        .await?;

        for stage in &workflow.stages {
            sqlx::query(
                r#"
                INSERT INTO stage_definitions (
                    id, workflow_id, name, main_step, sub_ordinal, parent_step, is_sub_stage,
                    assignee_department_id, assignee_position_id, assignee_lookup_field,
                    form_fields
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(id) DO UPDATE SET
                    workflow_id = excluded.workflow_id,
                    name = excluded.name,
                    main_step = excluded.main_step,
                    sub_ordinal = excluded.sub_ordinal,
                    parent_step = excluded.parent_step,
                    is_sub_stage = excluded.is_sub_stage,
                    assignee_department_id = excluded.assignee_department_id,
                    assignee_position_id = excluded.assignee_position_id,
                    assignee_lookup_field = excluded.assignee_lookup_field,
                    form_fields = excluded.form_fields
                "#,
            )
            .bind(stage.id.get())
            .bind(workflow.id.get())
            .bind(&stage.name)
            .bind(stage.step.main)
            .bind(i64::from(stage.step.sub))
            .bind(stage.parent_step)
            .bind(stage.is_sub_stage)
            .bind(stage.assignment.department_id.map(DepartmentId::get))
            .bind(stage.assignment.position_id.map(PositionId::get))
            .bind(stage.assignment.lookup_field.as_deref())
            .bind(serde_json::to_string(&stage.form_fields)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(
            workflow_id = %workflow.id,
            stages = workflow.stages.len(),
            "Saved workflow definition"
        );
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for SqliteStore {
    type Tx = SqliteTx;

    async fn begin(&self) -> Result<SqliteTx> {
        let tx = self.pool.begin().await?;
        Ok(SqliteTx { tx })
    }
}

/// One open SQLite transaction. Dropping it without `commit` rolls back.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl WorkflowTx for SqliteTx {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl DefinitionSource for SqliteTx {
    async fn workflow(&mut self, id: WorkflowId) -> Result<Option<WorkflowDefinition>> {
        let row = sqlx::query(
            r#"
            SELECT id, organization_id, form_id, name
            FROM workflows
            WHERE id = ?1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stage_rows = sqlx::query(
            r#"
            SELECT id, workflow_id, name, main_step, sub_ordinal, parent_step, is_sub_stage,
                   assignee_department_id, assignee_position_id, assignee_lookup_field,
                   form_fields
            FROM stage_definitions
            WHERE workflow_id = ?1
            ORDER BY main_step ASC, sub_ordinal ASC, id ASC
            "#,
        )
        .bind(id.get())
        .fetch_all(&mut *self.tx)
        .await?;

        let stages = stage_rows
            .iter()
            .map(stage_definition_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(WorkflowDefinition {
            id: WorkflowId::new(row.try_get("id")?),
            organization_id: OrganizationId::new(row.try_get("organization_id")?),
            form_id: FormId::new(row.try_get("form_id")?),
            name: row.try_get("name")?,
            stages,
        }))
    }
}

#[async_trait]
impl EmployeeDirectory for SqliteTx {
    async fn find_employee(&mut self, id: EmployeeId) -> Result<Option<Employee>> {
        let row = sqlx::query(
            "SELECT id, name, position_id, department_id FROM employees WHERE id = ?1",
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(employee_from_row).transpose()
    }

    async fn find_position(&mut self, id: PositionId) -> Result<Option<Position>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, department_id, parent_id, hierarchy_level
            FROM positions
            WHERE id = ?1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<_> {
            Ok(Position {
                id: PositionId::new(row.try_get("id")?),
                name: row.try_get("name")?,
                department_id: row
                    .try_get::<Option<i64>, _>("department_id")?
                    .map(DepartmentId::new),
                parent_id: row
                    .try_get::<Option<i64>, _>("parent_id")?
                    .map(PositionId::new),
                hierarchy_level: row.try_get("hierarchy_level")?,
            })
        })
        .transpose()
    }

    async fn find_department(&mut self, id: DepartmentId) -> Result<Option<Department>> {
        let row = sqlx::query("SELECT id, name FROM departments WHERE id = ?1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|row| -> Result<_> {
            Ok(Department {
                id: DepartmentId::new(row.try_get("id")?),
                name: row.try_get("name")?,
            })
        })
        .transpose()
    }

    async fn occupants_of(&mut self, position: PositionId) -> Result<Vec<Employee>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, position_id, department_id
            FROM employees
            WHERE position_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(position.get())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(employee_from_row).collect()
    }
}

#[async_trait]
impl InstanceRepository for SqliteTx {
    async fn insert_request(&mut self, request: NewWorkflowRequest) -> Result<WorkflowRequest> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO workflow_requests (
                workflow_id, requestor_id, created_by, status, form_responses,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6)
            RETURNING {REQUEST_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(request.workflow_id.get())
            .bind(request.requestor_id.get())
            .bind(request.created_by.get())
            .bind(serde_json::to_string(&request.form_responses)?)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *self.tx)
            .await?;

        let created = request_from_row(&row)?;
        debug!(request_id = %created.id, "Inserted workflow request");
        Ok(created)
    }

    async fn find_request(&mut self, id: RequestId) -> Result<Option<WorkflowRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM workflow_requests WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(request_from_row).transpose()
    }

    async fn lock_request(&mut self, id: RequestId) -> Result<bool> {
        // A no-op write takes the database write lock before anything is read.
        let result = sqlx::query("UPDATE workflow_requests SET status = status WHERE id = ?1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_request(&mut self, request: &WorkflowRequest) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE workflow_requests
            SET status = ?1, form_responses = ?2, updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(request.status.as_str())
        .bind(serde_json::to_string(&request.form_responses)?)
        .bind(Utc::now())
        .bind(request.id.get())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_stage(&mut self, stage: NewInstanceStage) -> Result<WorkflowInstanceStage> {
        let sql = format!(
            r#"
            INSERT INTO workflow_instance_stages (
                workflow_request_id, stage_id, stage_name, main_step, sub_ordinal,
                parent_step, is_sub_stage, is_resubmission, assigned_to_user_id,
                acted_by_user_id, status, field_responses, comment, acted_at, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            RETURNING {STAGE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(stage.workflow_request_id.get())
            .bind(stage.stage_id.get())
            .bind(&stage.stage_name)
            .bind(stage.step.main)
            .bind(i64::from(stage.step.sub))
            .bind(stage.parent_step)
            .bind(stage.is_sub_stage)
            .bind(stage.assigned_to_user_id.map(EmployeeId::get))
            .bind(stage.acted_by_user_id.map(EmployeeId::get))
            .bind(stage.status.as_str())
            .bind(encode_responses(stage.field_responses.as_ref())?)
            .bind(stage.comment.as_deref())
            .bind(stage.acted_at)
            .bind(Utc::now())
            .fetch_one(&mut *self.tx)
            .await?;

        let created = stage_from_row(&row)?;
        debug!(
            request_id = %created.workflow_request_id,
            stage_id = %created.id,
            step = %created.step,
            status = %created.status,
            "Inserted stage instance"
        );
        Ok(created)
    }

    async fn find_stage(&mut self, id: InstanceStageId) -> Result<Option<WorkflowInstanceStage>> {
        let sql = format!("SELECT {STAGE_COLUMNS} FROM workflow_instance_stages WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(stage_from_row).transpose()
    }

    async fn lock_stage(&mut self, id: InstanceStageId) -> Result<bool> {
        let result =
            sqlx::query("UPDATE workflow_instance_stages SET status = status WHERE id = ?1")
                .bind(id.get())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_stage(&mut self, stage: &WorkflowInstanceStage) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE workflow_instance_stages
            SET is_resubmission = ?1,
                assigned_to_user_id = ?2,
                acted_by_user_id = ?3,
                status = ?4,
                field_responses = ?5,
                comment = ?6,
                acted_at = ?7
            WHERE id = ?8
            "#,
        )
        .bind(stage.is_resubmission)
        .bind(stage.assigned_to_user_id.map(EmployeeId::get))
        .bind(stage.acted_by_user_id.map(EmployeeId::get))
        .bind(stage.status.as_str())
        .bind(encode_responses(stage.field_responses.as_ref())?)
        .bind(stage.comment.as_deref())
        .bind(stage.acted_at)
        .bind(stage.id.get())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn stages(&mut self, query: &StageQuery) -> Result<Vec<WorkflowInstanceStage>> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {STAGE_COLUMNS} FROM workflow_instance_stages WHERE workflow_request_id = "
        ));
        builder.push_bind(query.request_id.get());

        if let Some(parent) = query.parent_step {
            builder.push(" AND parent_step = ").push_bind(parent);
        }
        if let Some(limit) = query.up_to_step {
            builder
                .push(" AND (main_step < ")
                .push_bind(limit.main)
                .push(" OR (main_step = ")
                .push_bind(limit.main)
                .push(" AND sub_ordinal <= ")
                .push_bind(i64::from(limit.sub))
                .push("))");
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if !query.include_resubmitted {
            builder.push(" AND is_resubmission = 0");
        }
        builder.push(" ORDER BY main_step ASC, sub_ordinal ASC, id ASC");

        let rows = builder.build().fetch_all(&mut *self.tx).await?;
        rows.iter().map(stage_from_row).collect()
    }
}

fn encode_responses(responses: Option<&FieldResponses>) -> Result<Option<String>> {
    Ok(responses.map(serde_json::to_string).transpose()?)
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> WorkflowError {
    WorkflowError::CorruptRecord(format!("{column}: {detail}"))
}

fn step_from_row(row: &SqliteRow) -> Result<StepKey> {
    let main: i64 = row.try_get("main_step")?;
    let sub: i64 = row.try_get("sub_ordinal")?;
    let sub = u32::try_from(sub).map_err(|err| corrupt("sub_ordinal", err))?;
    Ok(StepKey { main, sub })
}

fn employee_from_row(row: &SqliteRow) -> Result<Employee> {
    Ok(Employee {
        id: EmployeeId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        position_id: row
            .try_get::<Option<i64>, _>("position_id")?
            .map(PositionId::new),
        department_id: row
            .try_get::<Option<i64>, _>("department_id")?
            .map(DepartmentId::new),
    })
}

fn stage_definition_from_row(row: &SqliteRow) -> Result<StageDefinition> {
    let form_fields: String = row.try_get("form_fields")?;
    let form_fields: Vec<FormField> =
        serde_json::from_str(&form_fields).map_err(|err| corrupt("form_fields", err))?;

    Ok(StageDefinition {
        id: StageDefinitionId::new(row.try_get("id")?),
        workflow_id: WorkflowId::new(row.try_get("workflow_id")?),
        name: row.try_get("name")?,
        step: step_from_row(row)?,
        parent_step: row.try_get("parent_step")?,
        is_sub_stage: row.try_get("is_sub_stage")?,
        assignment: StageAssignment {
            department_id: row
                .try_get::<Option<i64>, _>("assignee_department_id")?
                .map(DepartmentId::new),
            position_id: row
                .try_get::<Option<i64>, _>("assignee_position_id")?
                .map(PositionId::new),
            lookup_field: row.try_get("assignee_lookup_field")?,
        },
        form_fields,
    })
}

fn request_from_row(row: &SqliteRow) -> Result<WorkflowRequest> {
    let status: String = row.try_get("status")?;
    let form_responses: String = row.try_get("form_responses")?;

    Ok(WorkflowRequest {
        id: RequestId::new(row.try_get("id")?),
        workflow_id: WorkflowId::new(row.try_get("workflow_id")?),
        requestor_id: EmployeeId::new(row.try_get("requestor_id")?),
        created_by: EmployeeId::new(row.try_get("created_by")?),
        status: status.parse().map_err(|err| corrupt("status", err))?,
        form_responses: serde_json::from_str(&form_responses)
            .map_err(|err| corrupt("form_responses", err))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn stage_from_row(row: &SqliteRow) -> Result<WorkflowInstanceStage> {
    let status: String = row.try_get("status")?;
    let field_responses = row
        .try_get::<Option<String>, _>("field_responses")?
        .map(|raw| serde_json::from_str::<FieldResponses>(&raw))
        .transpose()
        .map_err(|err| corrupt("field_responses", err))?;

    Ok(WorkflowInstanceStage {
        id: InstanceStageId::new(row.try_get("id")?),
        workflow_request_id: RequestId::new(row.try_get("workflow_request_id")?),
        stage_id: StageDefinitionId::new(row.try_get("stage_id")?),
        stage_name: row.try_get("stage_name")?,
        step: step_from_row(row)?,
        parent_step: row.try_get("parent_step")?,
        is_sub_stage: row.try_get("is_sub_stage")?,
        is_resubmission: row.try_get("is_resubmission")?,
        assigned_to_user_id: row
            .try_get::<Option<i64>, _>("assigned_to_user_id")?
            .map(EmployeeId::new),
        acted_by_user_id: row
            .try_get::<Option<i64>, _>("acted_by_user_id")?
            .map(EmployeeId::new),
        status: status.parse().map_err(|err| corrupt("status", err))?,
        field_responses,
        comment: row.try_get("comment")?,
        acted_at: row.try_get("acted_at")?,
        created_at: row.try_get("created_at")?,
    })
}
