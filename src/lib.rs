// approval-flow - multi-stage approval workflow engine
// This exposes the engine components for the CLI, tests and embedding callers

pub mod assignment;
pub mod catalog;
pub mod config;
pub mod definitions;
pub mod engine;
pub mod error;
pub mod model;
pub mod observability;
pub mod store;
pub mod telemetry;
pub mod tracker;
pub mod transitions;

// Re-export key types for easy access
pub use assignment::{load_acting_user, resolve_assignee, Assignment, AssignmentContext, Fallback};
pub use catalog::{Catalog, ImportSummary};
pub use config::{ApprovalFlowConfig, DatabaseConfig, EngineConfig, ObservabilityConfig};
pub use definitions::{StageDefinition, WorkflowDefinition};
pub use engine::WorkflowEngine;
pub use error::{Result, WorkflowError};
pub use observability::{create_workflow_span, EngineMetrics, EngineStats, OperationTimer};
pub use store::{SqliteStore, WorkflowStore, WorkflowTx};
pub use telemetry::{generate_correlation_id, init_telemetry};
pub use tracker::{InstanceTracker, NextStage, StartRequest};
pub use transitions::{create_next_main_stage, CompleteStage, StageTransitionEngine, TransitionOutcome};
