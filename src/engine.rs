use std::future::Future;
use std::sync::Arc;
use tracing::{warn, Instrument};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{RequestId, WorkflowInstanceStage, WorkflowRequest};
use crate::observability::{create_workflow_span, EngineMetrics, OperationTimer};
use crate::telemetry::generate_correlation_id;
use crate::tracker::{InstanceTracker, NextStage, StartRequest};
use crate::transitions::{CompleteStage, StageTransitionEngine, TransitionOutcome};
use crate::store::WorkflowStore;

/// Entry point for callers: one tracker and one transition engine over a
/// shared store.
pub struct WorkflowEngine<S> {
    store: Arc<S>,
    tracker: InstanceTracker<S>,
    transitions: StageTransitionEngine<S>,
    metrics: Arc<EngineMetrics>,
}

impl<S: WorkflowStore> WorkflowEngine<S> {
    pub fn new(store: S, settings: EngineConfig) -> Self {
        Self::with_metrics(Arc::new(store), settings, Arc::new(EngineMetrics::new()))
    }

    pub fn with_metrics(store: Arc<S>, settings: EngineConfig, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            tracker: InstanceTracker::new(Arc::clone(&store), settings),
            transitions: StageTransitionEngine::new(Arc::clone(&store)),
            store,
            metrics,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub async fn start_request(&self, start: StartRequest) -> Result<WorkflowRequest> {
        let result = self
            .traced("start_request", self.tracker.start_request(start))
            .await;
        if let Ok(request) = &result {
            self.metrics
                .record_request_started(request.status.is_terminal());
        }
        result
    }

    pub async fn complete_stage(&self, command: CompleteStage) -> Result<TransitionOutcome> {
        let result = self
            .traced("complete_stage", self.transitions.complete_stage(command))
            .await;
        if let Ok(outcome) = &result {
            self.metrics.record_transition(outcome);
        }
        result
    }

    pub async fn next_stage(&self, request_id: RequestId) -> Result<NextStage> {
        self.traced("next_stage", self.tracker.next_stage(request_id))
            .await
    }

    pub async fn request(&self, request_id: RequestId) -> Result<WorkflowRequest> {
        self.traced("request", self.tracker.request(request_id)).await
    }

    pub async fn history(&self, request_id: RequestId) -> Result<Vec<WorkflowInstanceStage>> {
        self.traced("history", self.tracker.history(request_id)).await
    }

    async fn traced<T, F>(&self, operation: &'static str, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let correlation_id = generate_correlation_id();
        let span = create_workflow_span(operation, &correlation_id);
        let timer = OperationTimer::new(operation);

        let result = work.instrument(span.clone()).await;
        span.in_scope(|| {
            if let Err(err) = &result {
                self.metrics.record_failure();
                warn!(operation, error = %err, kind = err.kind(), "Workflow operation failed");
            }
            timer.finish(result.is_ok());
        });
        result
    }
}
