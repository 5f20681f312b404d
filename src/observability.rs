use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::transitions::TransitionOutcome;

/// Engine activity counters, owned by one `WorkflowEngine`.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub requests_started: AtomicU64,
    pub stages_completed: AtomicU64,
    pub approvals: AtomicU64,
    pub rejections: AtomicU64,
    pub resubmissions: AtomicU64,
    pub requests_approved: AtomicU64,
    pub requests_rejected: AtomicU64,
    pub failures: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request_started(&self, approved_immediately: bool) {
        self.requests_started.fetch_add(1, Ordering::Relaxed);
        if approved_immediately {
            self.requests_approved.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_transition(&self, outcome: &TransitionOutcome) {
        self.stages_completed.fetch_add(1, Ordering::Relaxed);
        match outcome {
            TransitionOutcome::ResubmissionQueued { replayed } => {
                self.rejections.fetch_add(1, Ordering::Relaxed);
                self.resubmissions
                    .fetch_add(replayed.len() as u64, Ordering::Relaxed);
            }
            TransitionOutcome::RequestRejected => {
                self.rejections.fetch_add(1, Ordering::Relaxed);
                self.requests_rejected.fetch_add(1, Ordering::Relaxed);
            }
            TransitionOutcome::RequestApproved => {
                self.approvals.fetch_add(1, Ordering::Relaxed);
                self.requests_approved.fetch_add(1, Ordering::Relaxed);
            }
            TransitionOutcome::AwaitingSiblings { .. }
            | TransitionOutcome::SubStagesOpened { .. }
            | TransitionOutcome::NextMainStage { .. } => {
                self.approvals.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> EngineStats {
        EngineStats {
            requests_started: self.requests_started.load(Ordering::Relaxed),
            stages_completed: self.stages_completed.load(Ordering::Relaxed),
            approvals: self.approvals.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            resubmissions: self.resubmissions.load(Ordering::Relaxed),
            requests_approved: self.requests_approved.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Engine metrics: started={}, completed={}, approvals={}, rejections={}, resubmissions={}, approved={}, rejected={}, failures={}",
            stats.requests_started,
            stats.stages_completed,
            stats.approvals,
            stats.rejections,
            stats.resubmissions,
            stats.requests_approved,
            stats.requests_rejected,
            stats.failures
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub requests_started: u64,
    pub stages_completed: u64,
    pub approvals: u64,
    pub rejections: u64,
    pub resubmissions: u64,
    pub requests_approved: u64,
    pub requests_rejected: u64,
    pub failures: u64,
}

/// Span wrapping one engine operation
pub fn create_workflow_span(operation: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "workflow",
        operation = operation,
        correlation.id = correlation_id,
    )
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn finish(self, succeeded: bool) {
        let duration = self.start.elapsed();
        info!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            succeeded,
            "Operation completed"
        );
    }
}
