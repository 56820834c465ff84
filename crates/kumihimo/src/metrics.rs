//! Ready-made metrics collectors.

use kumihimo_core::{MetricsCollector, StepMetrics, StepStatus, WorkflowMetrics, WorkflowStatus};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Keeps every record in memory. Mostly useful in tests.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    steps: Mutex<Vec<StepMetrics>>,
    workflows: Mutex<Vec<WorkflowMetrics>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step records in the order they were received.
    pub fn step_metrics(&self) -> Vec<StepMetrics> {
        self.steps.lock().clone()
    }

    /// Workflow records in the order they were received.
    pub fn workflow_metrics(&self) -> Vec<WorkflowMetrics> {
        self.workflows.lock().clone()
    }

    pub fn clear(&self) {
        self.steps.lock().clear();
        self.workflows.lock().clear();
    }
}

impl MetricsCollector for InMemoryMetrics {
    fn record_step_execution(&self, metrics: &StepMetrics) {
        self.steps.lock().push(metrics.clone());
    }

    fn record_workflow_execution(&self, metrics: &WorkflowMetrics) {
        self.workflows.lock().push(metrics.clone());
    }
}

/// Emits every record as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl MetricsCollector for TracingMetrics {
    fn record_step_execution(&self, metrics: &StepMetrics) {
        match metrics.status {
            StepStatus::Success => info!(
                step = %metrics.step_name,
                duration_ms = metrics.duration.as_millis() as u64,
                "step succeeded"
            ),
            StepStatus::Failure => warn!(
                step = %metrics.step_name,
                duration_ms = metrics.duration.as_millis() as u64,
                error = metrics.error.as_deref().unwrap_or("unknown"),
                "step failed"
            ),
        }
    }

    fn record_workflow_execution(&self, metrics: &WorkflowMetrics) {
        let duration_ms = metrics.duration.as_millis() as u64;
        match metrics.status {
            WorkflowStatus::Failed => warn!(
                workflow_id = %metrics.workflow_id,
                workflow = %metrics.workflow_name,
                duration_ms,
                "workflow failed"
            ),
            _ => info!(
                workflow_id = %metrics.workflow_id,
                workflow = %metrics.workflow_name,
                duration_ms,
                status = ?metrics.status,
                "workflow finished"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kumihimo_core::StepName;
    use std::time::Duration;
    use uuid::Uuid;

    fn step_record(name: &str, status: StepStatus) -> StepMetrics {
        StepMetrics {
            step_name: StepName::new(name),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            duration: Duration::from_millis(3),
            status,
            error: None,
        }
    }

    #[test]
    fn test_in_memory_collects_and_clears() {
        let collector = InMemoryMetrics::new();
        collector.record_step_execution(&step_record("a", StepStatus::Success));
        collector.record_step_execution(&step_record("b", StepStatus::Failure));

        let mut run = WorkflowMetrics::start(Uuid::new_v4(), "wf");
        run.finish(WorkflowStatus::Failed);
        collector.record_workflow_execution(&run);

        let steps = collector.step_metrics();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].step_name, "b");
        assert_eq!(collector.workflow_metrics()[0].status, WorkflowStatus::Failed);

        collector.clear();
        assert!(collector.step_metrics().is_empty());
        assert!(collector.workflow_metrics().is_empty());
    }

    #[test]
    fn test_tracing_collector_accepts_all_statuses() {
        let collector = TracingMetrics;
        collector.record_step_execution(&step_record("ok", StepStatus::Success));
        collector.record_step_execution(&step_record("bad", StepStatus::Failure));

        let mut run = WorkflowMetrics::start(Uuid::new_v4(), "wf");
        run.finish(WorkflowStatus::Completed);
        collector.record_workflow_execution(&run);
    }
}
