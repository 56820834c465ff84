//! Execution telemetry records.

use crate::step::StepName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Outcome of one step within a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
}

/// State of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
}

/// Telemetry for one step of one workflow run.
///
/// Retries inside the step are not reported separately; `duration` covers
/// every attempt plus the surrounding step hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub step_name: StepName,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration: Duration,
    pub status: StepStatus,
    /// Rendered error for failed steps.
    pub error: Option<String>,
}

/// Telemetry for one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    pub workflow_id: Uuid,
    pub workflow_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Duration,
    /// Left empty by the engine; collectors that want per-run step lists
    /// can fill it from the step records they received.
    pub steps: Vec<StepMetrics>,
    pub status: WorkflowStatus,
    /// Monotonic start used for `duration`; absent on deserialized records.
    #[serde(skip)]
    clock: Option<Instant>,
}

impl WorkflowMetrics {
    /// A `running` record stamped with the current time.
    pub fn start(workflow_id: Uuid, workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_id,
            workflow_name: workflow_name.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration: Duration::ZERO,
            steps: Vec::new(),
            status: WorkflowStatus::Running,
            clock: Some(Instant::now()),
        }
    }

    /// Stamps the end time and duration and sets the final status.
    ///
    /// `duration` is measured on the monotonic clock, so wall-clock jumps
    /// between `started_at` and `ended_at` do not affect it.
    pub fn finish(&mut self, status: WorkflowStatus) {
        let ended_at = Utc::now();
        self.duration = match self.clock {
            Some(started) => started.elapsed(),
            None => (ended_at - self.started_at).to_std().unwrap_or_default(),
        };
        self.ended_at = Some(ended_at);
        self.status = status;
    }
}
