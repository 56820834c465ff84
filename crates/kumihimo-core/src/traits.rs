//! Pluggable collaborators consumed by the workflow engine.

use crate::context::Context;
use crate::error::{TaskError, WorkflowError};
use crate::metrics::{StepMetrics, WorkflowMetrics};
use crate::step::StepName;
use crate::validation::ValidationIssue;
use async_trait::async_trait;

/// Checks the shape of a context.
///
/// Validators must not have side effects; the engine may call them several
/// times during one run (once per workflow and once per validated step).
pub trait Validator: Send + Sync {
    /// Returns every problem found, or `Ok(())` if the context is acceptable.
    fn validate(&self, ctx: &Context) -> Result<(), Vec<ValidationIssue>>;
}

/// Lifecycle callbacks invoked by a workflow.
///
/// Every method defaults to doing nothing, so implementors only override the
/// points they care about. An error from any hook aborts the run like a step
/// failure would. If `on_error` itself fails, its error replaces the step
/// error as [`WorkflowError::HookFailed`].
///
/// # Examples
///
/// ```
/// use kumihimo_core::{Context, StepName, TaskError, WorkflowHooks};
/// use async_trait::async_trait;
///
/// struct Audit;
///
/// #[async_trait]
/// impl WorkflowHooks for Audit {
///     async fn after_step(&self, step: &StepName, _ctx: &Context) -> Result<(), TaskError> {
///         println!("finished {}", step);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait WorkflowHooks: Send + Sync {
    /// Called once with the caller's initial context.
    async fn before_workflow(&self, _ctx: &Context) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called once with the final context after every step succeeded.
    async fn after_workflow(&self, _ctx: &Context) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called before each step.
    async fn before_step(&self, _step: &StepName, _ctx: &Context) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called after each successful step.
    async fn after_step(&self, _step: &StepName, _ctx: &Context) -> Result<(), TaskError> {
        Ok(())
    }

    /// Called once when a step fails, before the error is returned.
    ///
    /// Returning an error here makes the run fail with
    /// [`WorkflowError::HookFailed`] for [`HookType::OnError`](crate::HookType::OnError).
    async fn on_error(
        &self,
        _error: &WorkflowError,
        _step: &StepName,
        _ctx: &Context,
    ) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Hooks that do nothing. Used when a workflow has no hooks attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl WorkflowHooks for NoopHooks {}

/// Sink for execution telemetry.
///
/// Recording is fire-and-forget from the engine's point of view.
pub trait MetricsCollector: Send + Sync {
    /// One record per step per workflow run.
    fn record_step_execution(&self, metrics: &StepMetrics);

    /// One record per workflow run that got past validation.
    fn record_workflow_execution(&self, metrics: &WorkflowMetrics);
}

/// Collector that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsCollector for NoopMetrics {
    fn record_step_execution(&self, _metrics: &StepMetrics) {}

    fn record_workflow_execution(&self, _metrics: &WorkflowMetrics) {}
}
