//! Core traits and types for the kumihimo workflow engine.
//!
//! This crate provides the data model and collaborator interfaces without a
//! runtime. Library authors should depend on this crate to implement custom
//! tasks, hooks, validators and metrics collectors.
//!
//! # Core Types
//!
//! - [`Context`] - JSON-backed key/value record shared by the steps of a run
//! - [`Task`] - The work a step performs ([`task_fn`] and [`sync_fn`] wrap closures)
//! - [`StepConfig`] / [`RetryConfig`] / [`Backoff`] - Step name, retry and timeout settings
//! - [`WorkflowError`] - Every failure a workflow run can report
//!
//! # Collaborators
//!
//! - [`Validator`] - Context shape checks ([`FnValidator`], [`RequiredKeys`])
//! - [`WorkflowHooks`] - Lifecycle callbacks ([`NoopHooks`] when absent)
//! - [`MetricsCollector`] - Telemetry sink ([`NoopMetrics`] when absent)

mod context;
mod error;
mod metrics;
mod step;
mod task;
mod traits;
mod validation;

pub use context::{Context, ContextKey};
pub use error::{
    BoxError, ContextError, HookType, TaskError, ValidationScope, WorkflowError,
};
pub use metrics::{StepMetrics, StepStatus, WorkflowMetrics, WorkflowStatus};
pub use step::{Backoff, BackoffError, RetryConfig, RetryPredicate, StepConfig, StepName};
pub use task::{sync_fn, task_fn, FnTask, SyncFnTask, Task};
pub use traits::{MetricsCollector, NoopHooks, NoopMetrics, Validator, WorkflowHooks};
pub use validation::{FnValidator, PathSegment, RequiredKeys, ValidationIssue, ValueKind};
