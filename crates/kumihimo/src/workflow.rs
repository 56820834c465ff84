//! Workflow engine for executing steps.

use crate::condition::Condition;
use crate::parallel::Parallel;
use crate::step::Step;
use futures::future::{BoxFuture, FutureExt};
use kumihimo_core::{
    Context, HookType, MetricsCollector, NoopHooks, NoopMetrics, StepConfig, StepMetrics,
    StepName, StepStatus, Task, TaskError, ValidationScope, Validator, WorkflowError,
    WorkflowHooks, WorkflowMetrics, WorkflowStatus,
};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// One entry in a workflow's step list.
enum Node {
    Step(Step),
    Condition(Condition),
    Parallel(Parallel),
}

impl Node {
    fn name(&self) -> &StepName {
        match self {
            Node::Step(step) => step.name(),
            Node::Condition(condition) => condition.name(),
            Node::Parallel(parallel) => parallel.name(),
        }
    }

    async fn execute(&self, ctx: &mut Context) -> Result<(), WorkflowError> {
        match self {
            Node::Step(step) => step.execute(ctx).await,
            Node::Condition(condition) => condition.execute(ctx).await,
            Node::Parallel(parallel) => parallel.execute(ctx).await,
        }
    }
}

/// An ordered sequence of steps with hooks, validation and metrics.
///
/// A workflow keeps no per-run state, so one instance can be executed any
/// number of times, concurrently if needed, and shared as a sub-workflow of
/// several conditions or parallel blocks.
pub struct Workflow {
    id: Uuid,
    name: String,
    nodes: Vec<Node>,
    hooks: Arc<dyn WorkflowHooks>,
    validator: Option<Arc<dyn Validator>>,
    metrics: Arc<dyn MetricsCollector>,
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("steps", &self.step_names().collect::<Vec<_>>())
            .finish()
    }
}

impl Workflow {
    /// Creates a new workflow builder.
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    /// Identifier generated when the workflow was built.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the steps in execution order.
    pub fn step_names(&self) -> impl Iterator<Item = &StepName> {
        self.nodes.iter().map(Node::name)
    }

    /// Returns the number of steps, counting each condition or parallel
    /// block as one.
    pub fn step_count(&self) -> usize {
        self.nodes.len()
    }

    /// Runs every step in order against a copy of `initial` and returns the
    /// resulting context.
    ///
    /// The first failure stops the run and is returned unchanged, after the
    /// failed step's metrics are recorded and the `on_error` hook has run.
    /// A failing `on_error` hook is reported as [`WorkflowError::HookFailed`]
    /// instead.
    pub fn execute<'a>(
        &'a self,
        initial: &'a Context,
    ) -> BoxFuture<'a, Result<Context, WorkflowError>> {
        self.run(initial).boxed()
    }

    async fn run(&self, initial: &Context) -> Result<Context, WorkflowError> {
        if let Some(validator) = &self.validator {
            validator
                .validate(initial)
                .map_err(|issues| WorkflowError::ValidationFailed {
                    scope: ValidationScope::Workflow(self.name.clone()),
                    issues,
                })?;
        }

        let mut metrics = WorkflowMetrics::start(self.id, self.name.as_str());
        let outcome = self.run_steps(initial).await;

        match &outcome {
            Ok(_) => {
                metrics.finish(WorkflowStatus::Completed);
                info!(
                    "Workflow '{}' completed in {:?}",
                    self.name, metrics.duration
                );
            }
            Err(error) => {
                metrics.finish(WorkflowStatus::Failed);
                warn!("Workflow '{}' failed: {}", self.name, error);
            }
        }
        self.metrics.record_workflow_execution(&metrics);

        outcome
    }

    async fn run_steps(&self, initial: &Context) -> Result<Context, WorkflowError> {
        self.hooks
            .before_workflow(initial)
            .await
            .map_err(|source| hook_failed(HookType::BeforeWorkflow, None, source))?;

        let mut ctx = initial.clone();
        for node in &self.nodes {
            self.run_node(node, &mut ctx).await?;
        }

        self.hooks
            .after_workflow(&ctx)
            .await
            .map_err(|source| hook_failed(HookType::AfterWorkflow, None, source))?;

        Ok(ctx)
    }

    async fn run_node(&self, node: &Node, ctx: &mut Context) -> Result<(), WorkflowError> {
        let name = node.name();
        let started_at = chrono::Utc::now();
        let started = Instant::now();

        let outcome = self.run_node_with_hooks(node, ctx).await;

        let mut record = StepMetrics {
            step_name: name.clone(),
            started_at,
            ended_at: chrono::Utc::now(),
            duration: started.elapsed(),
            status: StepStatus::Success,
            error: None,
        };

        match outcome {
            Ok(()) => {
                info!("Step '{}' completed successfully", name);
                self.metrics.record_step_execution(&record);
                Ok(())
            }
            Err(error) => {
                warn!("Step '{}' failed: {}", name, error);
                record.status = StepStatus::Failure;
                record.error = Some(error.to_string());
                self.metrics.record_step_execution(&record);

                if let Err(source) = self.hooks.on_error(&error, name, ctx).await {
                    warn!("Error in on_error hook for step '{}': {}", name, source);
                    return Err(hook_failed(HookType::OnError, Some(name), source));
                }
                Err(error)
            }
        }
    }

    async fn run_node_with_hooks(
        &self,
        node: &Node,
        ctx: &mut Context,
    ) -> Result<(), WorkflowError> {
        let name = node.name();
        self.hooks
            .before_step(name, ctx)
            .await
            .map_err(|source| hook_failed(HookType::BeforeStep, Some(name), source))?;

        node.execute(ctx).await?;

        self.hooks
            .after_step(name, ctx)
            .await
            .map_err(|source| hook_failed(HookType::AfterStep, Some(name), source))
    }
}

fn hook_failed(hook: HookType, step_name: Option<&StepName>, source: TaskError) -> WorkflowError {
    WorkflowError::HookFailed {
        hook,
        step_name: step_name.cloned(),
        source,
    }
}

/// Builder for constructing [`Workflow`] instances.
///
/// ```
/// use kumihimo::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), WorkflowError> {
/// let workflow = Workflow::builder()
///     .name("counter")
///     .add_fn("set", |ctx| {
///         ctx.insert("value", 1);
///         Ok(())
///     })
///     .add_fn("increment", |ctx| {
///         let value: i64 = ctx.require("value")?;
///         ctx.insert("value", value + 1);
///         Ok(())
///     })
///     .add_fn("double", |ctx| {
///         let value: i64 = ctx.require("value")?;
///         ctx.insert("value", value * 2);
///         Ok(())
///     })
///     .build()?;
///
/// let result = workflow.execute(&Context::new()).await?;
/// assert_eq!(result.get::<i64>("value"), Some(4));
/// # Ok(())
/// # }
/// ```
pub struct WorkflowBuilder {
    name: String,
    nodes: Vec<Node>,
    hooks: Arc<dyn WorkflowHooks>,
    validator: Option<Arc<dyn Validator>>,
    metrics: Arc<dyn MetricsCollector>,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBuilder {
    /// Creates a new empty workflow builder.
    pub fn new() -> Self {
        Self {
            name: "anonymous".to_string(),
            nodes: Vec::new(),
            hooks: Arc::new(NoopHooks),
            validator: None,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Display name used in logs, metrics and validation errors.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn hooks(mut self, hooks: impl WorkflowHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Validates the initial context before anything else runs.
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Attaches a metrics collector. Accepts an `Arc` so the caller can keep
    /// a handle to read the collected records.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Adds a single-attempt step.
    pub fn add_step<T: Task + 'static>(self, name: impl Into<StepName>, task: T) -> Self {
        self.add_configured(StepConfig::new(name), task)
    }

    /// Adds a step with validator, retry and timeout settings.
    pub fn add_configured<T: Task + 'static>(mut self, config: StepConfig, task: T) -> Self {
        self.nodes.push(Node::Step(Step::new(config, task)));
        self
    }

    /// Adds a single-attempt step backed by a synchronous closure.
    pub fn add_fn<F>(self, name: impl Into<StepName>, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), TaskError> + Send + Sync + 'static,
    {
        self.add_step(name, kumihimo_core::sync_fn(f))
    }

    /// Adds a prebuilt [`Step`].
    pub fn step(mut self, step: Step) -> Self {
        self.nodes.push(Node::Step(step));
        self
    }

    /// Adds a branch selector.
    pub fn add_condition(mut self, condition: Condition) -> Self {
        self.nodes.push(Node::Condition(condition));
        self
    }

    /// Adds a block that runs `workflows` concurrently.
    pub fn parallel<I, W>(self, workflows: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<Arc<Workflow>>,
    {
        self.add_parallel(Parallel::new(workflows))
    }

    /// Adds a preconfigured [`Parallel`] block.
    pub fn add_parallel(mut self, parallel: Parallel) -> Self {
        self.nodes.push(Node::Parallel(parallel));
        self
    }

    /// Builds the workflow.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Configuration`] if the workflow or any step
    /// has a blank name.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Configuration(
                "Workflow name must not be empty".to_string(),
            ));
        }

        if let Some(position) = self.nodes.iter().position(|node| node.name().is_blank()) {
            return Err(WorkflowError::Configuration(format!(
                "Step at position {} has an empty name",
                position
            )));
        }

        Ok(Workflow {
            id: Uuid::new_v4(),
            name: self.name,
            nodes: self.nodes,
            hooks: self.hooks,
            validator: self.validator,
            metrics: self.metrics,
        })
    }
}
