//! First-match branching between sub-workflows.

use crate::workflow::Workflow;
use async_trait::async_trait;
use futures::future::BoxFuture;
use kumihimo_core::{Context, StepName, WorkflowError};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Decides whether a branch should run.
///
/// Plain closures are accepted by [`ConditionBranch::new`]; implement this
/// trait (or use [`async_predicate`]) when the decision needs to await.
#[async_trait]
pub trait Predicate: Send + Sync {
    async fn evaluate(&self, ctx: &Context) -> bool;
}

struct FnPredicate<F>(F);

#[async_trait]
impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&Context) -> bool + Send + Sync,
{
    async fn evaluate(&self, ctx: &Context) -> bool {
        (self.0)(ctx)
    }
}

/// Predicate backed by an async closure returning a boxed future.
pub struct AsyncPredicate<F>(F);

#[async_trait]
impl<F> Predicate for AsyncPredicate<F>
where
    F: for<'a> Fn(&'a Context) -> BoxFuture<'a, bool> + Send + Sync,
{
    async fn evaluate(&self, ctx: &Context) -> bool {
        (self.0)(ctx).await
    }
}

/// Wraps an async closure as a [`Predicate`].
pub fn async_predicate<F>(f: F) -> AsyncPredicate<F>
where
    F: for<'a> Fn(&'a Context) -> BoxFuture<'a, bool> + Send + Sync,
{
    AsyncPredicate(f)
}

/// A predicate paired with the sub-workflow it selects.
pub struct ConditionBranch {
    name: String,
    predicate: Box<dyn Predicate>,
    workflow: Arc<Workflow>,
}

impl fmt::Debug for ConditionBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionBranch")
            .field("name", &self.name)
            .field("workflow", &self.workflow.name())
            .finish()
    }
}

impl ConditionBranch {
    /// Branch selected by a synchronous predicate.
    pub fn new<F>(name: impl Into<String>, predicate: F, workflow: impl Into<Arc<Workflow>>) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self::with_predicate(name, FnPredicate(predicate), workflow)
    }

    /// Branch selected by any [`Predicate`].
    pub fn with_predicate(
        name: impl Into<String>,
        predicate: impl Predicate + 'static,
        workflow: impl Into<Arc<Workflow>>,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            workflow: workflow.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs the first branch whose predicate holds, or the default.
///
/// The chosen sub-workflow starts from a copy of the current context and its
/// result is merged back key by key; keys it did not return are left alone.
/// With no match and no default the context passes through unchanged.
///
/// ```
/// use kumihimo::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), WorkflowError> {
/// let double = Workflow::builder()
///     .add_fn("multiply-step", |ctx| {
///         let value: i64 = ctx.require("value")?;
///         ctx.insert("value", value * 2);
///         Ok(())
///     })
///     .build()?;
///
/// let workflow = Workflow::builder()
///     .add_condition(Condition::new().branch(ConditionBranch::new(
///         "greater than 5",
///         |ctx: &Context| ctx.get::<i64>("value").is_some_and(|v| v > 5),
///         double,
///     )))
///     .build()?;
///
/// let mut ctx = Context::new();
/// ctx.insert("value", 10);
/// let result = workflow.execute(&ctx).await?;
/// assert_eq!(result.get::<i64>("value"), Some(20));
/// # Ok(())
/// # }
/// ```
pub struct Condition {
    name: StepName,
    branches: Vec<ConditionBranch>,
    default: Option<Arc<Workflow>>,
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("branches", &self.branches)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}

impl Condition {
    pub const DEFAULT_NAME: &'static str = "condition-step";

    pub fn new() -> Self {
        Self {
            name: StepName::new(Self::DEFAULT_NAME),
            branches: Vec::new(),
            default: None,
        }
    }

    /// Overrides the name reported to hooks, metrics and errors.
    pub fn named(mut self, name: impl Into<StepName>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends a branch. Branches are evaluated in the order they are added.
    pub fn branch(mut self, branch: ConditionBranch) -> Self {
        self.branches.push(branch);
        self
    }

    /// Sub-workflow to run when no branch matches.
    pub fn otherwise(mut self, workflow: impl Into<Arc<Workflow>>) -> Self {
        self.default = Some(workflow.into());
        self
    }

    pub fn name(&self) -> &StepName {
        &self.name
    }

    pub(crate) async fn execute(&self, ctx: &mut Context) -> Result<(), WorkflowError> {
        let mut selected = None;
        for branch in &self.branches {
            if branch.predicate.evaluate(ctx).await {
                debug!("Condition '{}' selected branch '{}'", self.name, branch.name);
                selected = Some(&branch.workflow);
                break;
            }
        }

        let Some(workflow) = selected.or(self.default.as_ref()) else {
            debug!("Condition '{}' matched no branch", self.name);
            return Ok(());
        };

        let result = workflow.execute(ctx).await?;
        ctx.merge(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kumihimo_core::TaskError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn setter(key: &'static str, value: i64) -> Workflow {
        Workflow::builder()
            .add_fn(format!("set-{}", key), move |ctx| {
                ctx.insert(key, value);
                Ok(())
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_match_without_default_is_noop() {
        let condition = Condition::new().branch(ConditionBranch::new(
            "never",
            |_ctx: &Context| false,
            setter("touched", 1),
        ));

        let mut ctx = Context::new();
        ctx.insert("value", 3);
        let before = ctx.clone();
        condition.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx, before);
    }

    #[tokio::test]
    async fn test_stops_at_first_match() {
        let evaluated = Arc::new(AtomicU32::new(0));
        let counter = evaluated.clone();
        let condition = Condition::new()
            .branch(ConditionBranch::new("yes", |_ctx: &Context| true, setter("first", 1)))
            .branch(ConditionBranch::new(
                "counted",
                move |_ctx: &Context| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                },
                setter("second", 2),
            ));

        let mut ctx = Context::new();
        condition.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.get::<i64>("first"), Some(1));
        assert!(!ctx.contains_key("second"));
        assert_eq!(evaluated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_merge_keeps_untouched_keys() {
        let condition = Condition::new().otherwise(setter("added", 5));

        let mut ctx = Context::new();
        ctx.insert("kept", "yes");
        condition.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.get::<String>("kept").as_deref(), Some("yes"));
        assert_eq!(ctx.get::<i64>("added"), Some(5));
    }

    #[tokio::test]
    async fn test_branch_error_propagates_unchanged() {
        let failing = Workflow::builder()
            .add_fn("inner", |_ctx| Err(TaskError::new("inner failure")))
            .build()
            .unwrap();
        let condition = Condition::new()
            .named("route")
            .branch(ConditionBranch::new("always", |_ctx: &Context| true, failing));

        let error = condition.execute(&mut Context::new()).await.unwrap_err();
        assert_eq!(error.step_name().map(StepName::as_str), Some("inner"));
        assert_eq!(condition.name(), "route");
    }
}
