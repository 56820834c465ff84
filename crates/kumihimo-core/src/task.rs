//! The work a step performs.

use crate::context::Context;
use crate::error::TaskError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;

/// The work function wrapped by a step.
///
/// A task mutates the context in place and either succeeds or fails with a
/// [`TaskError`]. It may be called several times in one run when the step is
/// configured to retry, so it should tolerate being re-run against a context
/// it already partially modified.
///
/// # Examples
///
/// ```
/// use kumihimo_core::{Context, Task, TaskError};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct Increment;
///
/// #[async_trait]
/// impl Task for Increment {
///     async fn run(&self, ctx: &mut Context) -> Result<(), TaskError> {
///         let value: i64 = ctx.require("value")?;
///         ctx.insert("value", value + 1);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    /// Runs the task once against the context.
    async fn run(&self, ctx: &mut Context) -> Result<(), TaskError>;
}

/// Task built from an async closure. See [`task_fn`].
pub struct FnTask<F>(F);

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnTask")
    }
}

#[async_trait]
impl<F> Task for FnTask<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<(), TaskError>> + Send + Sync,
{
    async fn run(&self, ctx: &mut Context) -> Result<(), TaskError> {
        (self.0)(ctx).await
    }
}

/// Wraps an async closure as a [`Task`].
///
/// The closure returns a boxed future borrowing the context:
///
/// ```
/// use kumihimo_core::task_fn;
/// use std::time::Duration;
///
/// let task = task_fn(|ctx| {
///     Box::pin(async move {
///         tokio::time::sleep(Duration::from_millis(1)).await;
///         ctx.insert("fetched", true);
///         Ok(())
///     })
/// });
/// # let _ = task;
/// ```
pub fn task_fn<F>(f: F) -> FnTask<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<(), TaskError>> + Send + Sync,
{
    FnTask(f)
}

/// Task built from a synchronous closure. See [`sync_fn`].
pub struct SyncFnTask<F>(F);

impl<F> fmt::Debug for SyncFnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SyncFnTask")
    }
}

#[async_trait]
impl<F> Task for SyncFnTask<F>
where
    F: Fn(&mut Context) -> Result<(), TaskError> + Send + Sync,
{
    async fn run(&self, ctx: &mut Context) -> Result<(), TaskError> {
        (self.0)(ctx)
    }
}

/// Wraps a synchronous closure as a [`Task`].
///
/// ```
/// use kumihimo_core::sync_fn;
///
/// let task = sync_fn(|ctx| {
///     ctx.insert("value", 1);
///     Ok(())
/// });
/// # let _ = task;
/// ```
pub fn sync_fn<F>(f: F) -> SyncFnTask<F>
where
    F: Fn(&mut Context) -> Result<(), TaskError> + Send + Sync,
{
    SyncFnTask(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_fn_runs_against_context() {
        let task = sync_fn(|ctx| {
            let value: i64 = ctx.require("value")?;
            ctx.insert("value", value * 2);
            Ok(())
        });

        let mut ctx = Context::new();
        ctx.insert("value", 21);
        task.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.get::<i64>("value"), Some(42));
    }

    #[tokio::test]
    async fn test_task_fn_propagates_errors() {
        let task = task_fn(|ctx| {
            Box::pin(async move {
                ctx.insert("touched", true);
                Err(TaskError::new("upstream unavailable"))
            })
        });

        let mut ctx = Context::new();
        let error = task.run(&mut ctx).await.unwrap_err();
        assert_eq!(error.message(), "upstream unavailable");
        assert_eq!(ctx.get::<bool>("touched"), Some(true));
    }

    #[tokio::test]
    async fn test_missing_key_becomes_task_error() {
        let task = sync_fn(|ctx| {
            let _: i64 = ctx.require("absent")?;
            Ok(())
        });

        let error = task.run(&mut Context::new()).await.unwrap_err();
        assert_eq!(error.message(), "context key 'absent' not found");
    }
}
