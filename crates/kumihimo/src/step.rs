//! Step execution with validation, timeouts and retry/backoff.

use kumihimo_core::{
    Context, StepConfig, StepName, Task, TaskError, ValidationScope, WorkflowError,
};
use std::fmt;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A task together with its name, validator, retry policy and timeout.
///
/// Steps hold no state between executions and can be run any number of
/// times, including concurrently from different workflow runs.
#[derive(Clone)]
pub struct Step {
    config: StepConfig,
    task: Arc<dyn Task>,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("config", &self.config).finish()
    }
}

impl Step {
    pub fn new(config: StepConfig, task: impl Task + 'static) -> Self {
        Self {
            config,
            task: Arc::new(task),
        }
    }

    pub fn name(&self) -> &StepName {
        self.config.name()
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Validates the context, then runs the task until it succeeds or the
    /// retry policy gives up.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::ValidationFailed`] if the step's validator rejects
    ///   the context. The task is not run.
    /// - [`WorkflowError::NonRetryable`] if the retry predicate rejects an
    ///   error. No further attempt and no backoff wait happen.
    /// - [`WorkflowError::RetryExhausted`] once the last permitted attempt
    ///   has failed.
    pub async fn execute(&self, ctx: &mut Context) -> Result<(), WorkflowError> {
        if let Some(validator) = self.config.validator_ref() {
            validator
                .validate(ctx)
                .map_err(|issues| WorkflowError::ValidationFailed {
                    scope: ValidationScope::Step(self.name().clone()),
                    issues,
                })?;
        }

        let retry = self.config.retry_config();
        let max_attempts = retry.max_attempts();
        let mut attempt = 1;

        loop {
            let error = match self.run_attempt(ctx).await {
                Ok(()) => {
                    debug!("Step '{}' succeeded on attempt {}", self.name(), attempt);
                    return Ok(());
                }
                Err(error) => error,
            };

            if !retry.should_retry(&error) {
                warn!(
                    "Step '{}' failed with a non-retryable error on attempt {}: {}",
                    self.name(),
                    attempt,
                    error
                );
                return Err(WorkflowError::NonRetryable {
                    step_name: self.name().clone(),
                    attempt,
                    source: error,
                });
            }

            if attempt >= max_attempts {
                warn!(
                    "Step '{}' failed after {} attempt(s): {}",
                    self.name(),
                    attempt,
                    error
                );
                return Err(WorkflowError::RetryExhausted {
                    step_name: self.name().clone(),
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = retry.delay_for_attempt(attempt);
            info!(
                "Step '{}' failed: {}, retrying ({}/{}) in {:?}",
                self.name(),
                error,
                attempt + 1,
                max_attempts,
                delay
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn run_attempt(&self, ctx: &mut Context) -> Result<(), TaskError> {
        match self.config.timeout_limit() {
            // An elapsed attempt is dropped at its next await point; whatever
            // it already wrote to the context stays there.
            Some(limit) => match timeout(limit, self.task.run(ctx)).await {
                Ok(result) => result,
                Err(_) => Err(TaskError::timed_out(limit)),
            },
            None => self.task.run(ctx).await,
        }
    }
}
