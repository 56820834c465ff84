//! Workflow error types.

use crate::context::ContextKey;
use crate::step::StepName;
use crate::validation::ValidationIssue;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used as the cause of a [`TaskError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The lifecycle hook that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookType {
    /// Runs once before the first step.
    BeforeWorkflow,
    /// Runs once after the last step succeeded.
    AfterWorkflow,
    /// Runs before every step.
    BeforeStep,
    /// Runs after every successful step.
    AfterStep,
    /// Runs when a step fails.
    OnError,
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookType::BeforeWorkflow => write!(f, "before_workflow"),
            HookType::AfterWorkflow => write!(f, "after_workflow"),
            HookType::BeforeStep => write!(f, "before_step"),
            HookType::AfterStep => write!(f, "after_step"),
            HookType::OnError => write!(f, "on_error"),
        }
    }
}

/// Where a context validation ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationScope {
    /// Validator attached to a single step.
    Step(StepName),
    /// Validator attached to a whole workflow.
    Workflow(String),
}

impl fmt::Display for ValidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationScope::Step(name) => write!(f, "step '{}'", name),
            ValidationScope::Workflow(name) => write!(f, "workflow '{}'", name),
        }
    }
}

/// Failure reported by a task, hook or predicate.
///
/// Carries a human readable message and, optionally, the error that caused
/// it. Anything implementing `std::error::Error` converts into a `TaskError`
/// through [`TaskError::from_source`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TaskError {
    message: String,
    timed_out: bool,
    #[source]
    source: Option<BoxError>,
}

impl TaskError {
    /// Creates an error from a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
            source: None,
        }
    }

    /// Wraps another error, reusing its message.
    pub fn from_source(source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            message: source.to_string(),
            timed_out: false,
            source: Some(source),
        }
    }

    /// An attempt that exceeded its time limit.
    pub fn timed_out(limit: Duration) -> Self {
        Self {
            message: format!("timed out after {:?}", limit),
            timed_out: true,
            source: None,
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if the attempt was cancelled by its timeout.
    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<ContextError> for TaskError {
    fn from(error: ContextError) -> Self {
        Self::from_source(error)
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(error: serde_json::Error) -> Self {
        Self::from_source(error)
    }
}

impl From<std::io::Error> for TaskError {
    fn from(error: std::io::Error) -> Self {
        Self::from_source(error)
    }
}

/// Typed access to a [`Context`](crate::Context) failed.
#[derive(Error, Debug)]
pub enum ContextError {
    /// No value is stored under the key.
    #[error("context key '{0}' not found")]
    MissingKey(ContextKey),

    /// The stored value does not deserialize into the requested type.
    #[error("context key '{key}' has an unexpected type: {source}")]
    TypeMismatch {
        key: ContextKey,
        #[source]
        source: serde_json::Error,
    },

    /// The value could not be serialized into the context.
    #[error("could not serialize value for context key '{key}': {source}")]
    Serialize {
        key: ContextKey,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur during workflow execution.
///
/// Every failure a caller can observe from `Workflow::execute` is one of
/// these variants, so validation failures, exhausted retries, vetoed retries
/// and hook failures can be told apart with a `match`.
///
/// ```
/// use kumihimo_core::WorkflowError;
///
/// fn describe(error: &WorkflowError) -> String {
///     match error {
///         WorkflowError::ValidationFailed { scope, .. } => format!("bad input for {}", scope),
///         WorkflowError::RetryExhausted { step_name, attempts, .. } => {
///             format!("{} gave up after {} attempts", step_name, attempts)
///         }
///         WorkflowError::NonRetryable { step_name, .. } => format!("{} failed for good", step_name),
///         WorkflowError::HookFailed { hook, .. } => format!("hook {} failed", hook),
///         _ => error.to_string(),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// A validator rejected the context.
    #[error("Context validation failed for {scope}: {}", join_messages(.issues))]
    ValidationFailed {
        /// Step or workflow that owned the validator.
        scope: ValidationScope,
        /// Everything the validator reported.
        issues: Vec<ValidationIssue>,
    },

    /// Every permitted attempt failed.
    #[error("Step '{step_name}' failed after {attempts} attempt(s). Last error: {source}")]
    RetryExhausted {
        /// The step that failed.
        step_name: StepName,
        /// How many attempts were made.
        attempts: u32,
        /// Error from the last attempt.
        #[source]
        source: TaskError,
    },

    /// The retry predicate refused to retry an error.
    #[error("Step '{step_name}' failed on attempt {attempt} (not retried): {source}")]
    NonRetryable {
        /// The step that failed.
        step_name: StepName,
        /// The attempt that produced the error.
        attempt: u32,
        /// The rejected error.
        #[source]
        source: TaskError,
    },

    /// A lifecycle hook failed.
    #[error("Hook '{hook}' failed{}: {source}", hook_location(.step_name))]
    HookFailed {
        /// Which hook failed.
        hook: HookType,
        /// The step being run, for step-level hooks.
        step_name: Option<StepName>,
        /// The hook's error.
        #[source]
        source: TaskError,
    },

    /// The workflow definition is invalid.
    #[error("Invalid workflow configuration: {0}")]
    Configuration(String),
}

impl WorkflowError {
    /// Returns the step this error is attributed to, if any.
    pub fn step_name(&self) -> Option<&StepName> {
        match self {
            WorkflowError::ValidationFailed {
                scope: ValidationScope::Step(name),
                ..
            } => Some(name),
            WorkflowError::RetryExhausted { step_name, .. }
            | WorkflowError::NonRetryable { step_name, .. } => Some(step_name),
            WorkflowError::HookFailed { step_name, .. } => step_name.as_ref(),
            _ => None,
        }
    }
}

fn join_messages(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn hook_location(step_name: &Option<StepName>) -> String {
    match step_name {
        Some(name) => format!(" in step '{}'", name),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::PathSegment;

    #[test]
    fn test_validation_error_display() {
        let error = WorkflowError::ValidationFailed {
            scope: ValidationScope::Step(StepName::new("set-email")),
            issues: vec![
                ValidationIssue::new(vec![PathSegment::key("email")], "invalid email"),
                ValidationIssue::new(vec![PathSegment::key("age")], "too young"),
            ],
        };
        assert_eq!(
            error.to_string(),
            "Context validation failed for step 'set-email': invalid email, too young"
        );
        assert_eq!(error.step_name().map(|n| n.as_str()), Some("set-email"));

        let error = WorkflowError::ValidationFailed {
            scope: ValidationScope::Workflow("user-workflow".into()),
            issues: vec![ValidationIssue::root("missing fields")],
        };
        assert_eq!(
            error.to_string(),
            "Context validation failed for workflow 'user-workflow': missing fields"
        );
        assert!(error.step_name().is_none());
    }

    #[test]
    fn test_retry_exhausted_display() {
        let error = WorkflowError::RetryExhausted {
            step_name: StepName::new("fetch"),
            attempts: 3,
            source: TaskError::new("connection refused"),
        };
        assert_eq!(
            error.to_string(),
            "Step 'fetch' failed after 3 attempt(s). Last error: connection refused"
        );
    }

    #[test]
    fn test_hook_error_display() {
        let error = WorkflowError::HookFailed {
            hook: HookType::BeforeStep,
            step_name: Some(StepName::new("load")),
            source: TaskError::new("audit log unavailable"),
        };
        assert_eq!(
            error.to_string(),
            "Hook 'before_step' failed in step 'load': audit log unavailable"
        );

        let error = WorkflowError::HookFailed {
            hook: HookType::AfterWorkflow,
            step_name: None,
            source: TaskError::new("flush failed"),
        };
        assert_eq!(error.to_string(), "Hook 'after_workflow' failed: flush failed");
    }

    #[test]
    fn test_task_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let error = TaskError::from(io);
        assert_eq!(error.message(), "missing.csv");
        assert!(std::error::Error::source(&error).is_some());
        assert!(!error.is_timeout());

        let timeout = TaskError::timed_out(Duration::from_millis(50));
        assert!(timeout.is_timeout());
        assert_eq!(timeout.to_string(), "timed out after 50ms");
    }

    #[test]
    fn test_hook_type_display() {
        assert_eq!(HookType::BeforeWorkflow.to_string(), "before_workflow");
        assert_eq!(HookType::OnError.to_string(), "on_error");
    }
}
