//! # Kumihimo (組紐)
//!
//! A composable async workflow engine for Rust.
//!
//! Kumihimo is the Japanese craft of braiding many threads into one cord.
//! This crate braids small units of work into one run: steps execute in
//! order over a shared [`Context`], retry with fixed or exponential backoff,
//! branch between sub-workflows with a [`Condition`], and fan out with
//! [`Parallel`] blocks. Lifecycle hooks, validators and metrics collectors
//! plug in through the traits in [`kumihimo_core`].
//!
//! # Example
//!
//! ```rust
//! use kumihimo::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), WorkflowError> {
//! let workflow = Workflow::builder()
//!     .name("greeting")
//!     .add_configured(
//!         StepConfig::new("load")
//!             .retry(RetryConfig::exponential(3, Duration::from_millis(10))),
//!         task_fn(|ctx| {
//!             Box::pin(async move {
//!                 ctx.insert("greeting", "Hello");
//!                 Ok(())
//!             })
//!         }),
//!     )
//!     .add_fn("decorate", |ctx| {
//!         let greeting: String = ctx.require("greeting")?;
//!         ctx.insert("greeting", format!("{}, kumihimo!", greeting));
//!         Ok(())
//!     })
//!     .build()?;
//!
//! let result = workflow.execute(&Context::new()).await?;
//! assert_eq!(result.get::<String>("greeting").as_deref(), Some("Hello, kumihimo!"));
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! ```rust
//! use kumihimo::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let workflow = Workflow::builder()
//!     .add_fn("explode", |_ctx| Err("boom".into()))
//!     .build()
//!     .expect("valid workflow");
//!
//! match workflow.execute(&Context::new()).await {
//!     Err(WorkflowError::RetryExhausted { step_name, attempts, source }) => {
//!         eprintln!("{} failed {} time(s): {}", step_name, attempts, source);
//!     }
//!     Err(other) => eprintln!("Error: {}", other),
//!     Ok(_) => unreachable!(),
//! }
//! # }
//! ```

mod condition;
mod metrics;
mod parallel;
mod step;
mod workflow;

// Re-export core types
pub use kumihimo_core::*;

pub use condition::{async_predicate, AsyncPredicate, Condition, ConditionBranch, Predicate};
pub use metrics::{InMemoryMetrics, TracingMetrics};
pub use parallel::Parallel;
pub use step::Step;
pub use workflow::{Workflow, WorkflowBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        sync_fn, task_fn, Backoff, Condition, ConditionBranch, Context, ContextKey,
        InMemoryMetrics, MetricsCollector, Parallel, RetryConfig, Step, StepConfig, StepName,
        Task, TaskError, Validator, Workflow, WorkflowBuilder, WorkflowError, WorkflowHooks,
    };
}
