//! Concurrent fan-out over sub-workflows.

use crate::workflow::Workflow;
use futures::stream::{FuturesUnordered, StreamExt};
use kumihimo_core::{Context, StepName, WorkflowError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs several sub-workflows at once and merges what they changed.
///
/// Every sub-workflow starts from its own copy of the current context. Once
/// all of them have finished, the keys each one added or changed are merged
/// into the context in declaration order, so a key written by two
/// sub-workflows ends up with the value from the one declared last.
/// Sub-workflows run on the calling task; nothing is spawned.
///
/// If any sub-workflow fails, the others still run to completion, nothing is
/// merged, and the first failure (in completion order) is returned as is.
pub struct Parallel {
    name: StepName,
    workflows: Vec<Arc<Workflow>>,
}

impl fmt::Debug for Parallel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parallel")
            .field("name", &self.name)
            .field(
                "workflows",
                &self.workflows.iter().map(|w| w.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Parallel {
    pub const DEFAULT_NAME: &'static str = "parallel-step";

    pub fn new<I, W>(workflows: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: Into<Arc<Workflow>>,
    {
        Self {
            name: StepName::new(Self::DEFAULT_NAME),
            workflows: workflows.into_iter().map(Into::into).collect(),
        }
    }

    /// Overrides the name reported to hooks, metrics and errors.
    pub fn named(mut self, name: impl Into<StepName>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &StepName {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub(crate) async fn execute(&self, ctx: &mut Context) -> Result<(), WorkflowError> {
        let mut pending: FuturesUnordered<_> = self
            .workflows
            .iter()
            .enumerate()
            .map(|(index, workflow)| {
                let snapshot = ctx.clone();
                async move {
                    let outcome = workflow
                        .execute(&snapshot)
                        .await
                        .map(|result| result.changes_since(&snapshot));
                    (index, outcome)
                }
            })
            .collect();

        let mut deltas: Vec<Option<Context>> = vec![None; self.workflows.len()];
        let mut first_error = None;

        while let Some((index, outcome)) = pending.next().await {
            match outcome {
                Ok(delta) => {
                    debug!(
                        "Parallel '{}' branch {} finished with {} change(s)",
                        self.name,
                        index,
                        delta.len()
                    );
                    deltas[index] = Some(delta);
                }
                Err(error) => {
                    warn!("Parallel '{}' branch {} failed: {}", self.name, index, error);
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        for delta in deltas.into_iter().flatten() {
            ctx.merge(delta);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_parallel_is_noop() {
        let parallel = Parallel::new(Vec::<Workflow>::new());
        assert!(parallel.is_empty());

        let mut ctx = Context::new();
        ctx.insert("value", 1);
        let before = ctx.clone();
        parallel.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx, before);
    }

    #[tokio::test]
    async fn test_unchanged_keys_are_not_merged_back() {
        let overwrite = Workflow::builder()
            .add_fn("overwrite", |ctx| {
                ctx.insert("shared", 2);
                Ok(())
            })
            .build()
            .unwrap();
        let untouched = Workflow::builder()
            .add_fn("other", |ctx| {
                ctx.insert("other", true);
                Ok(())
            })
            .build()
            .unwrap();

        // The second branch still carries shared=1 from its copy, but since it
        // never changed it, the first branch's write survives.
        let parallel = Parallel::new([overwrite, untouched]).named("fan-out");
        assert_eq!(parallel.len(), 2);
        assert_eq!(parallel.name(), "fan-out");

        let mut ctx = Context::new();
        ctx.insert("shared", 1);
        parallel.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.get::<i64>("shared"), Some(2));
        assert_eq!(ctx.get::<bool>("other"), Some(true));
    }
}
