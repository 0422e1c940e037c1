//! Superstep orchestration.
//!
//! An [`Executor`] wraps a [`Graph`] and drives supersteps until an
//! exit condition is met, invoking optional lifecycle callbacks around
//! each step.

use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, GraphError, Result};
use crate::graph::Graph;

/// Invoked before running the next superstep. A good place to prime
/// aggregators used during the step.
pub type PreStepFn<V, E, M> = Box<
    dyn Fn(&CancellationToken, &Graph<V, E, M>) -> std::result::Result<(), BoxError>
        + Send
        + Sync,
>;

/// Invoked after a superstep with the number of active vertices.
pub type PostStepFn<V, E, M> = Box<
    dyn Fn(&CancellationToken, &Graph<V, E, M>, usize) -> std::result::Result<(), BoxError>
        + Send
        + Sync,
>;

/// Invoked after a superstep to decide whether the run should
/// continue.
pub type PostStepKeepRunningFn<V, E, M> = Box<
    dyn Fn(&CancellationToken, &Graph<V, E, M>, usize) -> std::result::Result<bool, BoxError>
        + Send
        + Sync,
>;

/// Lifecycle callbacks for an [`Executor`]. All are optional; absent
/// callbacks behave as no-ops (keep-running defaults to `true`).
pub struct ExecutorCallbacks<V, E, M> {
    pub pre_step: Option<PreStepFn<V, E, M>>,
    pub post_step: Option<PostStepFn<V, E, M>>,
    pub post_step_keep_running: Option<PostStepKeepRunningFn<V, E, M>>,
}

impl<V, E, M> Default for ExecutorCallbacks<V, E, M> {
    fn default() -> Self {
        Self {
            pre_step: None,
            post_step: None,
            post_step_keep_running: None,
        }
    }
}

/// Drives a graph through supersteps until the context expires, an
/// error occurs, the step limit is reached, or the keep-running
/// predicate declines.
pub struct Executor<V, E, M> {
    graph: Graph<V, E, M>,
    callbacks: ExecutorCallbacks<V, E, M>,
}

impl<V, E, M> Executor<V, E, M>
where
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    /// Wraps `graph`, resetting its superstep counter to zero.
    pub fn new(graph: Graph<V, E, M>, callbacks: ExecutorCallbacks<V, E, M>) -> Self {
        graph.zero_superstep();
        Self { graph, callbacks }
    }

    pub fn graph(&self) -> &Graph<V, E, M> {
        &self.graph
    }

    pub fn superstep(&self) -> usize {
        self.graph.superstep()
    }

    /// Executes at most `num_steps` supersteps.
    pub async fn run_steps(&self, ctx: &CancellationToken, num_steps: usize) -> Result<()> {
        self.run(ctx, Some(num_steps)).await
    }

    /// Executes supersteps until a terminal condition fires.
    pub async fn run_to_completion(&self, ctx: &CancellationToken) -> Result<()> {
        self.run(ctx, None).await
    }

    async fn run(&self, ctx: &CancellationToken, max_steps: Option<usize>) -> Result<()> {
        let mut remaining = max_steps;
        loop {
            if remaining == Some(0) {
                return Ok(());
            }
            if ctx.is_cancelled() {
                return Err(GraphError::Cancelled);
            }

            if let Some(pre_step) = &self.callbacks.pre_step {
                pre_step(ctx, &self.graph).map_err(GraphError::Callback)?;
            }

            let active = self.graph.step().await?;
            tracing::trace!(superstep = self.graph.superstep(), active, "superstep complete");

            if let Some(post_step) = &self.callbacks.post_step {
                post_step(ctx, &self.graph, active).map_err(GraphError::Callback)?;
            }

            let keep_running = match &self.callbacks.post_step_keep_running {
                Some(keep_running) => {
                    keep_running(ctx, &self.graph, active).map_err(GraphError::Callback)?
                }
                None => true,
            };
            if !keep_running {
                return Ok(());
            }

            self.graph.advance_superstep();
            if let Some(left) = remaining.as_mut() {
                *left -= 1;
            }
        }
    }
}
