//! Pooled stage runners.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::contracts::Processor;
use crate::error::{PipelineError, Result};
use crate::params::StageParams;
use crate::runners::fifo::{run_one, Fifo};
use crate::runners::StageRunner;

/// A fixed pool of FIFO workers draining the same input channel.
///
/// Payload order is not preserved across workers. `run` returns once
/// every worker has returned.
pub struct FixedWorkerPool {
    workers: Vec<Fifo>,
}

impl std::fmt::Debug for FixedWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWorkerPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl FixedWorkerPool {
    /// Builds a pool of `workers` FIFO runners sharing `proc`.
    pub fn new(proc: Arc<dyn Processor>, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(PipelineError::Config(
                "fixed worker pool requires at least one worker".into(),
            ));
        }
        Ok(Self {
            workers: (0..workers).map(|_| Fifo::new(proc.clone())).collect(),
        })
    }
}

#[async_trait]
impl StageRunner for FixedWorkerPool {
    async fn run(&self, ctx: &CancellationToken, params: StageParams) {
        join_all(
            self.workers
                .iter()
                .map(|worker| worker.run(ctx, params.clone())),
        )
        .await;
    }
}

/// A demand-driven pool that processes up to `max_workers` payloads
/// concurrently.
///
/// Each payload acquires a token before a worker task is spawned for it;
/// the token returns to the pool when the task finishes. On shutdown the
/// runner reclaims every token, guaranteeing that no in-flight task
/// outlives the stage.
pub struct DynamicWorkerPool {
    proc: Arc<dyn Processor>,
    max_workers: usize,
}

impl std::fmt::Debug for DynamicWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicWorkerPool")
            .field("max_workers", &self.max_workers)
            .finish()
    }
}

impl DynamicWorkerPool {
    pub fn new(proc: Arc<dyn Processor>, max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(PipelineError::Config(
                "dynamic worker pool requires a positive worker cap".into(),
            ));
        }
        Ok(Self { proc, max_workers })
    }
}

#[async_trait]
impl StageRunner for DynamicWorkerPool {
    async fn run(&self, ctx: &CancellationToken, params: StageParams) {
        // The token bucket lives for one run so the runner can be reused
        // across pipeline executions.
        let permits = Arc::new(Semaphore::new(self.max_workers));

        loop {
            let payload = tokio::select! {
                _ = ctx.cancelled() => break,
                payload = params.input().recv() => match payload {
                    Some(payload) => payload,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = ctx.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let proc = self.proc.clone();
            let params = params.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                run_one(proc.as_ref(), &ctx, &params, payload).await;
            });
        }

        // Reclaim the full token pool before returning.
        let _ = permits.acquire_many(self.max_workers as u32).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::PassthroughProcessor;

    #[test]
    fn fixed_pool_rejects_zero_workers() {
        let err = FixedWorkerPool::new(Arc::new(PassthroughProcessor), 0).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn dynamic_pool_rejects_zero_cap() {
        let err = DynamicWorkerPool::new(Arc::new(PassthroughProcessor), 0).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
