//! Single-worker FIFO stage runner.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::contracts::{Processor, StageOutcome};
use crate::error::PipelineError;
use crate::params::{BoxPayload, StageParams};
use crate::runners::StageRunner;

/// Processes payloads one at a time, preserving their order.
pub struct Fifo {
    proc: Arc<dyn Processor>,
}

impl Fifo {
    pub fn new(proc: Arc<dyn Processor>) -> Self {
        Self { proc }
    }
}

#[async_trait]
impl StageRunner for Fifo {
    async fn run(&self, ctx: &CancellationToken, params: StageParams) {
        loop {
            let payload = tokio::select! {
                _ = ctx.cancelled() => return,
                payload = params.input().recv() => match payload {
                    Some(payload) => payload,
                    None => return,
                },
            };

            if !run_one(self.proc.as_ref(), ctx, &params, payload).await {
                return;
            }
        }
    }
}

/// Runs the processor on a single payload and forwards the result.
///
/// Returns `false` when the stage should stop: the processor failed, the
/// context fired while forwarding, or the downstream receiver is gone.
pub(crate) async fn run_one(
    proc: &dyn Processor,
    ctx: &CancellationToken,
    params: &StageParams,
    mut payload: BoxPayload,
) -> bool {
    let payload = match proc.process(ctx, payload.as_mut()).await {
        Ok(StageOutcome::Forward) => payload,
        Ok(StageOutcome::Replace(next)) => next,
        Ok(StageOutcome::Discard) => {
            payload.mark_as_processed();
            return true;
        }
        Err(source) => {
            tracing::debug!(stage = params.stage_index(), "processor failed");
            params.emit_error(PipelineError::Stage {
                stage: params.stage_index(),
                source,
            });
            return false;
        }
    };

    tokio::select! {
        _ = ctx.cancelled() => false,
        sent = params.output().send(payload) => sent.is_ok(),
    }
}
