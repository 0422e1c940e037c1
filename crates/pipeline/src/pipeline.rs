//! Pipeline assembly and execution.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::contracts::{Sink, Source};
use crate::error::{MultiError, PipelineError};
use crate::params::{try_emit, BoxPayload, ErrorSender, PayloadReceiver, StageParams};
use crate::runners::StageRunner;

/// A linear composition of stage runners.
///
/// Payloads produced by a [`Source`] traverse every stage in order and
/// end at a [`Sink`]. The pipeline owns no worker state between runs and
/// can execute multiple times.
pub struct Pipeline {
    stages: Vec<Arc<dyn StageRunner>>,
}

impl Pipeline {
    /// Creates a pipeline whose payloads traverse `stages` in order.
    pub fn new(stages: Vec<Arc<dyn StageRunner>>) -> Self {
        Self { stages }
    }

    /// The number of stages in this pipeline.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Reads the source to exhaustion, sending every payload through the
    /// stages and into the sink.
    ///
    /// Blocks until all data has been processed, an error occurs, or the
    /// supplied context is cancelled. All spawned tasks are awaited
    /// before returning; every error published during the run is
    /// collected into the returned [`MultiError`].
    pub async fn process<S, K>(
        &self,
        ctx: &CancellationToken,
        source: S,
        sink: K,
    ) -> std::result::Result<(), MultiError>
    where
        S: Source + 'static,
        K: Sink + 'static,
    {
        let child = ctx.child_token();
        let stage_count = self.stages.len();

        // A buffered error channel with room for one error per stage
        // plus the source and sink workers.
        let (err_tx, mut err_rx) = mpsc::channel::<PipelineError>(stage_count + 2);
        let mut workers = Vec::with_capacity(stage_count + 2);

        // Wire the stages together: the output channel of stage i is the
        // input channel of stage i+1. Each stage task owns its output
        // sender, so returning from `run` closes the downstream channel.
        let (source_tx, rx) = mpsc::channel::<BoxPayload>(1);
        let mut upstream = PayloadReceiver::new(rx);
        for (index, stage) in self.stages.iter().enumerate() {
            let (tx, rx) = mpsc::channel::<BoxPayload>(1);
            let params = StageParams::new(index, upstream, tx, err_tx.clone());
            upstream = PayloadReceiver::new(rx);

            let stage = stage.clone();
            let token = child.clone();
            workers.push(tokio::spawn(async move {
                stage.run(&token, params).await;
                tracing::trace!(stage = index, "stage runner finished");
            }));
        }

        workers.push(tokio::spawn(source_worker(
            child.clone(),
            source,
            source_tx,
            err_tx.clone(),
        )));
        workers.push(tokio::spawn(sink_worker(
            child.clone(),
            sink,
            upstream,
            err_tx.clone(),
        )));

        // The workers hold the remaining sender clones; dropping ours
        // lets the drain loop below observe the channel closing once
        // every worker has exited.
        drop(err_tx);

        let mut aggregate = MultiError::new();
        while let Some(err) = err_rx.recv().await {
            // The first error triggers a shutdown of the whole pipeline.
            child.cancel();
            aggregate.push(err);
        }

        let _ = join_all(workers).await;
        child.cancel();

        if ctx.is_cancelled() {
            aggregate.push(PipelineError::Cancelled);
        }
        aggregate.into_result()
    }
}

/// Iterates the source and publishes each payload into the head channel.
async fn source_worker<S: Source>(
    ctx: CancellationToken,
    mut source: S,
    output: mpsc::Sender<BoxPayload>,
    errors: ErrorSender,
) {
    while source.next(&ctx).await {
        let payload = source.payload();
        tokio::select! {
            _ = ctx.cancelled() => return,
            sent = output.send(payload) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }

    if let Some(err) = source.error() {
        try_emit(&errors, PipelineError::Source(err));
    }
}

/// Drains the tail channel into the sink, marking each payload processed
/// once the sink accepts it.
async fn sink_worker<K: Sink>(
    ctx: CancellationToken,
    mut sink: K,
    input: PayloadReceiver,
    errors: ErrorSender,
) {
    loop {
        let payload = tokio::select! {
            _ = ctx.cancelled() => return,
            payload = input.recv() => match payload {
                Some(payload) => payload,
                None => return,
            },
        };

        if let Err(err) = sink.consume(&ctx, payload.as_ref()).await {
            try_emit(&errors, PipelineError::Sink(err));
            return;
        }
        payload.mark_as_processed();
    }
}
