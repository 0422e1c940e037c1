//! Channel wiring handed to stage runners.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::contracts::Payload;
use crate::error::PipelineError;

/// A payload travelling between stages.
pub type BoxPayload = Box<dyn Payload>;

/// Sending half of a payload channel.
pub type PayloadSender = mpsc::Sender<BoxPayload>;

/// Sending half of the shared error channel.
pub type ErrorSender = mpsc::Sender<PipelineError>;

/// Receiving half of a payload channel.
///
/// Cloneable so that the workers of a pooled stage can compete for
/// payloads from the same upstream channel.
#[derive(Clone)]
pub struct PayloadReceiver {
    inner: Arc<Mutex<mpsc::Receiver<BoxPayload>>>,
}

impl PayloadReceiver {
    pub fn new(rx: mpsc::Receiver<BoxPayload>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// Receives the next payload, or `None` once the channel is closed
    /// and fully drained.
    pub async fn recv(&self) -> Option<BoxPayload> {
        self.inner.lock().await.recv().await
    }
}

/// The wiring a stage runner receives for one pipeline execution: its
/// position, a receive-only input, a send-only output and a send-only
/// error channel.
#[derive(Clone)]
pub struct StageParams {
    stage: usize,
    input: PayloadReceiver,
    output: PayloadSender,
    errors: ErrorSender,
}

impl StageParams {
    pub fn new(
        stage: usize,
        input: PayloadReceiver,
        output: PayloadSender,
        errors: ErrorSender,
    ) -> Self {
        Self {
            stage,
            input,
            output,
            errors,
        }
    }

    /// The position of this stage in the pipeline.
    pub fn stage_index(&self) -> usize {
        self.stage
    }

    pub fn input(&self) -> &PayloadReceiver {
        &self.input
    }

    pub fn output(&self) -> &PayloadSender {
        &self.output
    }

    /// Rewires these params to a different input channel, keeping the
    /// stage index, output and error channels. Used by runners that fan
    /// payloads out to inner workers over private channels.
    pub fn with_input(&self, input: PayloadReceiver) -> StageParams {
        StageParams {
            stage: self.stage,
            input,
            output: self.output.clone(),
            errors: self.errors.clone(),
        }
    }

    /// Best-effort error publication: the error is dropped when the
    /// buffer is already full.
    pub fn emit_error(&self, err: PipelineError) {
        try_emit(&self.errors, err);
    }
}

/// Attempts to queue `err` on the buffered error channel, dropping it if
/// the channel is full or closed.
pub(crate) fn try_emit(errors: &ErrorSender, err: PipelineError) {
    if let Err(dropped) = errors.try_send(err) {
        tracing::debug!(error = %dropped, "error channel full, dropping error");
    }
}
