//! Broadcast stage runner fanning every payload out to sibling
//! processors.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::contracts::Processor;
use crate::error::{PipelineError, Result};
use crate::params::{PayloadReceiver, StageParams};
use crate::runners::fifo::Fifo;
use crate::runners::StageRunner;

/// Runs one inner FIFO per processor, each wired to a private input
/// channel while sharing the parent stage's output and error channels.
///
/// Every incoming payload is delivered to all K processors: the first
/// receives the original, the remaining K-1 receive independent clones.
pub struct Broadcast {
    fifos: Vec<Arc<Fifo>>,
}

impl std::fmt::Debug for Broadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcast")
            .field("fifos", &self.fifos.len())
            .finish()
    }
}

impl Broadcast {
    pub fn new(procs: Vec<Arc<dyn Processor>>) -> Result<Self> {
        if procs.is_empty() {
            return Err(PipelineError::Config(
                "broadcast requires at least one processor".into(),
            ));
        }
        Ok(Self {
            fifos: procs
                .into_iter()
                .map(|proc| Arc::new(Fifo::new(proc)))
                .collect(),
        })
    }
}

#[async_trait]
impl StageRunner for Broadcast {
    async fn run(&self, ctx: &CancellationToken, params: StageParams) {
        let mut inputs = Vec::with_capacity(self.fifos.len());
        let mut workers = Vec::with_capacity(self.fifos.len());

        for fifo in &self.fifos {
            let (tx, rx) = mpsc::channel(1);
            let worker_params = params.with_input(PayloadReceiver::new(rx));
            let fifo = fifo.clone();
            let token = ctx.clone();
            workers.push(tokio::spawn(async move {
                fifo.run(&token, worker_params).await;
            }));
            inputs.push(tx);
        }

        'dispatch: loop {
            let payload = tokio::select! {
                _ = ctx.cancelled() => break,
                payload = params.input().recv() => match payload {
                    Some(payload) => payload,
                    None => break,
                },
            };

            // Clones go out first; the original is delivered last so the
            // first processor never pays for a copy.
            for input in inputs.iter().skip(1).rev() {
                let copy = payload.clone_payload();
                tokio::select! {
                    _ = ctx.cancelled() => break 'dispatch,
                    sent = input.send(copy) => {
                        if sent.is_err() {
                            break 'dispatch;
                        }
                    }
                }
            }
            tokio::select! {
                _ = ctx.cancelled() => break 'dispatch,
                sent = inputs[0].send(payload) => {
                    if sent.is_err() {
                        break 'dispatch;
                    }
                }
            }
        }

        // Closing the private inputs lets the inner FIFOs drain and exit.
        drop(inputs);
        for worker in workers {
            let _ = worker.await;
        }
    }
}
