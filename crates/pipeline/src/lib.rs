//! # webrover-pipeline - streaming pipeline runtime
//!
//! A generic multi-stage pipeline: payloads produced by a [`Source`]
//! traverse an ordered list of stages and end at a [`Sink`]. Each stage
//! wraps a user [`Processor`] in a [`StageRunner`] that decides the
//! stage's concurrency strategy:
//!
//! - [`Fifo`] - one in-flight payload, order preserving
//! - [`FixedWorkerPool`] - a fixed pool of workers over one input
//! - [`DynamicWorkerPool`] - demand-driven workers with a hard cap
//! - [`Broadcast`] - clone fan-out to several sibling processors
//!
//! Stages communicate over capacity-1 channels so a slow stage applies
//! backpressure all the way to the source. Cancellation flows through a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) derived
//! per run; any published error cancels it, and `process` only returns
//! once every spawned task has exited.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use webrover_pipeline::{Fifo, Pipeline};
//!
//! let pipeline = Pipeline::new(vec![
//!     Arc::new(Fifo::new(fetcher)),
//!     Arc::new(Fifo::new(extractor)),
//! ]);
//! pipeline.process(&CancellationToken::new(), source, sink).await?;
//! ```

mod contracts;
mod error;
mod params;
mod pipeline;
mod runners;

pub use contracts::{PassthroughProcessor, Payload, Processor, Sink, Source, StageOutcome};
pub use error::{BoxError, MultiError, PipelineError, Result};
pub use params::{BoxPayload, ErrorSender, PayloadReceiver, PayloadSender, StageParams};
pub use pipeline::Pipeline;
pub use runners::{Broadcast, DynamicWorkerPool, Fifo, FixedWorkerPool, StageRunner};
