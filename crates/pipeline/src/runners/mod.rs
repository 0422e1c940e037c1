//! Stage runners: the concurrency strategies that wrap a [`Processor`].
//!
//! Four strategies are provided:
//!
//! - [`Fifo`] - one worker, order preserving
//! - [`FixedWorkerPool`] - N workers draining the same input
//! - [`DynamicWorkerPool`] - demand-driven workers capped at M in flight
//! - [`Broadcast`] - fan-out of every payload to K sibling processors
//!
//! [`Processor`]: crate::contracts::Processor

mod broadcast;
mod fifo;
mod pool;

pub use broadcast::Broadcast;
pub use fifo::Fifo;
pub use pool::{DynamicWorkerPool, FixedWorkerPool};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::params::StageParams;

/// A pipeline stage execution strategy.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Reads payloads from the stage input, hands them to the wrapped
    /// processor and forwards results downstream.
    ///
    /// Calls to `run` block until the input channel is closed and
    /// drained, the context is cancelled, or a processor error has been
    /// published.
    async fn run(&self, ctx: &CancellationToken, params: StageParams);
}
