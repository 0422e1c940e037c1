//! Capability contracts implemented by pipeline collaborators.
//!
//! The runtime only ever talks to user code through these traits: a
//! [`Source`] produces payloads, every stage wraps a [`Processor`], and a
//! [`Sink`] consumes whatever reaches the end of the pipeline.

use std::any::Any;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;

/// A unit of work flowing through the pipeline.
///
/// A payload is owned by exactly one stage at a time. The runtime calls
/// [`mark_as_processed`](Payload::mark_as_processed) exactly once per
/// payload: either when the sink has consumed it or when a stage discards
/// it.
pub trait Payload: Any + Send + Sync {
    /// Returns a new, independently owned deep copy of this payload.
    ///
    /// Broadcast stages use this to hand every sibling processor its own
    /// copy.
    fn clone_payload(&self) -> Box<dyn Payload>;

    /// Marks the payload as fully handled. Implementations should make
    /// this idempotent.
    fn mark_as_processed(&self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// What a stage should do with a payload after processing it.
pub enum StageOutcome {
    /// Forward the (possibly mutated) input payload to the next stage.
    Forward,
    /// Forward a different payload in place of the input. The input's
    /// downstream obligations transfer to the replacement.
    Replace(Box<dyn Payload>),
    /// Drop the input. The runner marks it as processed; nothing reaches
    /// the next stage.
    Discard,
}

/// Transforms payloads as part of a pipeline stage.
///
/// Implementations used inside pooled runners are invoked concurrently
/// and must be safe to share across workers.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Operates on the payload in place and decides its fate.
    async fn process(
        &self,
        ctx: &CancellationToken,
        payload: &mut dyn Payload,
    ) -> std::result::Result<StageOutcome, BoxError>;
}

/// A processor that forwards every payload untouched.
pub struct PassthroughProcessor;

#[async_trait]
impl Processor for PassthroughProcessor {
    async fn process(
        &self,
        _ctx: &CancellationToken,
        _payload: &mut dyn Payload,
    ) -> std::result::Result<StageOutcome, BoxError> {
        Ok(StageOutcome::Forward)
    }
}

/// Produces the payloads that enter a pipeline.
#[async_trait]
pub trait Source: Send {
    /// Advances to the next payload, returning `false` once the source
    /// is exhausted or has failed.
    async fn next(&mut self, ctx: &CancellationToken) -> bool;

    /// Returns the payload fetched by the last successful call to
    /// [`next`](Source::next).
    fn payload(&mut self) -> Box<dyn Payload>;

    /// Returns the error that stopped iteration, if any.
    fn error(&mut self) -> Option<BoxError>;
}

/// Consumes payloads that have traversed the whole pipeline.
#[async_trait]
pub trait Sink: Send {
    /// Handles a payload emitted by the final stage. The runtime marks
    /// the payload as processed after `consume` returns successfully.
    async fn consume(
        &mut self,
        ctx: &CancellationToken,
        payload: &dyn Payload,
    ) -> std::result::Result<(), BoxError>;
}
