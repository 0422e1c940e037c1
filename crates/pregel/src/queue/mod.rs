//! Message queue abstraction backing per-vertex mailboxes.
//!
//! Every vertex owns a pair of queues indexed by superstep parity: at
//! superstep `s` workers consume queue `s % 2` while new messages land
//! in queue `(s + 1) % 2`. Alternative implementations (durable,
//! remote, FIFO) may replace the in-memory one provided they honour
//! this capability set; delivery order is not part of the contract.

mod memory;

pub use memory::InMemoryQueue;

use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by queue implementations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue has been closed and can no longer accept messages.
    #[error("queue is closed")]
    Closed,

    /// Implementation-specific failure (I/O, transport, ...).
    #[error("{0}")]
    Other(String),
}

/// A bag of messages owned by a single vertex.
///
/// Enqueueing is safe from any number of producers; iteration is
/// single-consumer (the owning vertex during its compute invocation).
pub trait Queue<M>: Send + Sync {
    /// Appends a message to the queue.
    fn enqueue(&self, message: M) -> Result<(), QueueError>;

    /// Whether the queue currently holds any messages.
    fn has_pending(&self) -> bool;

    /// Drops every queued message.
    fn discard(&self) -> Result<(), QueueError>;

    /// Releases any resources held by the queue.
    fn close(&self) -> Result<(), QueueError>;

    /// Returns a single-consumer iterator over the queued messages.
    fn messages(&self) -> Box<dyn MessageIter<M> + '_>;
}

/// Single-consumer cursor over a queue's messages.
///
/// Not safe to share between threads; each compute invocation receives
/// its own.
pub trait MessageIter<M> {
    /// Dequeues and returns the next message, or `None` once drained.
    fn next_message(&mut self) -> Option<M>;

    /// The error that terminated iteration early, if any.
    fn error(&self) -> Option<QueueError>;
}

/// Creates fresh queues for newly added vertices.
pub type QueueFactory<M> = Arc<dyn Fn() -> Arc<dyn Queue<M>> + Send + Sync>;

/// A [`QueueFactory`] producing [`InMemoryQueue`]s.
pub fn in_memory_queue_factory<M: Send + Sync + 'static>() -> QueueFactory<M> {
    Arc::new(|| Arc::new(InMemoryQueue::new()))
}
