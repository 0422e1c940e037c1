//! Error types for the graph engine.

use thiserror::Error;

use crate::queue::QueueError;

/// Boxed error type produced by user-supplied compute functions and
/// executor callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience result type using [`GraphError`].
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by graph operations and superstep execution.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph was constructed with an invalid configuration.
    #[error("invalid graph configuration: {0}")]
    Config(String),

    /// `add_edge` was called with a source vertex that is not local.
    #[error("edge from {src} to {dst}: source vertex is not part of the graph")]
    UnknownEdgeSource { src: String, dst: String },

    /// A message destination resolved to neither a local vertex nor a
    /// remote one known to the relayer.
    #[error("message cannot be delivered to {0}: invalid destination")]
    InvalidDestination(String),

    /// Sentinel returned by [`Relayer`](crate::graph::Relayer)
    /// implementations to signal that the destination belongs to the
    /// local graph. Never surfaced to callers; the graph consumes it.
    #[error("message destination {0} is owned by the local graph")]
    DestinationIsLocal(String),

    /// The compute function failed for a vertex.
    #[error("compute failed for vertex {vertex}: {source}")]
    Compute {
        vertex: String,
        source: BoxError,
    },

    /// A per-vertex message queue operation failed.
    #[error("message queue for vertex {vertex}: {source}")]
    Queue {
        vertex: String,
        source: QueueError,
    },

    /// An executor callback failed.
    #[error("executor callback: {0}")]
    Callback(#[source] BoxError),

    /// The graph's worker pool has been shut down.
    #[error("graph has been closed")]
    Closed,

    /// The supplied context was cancelled.
    #[error("context cancelled")]
    Cancelled,
}
