//! # webrover-pregel - BSP graph processing
//!
//! A vertex-centric graph processor following the bulk-synchronous-
//! parallel model of the Pregel paper. Computation advances in
//! **supersteps**: a fixed worker pool runs the configured [`Compute`]
//! implementation on every vertex that is either active or has pending
//! inbound messages, a barrier synchronizes the pool, and messages sent
//! during the step become visible at the next one through per-vertex
//! double-buffered mailboxes.
//!
//! The engine is generic over the vertex value `V`, the edge value `E`
//! and the message type `M`; it never inspects any of them. Remote
//! delivery is abstracted behind the [`Relayer`] contract, and named
//! [`Aggregator`]s let vertices coordinate global values across steps.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use webrover_pregel::{
//!     in_memory_queue_factory, Executor, ExecutorCallbacks, Graph, GraphConfig,
//! };
//!
//! let graph = Graph::new(GraphConfig {
//!     compute: Arc::new(MyProgram),
//!     queue_factory: in_memory_queue_factory(),
//!     workers: 4,
//! })?;
//! graph.add_vertex("a", 0.0);
//!
//! let executor = Executor::new(graph.clone(), ExecutorCallbacks::default());
//! executor.run_to_completion(&CancellationToken::new()).await?;
//! graph.close().await?;
//! ```

mod aggregator;
mod error;
mod executor;
mod graph;
mod queue;

pub use aggregator::{Aggregator, Float64Aggregator, IntAggregator};
pub use error::{BoxError, GraphError, Result};
pub use executor::{
    Executor, ExecutorCallbacks, PostStepFn, PostStepKeepRunningFn, PreStepFn,
};
pub use graph::{Compute, Edge, Graph, GraphConfig, Relayer, Vertex};
pub use queue::{
    in_memory_queue_factory, InMemoryQueue, MessageIter, Queue, QueueError, QueueFactory,
};
