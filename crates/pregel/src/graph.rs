//! Parallel graph processor based on the bulk-synchronous-parallel
//! model described in the Pregel paper.
//!
//! A [`Graph`] owns a map of vertices, each with a double-buffered
//! message mailbox, and a fixed pool of workers that execute the
//! configured [`Compute`] implementation on every eligible vertex once
//! per superstep. Messages sent during superstep `s` are delivered at
//! superstep `s + 1`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::aggregator::Aggregator;
use crate::error::{BoxError, GraphError, Result};
use crate::queue::{MessageIter, Queue, QueueFactory};

/// User-supplied vertex program, invoked once per eligible vertex per
/// superstep.
///
/// Implementations are shared across the worker pool and must be safe
/// to call concurrently for different vertices. Any closure with the
/// matching signature implements this trait.
pub trait Compute<V, E, M>: Send + Sync {
    fn compute(
        &self,
        graph: &Graph<V, E, M>,
        vertex: &Vertex<V, E, M>,
        messages: &mut dyn MessageIter<M>,
    ) -> std::result::Result<(), BoxError>;
}

impl<V, E, M, F> Compute<V, E, M> for F
where
    F: Fn(
            &Graph<V, E, M>,
            &Vertex<V, E, M>,
            &mut dyn MessageIter<M>,
        ) -> std::result::Result<(), BoxError>
        + Send
        + Sync,
{
    fn compute(
        &self,
        graph: &Graph<V, E, M>,
        vertex: &Vertex<V, E, M>,
        messages: &mut dyn MessageIter<M>,
    ) -> std::result::Result<(), BoxError> {
        self(graph, vertex, messages)
    }
}

/// Forwards messages to vertices managed by a remote graph instance.
///
/// Implementations must return
/// [`GraphError::DestinationIsLocal`] when the destination is not a
/// valid remote one, which tells the graph to report the send as
/// undeliverable. Any closure with the matching signature implements
/// this trait.
pub trait Relayer<M>: Send + Sync {
    fn relay(&self, dst: &str, message: M) -> Result<()>;
}

impl<M, F> Relayer<M> for F
where
    F: Fn(&str, M) -> Result<()> + Send + Sync,
{
    fn relay(&self, dst: &str, message: M) -> Result<()> {
        self(dst, message)
    }
}

/// A directed edge annotated with an opaque value. Edges are owned by
/// their source vertex; destinations may resolve to remote vertices.
#[derive(Debug, Clone)]
pub struct Edge<E> {
    dst_id: String,
    value: E,
}

impl<E> Edge<E> {
    /// The id of the destination vertex.
    pub fn dst_id(&self) -> &str {
        &self.dst_id
    }

    pub fn value(&self) -> &E {
        &self.value
    }
}

/// A vertex in the local graph: an id, an opaque value, an active flag,
/// its outgoing edges and a pair of message queues indexed by superstep
/// parity.
pub struct Vertex<V, E, M> {
    id: String,
    value: RwLock<V>,
    active: AtomicBool,
    edges: RwLock<Vec<Edge<E>>>,
    queues: [Arc<dyn Queue<M>>; 2],
}

impl<V, E, M> Vertex<V, E, M> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replaces the vertex value.
    ///
    /// The dispatcher hands a vertex to at most one worker per
    /// superstep, so the running compute invocation is the single
    /// writer.
    pub fn set_value(&self, value: V) {
        *self.value.write().unwrap() = value;
    }

    /// Marks the vertex as inactive. It will not be executed in
    /// following supersteps unless a message arrives for it.
    pub fn freeze(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl<V: Clone, E, M> Vertex<V, E, M> {
    /// A snapshot of the vertex value.
    pub fn value(&self) -> V {
        self.value.read().unwrap().clone()
    }
}

impl<V, E: Clone, M> Vertex<V, E, M> {
    /// A snapshot of the vertex's outgoing edges.
    pub fn edges(&self) -> Vec<Edge<E>> {
        self.edges.read().unwrap().clone()
    }
}

/// Configuration for [`Graph::new`].
pub struct GraphConfig<V, E, M> {
    /// The vertex program executed each superstep.
    pub compute: Arc<dyn Compute<V, E, M>>,
    /// Produces the two mailbox queues of every new vertex.
    pub queue_factory: QueueFactory<M>,
    /// Number of pool workers executing compute calls. Must be at
    /// least one.
    pub workers: usize,
}

struct GraphState<V, E, M> {
    superstep: AtomicUsize,
    vertices: RwLock<HashMap<String, Arc<Vertex<V, E, M>>>>,
    aggregators: RwLock<HashMap<String, Arc<dyn Aggregator>>>,
    relayer: RwLock<Option<Arc<dyn Relayer<M>>>>,
    compute: Arc<dyn Compute<V, E, M>>,
    queue_factory: QueueFactory<M>,

    // Worker coordination for the current superstep.
    active_in_step: AtomicU64,
    pending_in_step: AtomicI64,
    step_done: Notify,
    step_error: StdMutex<Option<GraphError>>,
    feed: StdMutex<Option<mpsc::Sender<Arc<Vertex<V, E, M>>>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

/// Handle to a BSP graph. Cheap to clone; every clone refers to the
/// same underlying graph.
pub struct Graph<V, E, M> {
    state: Arc<GraphState<V, E, M>>,
}

impl<V, E, M> Clone for Graph<V, E, M> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<V, E, M> Graph<V, E, M>
where
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    /// Builds a graph and starts its worker pool.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// [`GraphError::Config`] when the worker count is zero.
    pub fn new(config: GraphConfig<V, E, M>) -> Result<Self> {
        if config.workers == 0 {
            return Err(GraphError::Config(
                "compute workers must be at least one".into(),
            ));
        }

        let (feed_tx, feed_rx) = mpsc::channel::<Arc<Vertex<V, E, M>>>(1);
        let state = Arc::new(GraphState {
            superstep: AtomicUsize::new(0),
            vertices: RwLock::new(HashMap::new()),
            aggregators: RwLock::new(HashMap::new()),
            relayer: RwLock::new(None),
            compute: config.compute,
            queue_factory: config.queue_factory,
            active_in_step: AtomicU64::new(0),
            pending_in_step: AtomicI64::new(0),
            step_done: Notify::new(),
            step_error: StdMutex::new(None),
            feed: StdMutex::new(Some(feed_tx)),
            workers: StdMutex::new(Vec::new()),
        });

        let shared_feed = Arc::new(tokio::sync::Mutex::new(feed_rx));
        let mut handles = Vec::with_capacity(config.workers);
        for _ in 0..config.workers {
            handles.push(tokio::spawn(step_worker(
                Arc::clone(&state),
                Arc::clone(&shared_feed),
            )));
        }
        *state.workers.lock().unwrap() = handles;
        tracing::debug!(workers = config.workers, "graph worker pool started");

        Ok(Self { state })
    }

    /// Inserts a vertex with the given id and initial value. If the
    /// vertex already exists only its value is overwritten.
    pub fn add_vertex(&self, id: impl Into<String>, value: V) {
        let id = id.into();
        let mut vertices = self.state.vertices.write().unwrap();
        match vertices.get(&id) {
            Some(existing) => existing.set_value(value),
            None => {
                let vertex = Arc::new(Vertex {
                    id: id.clone(),
                    value: RwLock::new(value),
                    active: AtomicBool::new(true),
                    edges: RwLock::new(Vec::new()),
                    queues: [
                        (self.state.queue_factory)(),
                        (self.state.queue_factory)(),
                    ],
                });
                vertices.insert(id, vertex);
            }
        }
    }

    /// Appends a directed edge from `src` to `dst`.
    ///
    /// Edges are owned by their source, so `src` must resolve to a
    /// local vertex; `dst` is not validated and may be remote.
    pub fn add_edge(&self, src: &str, dst: impl Into<String>, value: E) -> Result<()> {
        let dst = dst.into();
        let vertices = self.state.vertices.read().unwrap();
        let vertex = vertices.get(src).ok_or_else(|| GraphError::UnknownEdgeSource {
            src: src.to_string(),
            dst: dst.clone(),
        })?;
        vertex.edges.write().unwrap().push(Edge { dst_id: dst, value });
        Ok(())
    }

    /// Looks up a local vertex by id.
    pub fn vertex(&self, id: &str) -> Option<Arc<Vertex<V, E, M>>> {
        self.state.vertices.read().unwrap().get(id).cloned()
    }

    /// The number of local vertices.
    pub fn vertex_count(&self) -> usize {
        self.state.vertices.read().unwrap().len()
    }

    /// Registers a named aggregator.
    pub fn register_aggregator(&self, name: impl Into<String>, aggregator: Arc<dyn Aggregator>) {
        self.state
            .aggregators
            .write()
            .unwrap()
            .insert(name.into(), aggregator);
    }

    /// Looks up a registered aggregator by name.
    pub fn aggregator(&self, name: &str) -> Option<Arc<dyn Aggregator>> {
        self.state.aggregators.read().unwrap().get(name).cloned()
    }

    /// A snapshot of all registered aggregators keyed by name.
    pub fn aggregators(&self) -> HashMap<String, Arc<dyn Aggregator>> {
        self.state.aggregators.read().unwrap().clone()
    }

    /// Registers the relayer used for non-local message destinations.
    pub fn register_relayer(&self, relayer: Arc<dyn Relayer<M>>) {
        *self.state.relayer.write().unwrap() = Some(relayer);
    }

    /// The current superstep number.
    pub fn superstep(&self) -> usize {
        self.state.superstep.load(Ordering::SeqCst)
    }

    /// Queues `message` for delivery to `dst` in the next superstep.
    ///
    /// Local destinations are enqueued directly; unknown ones are
    /// handed to the registered relayer. Fails with
    /// [`GraphError::InvalidDestination`] when neither resolves.
    pub fn send_message(&self, dst: &str, message: M) -> Result<()> {
        let target = self.state.vertices.read().unwrap().get(dst).cloned();
        if let Some(vertex) = target {
            let buffer = (self.superstep() + 1) % 2;
            return vertex
                .queues[buffer]
                .enqueue(message)
                .map_err(|source| GraphError::Queue {
                    vertex: dst.to_string(),
                    source,
                });
        }

        let relayer = self.state.relayer.read().unwrap().clone();
        if let Some(relayer) = relayer {
            return match relayer.relay(dst, message) {
                Err(GraphError::DestinationIsLocal(_)) => {
                    Err(GraphError::InvalidDestination(dst.to_string()))
                }
                other => other,
            };
        }

        Err(GraphError::InvalidDestination(dst.to_string()))
    }

    /// Resets superstep state: closes every vertex queue and clears the
    /// vertex and aggregator maps.
    pub fn reset(&self) -> Result<()> {
        self.state.superstep.store(0, Ordering::SeqCst);
        {
            let vertices = self.state.vertices.read().unwrap();
            for vertex in vertices.values() {
                for queue in &vertex.queues {
                    queue.close().map_err(|source| GraphError::Queue {
                        vertex: vertex.id.clone(),
                        source,
                    })?;
                }
            }
        }
        self.state.vertices.write().unwrap().clear();
        self.state.aggregators.write().unwrap().clear();
        Ok(())
    }

    /// Stops the worker pool and resets the graph. The single teardown
    /// path: every spawned worker is awaited before this returns.
    pub async fn close(&self) -> Result<()> {
        // Dropping the feed sender closes the channel; workers exit
        // once it drains.
        let feed = self.state.feed.lock().unwrap().take();
        drop(feed);

        let workers = std::mem::take(&mut *self.state.workers.lock().unwrap());
        for worker in workers {
            let _ = worker.await;
        }

        self.reset()
    }

    /// Executes the next superstep, returning the number of vertices
    /// that ran because they were active or had pending messages.
    pub(crate) async fn step(&self) -> Result<usize> {
        let state = &self.state;
        state.active_in_step.store(0, Ordering::SeqCst);

        let vertices: Vec<Arc<Vertex<V, E, M>>> = {
            let map = state.vertices.read().unwrap();
            map.values().cloned().collect()
        };
        state
            .pending_in_step
            .store(vertices.len() as i64, Ordering::SeqCst);
        if vertices.is_empty() {
            return Ok(0);
        }

        let feed = state
            .feed
            .lock()
            .unwrap()
            .clone()
            .ok_or(GraphError::Closed)?;
        for vertex in vertices {
            if feed.send(vertex).await.is_err() {
                return Err(GraphError::Closed);
            }
        }

        // Block until the worker that drains the pending counter to
        // zero signals completion of the barrier.
        state.step_done.notified().await;

        if let Some(err) = state.step_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(state.active_in_step.load(Ordering::SeqCst) as usize)
    }

    pub(crate) fn advance_superstep(&self) {
        self.state.superstep.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn zero_superstep(&self) {
        self.state.superstep.store(0, Ordering::SeqCst);
    }
}

impl<V, E, M> Graph<V, E, M>
where
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: Clone + Send + Sync + 'static,
{
    /// Broadcasts a message to every neighbour of `vertex`; delivery
    /// happens in the next superstep. The first failed send aborts the
    /// broadcast.
    pub fn broadcast_to_neighbors(&self, vertex: &Vertex<V, E, M>, message: M) -> Result<()> {
        let neighbors: Vec<String> = vertex
            .edges
            .read()
            .unwrap()
            .iter()
            .map(|edge| edge.dst_id.clone())
            .collect();
        for dst in neighbors {
            self.send_message(&dst, message.clone())?;
        }
        Ok(())
    }
}

/// Pool worker: polls the vertex feed and runs the compute function on
/// each vertex that is active or has pending inbound messages. Exits
/// when the feed channel is closed.
async fn step_worker<V, E, M>(
    state: Arc<GraphState<V, E, M>>,
    feed: Arc<tokio::sync::Mutex<mpsc::Receiver<Arc<Vertex<V, E, M>>>>>,
) where
    V: Send + Sync + 'static,
    E: Send + Sync + 'static,
    M: Send + Sync + 'static,
{
    loop {
        let vertex = { feed.lock().await.recv().await };
        let Some(vertex) = vertex else { break };

        let buffer = state.superstep.load(Ordering::SeqCst) % 2;
        if vertex.is_active() || vertex.queues[buffer].has_pending() {
            state.active_in_step.fetch_add(1, Ordering::SeqCst);
            vertex.set_active(true);

            let graph = Graph {
                state: Arc::clone(&state),
            };
            let mut messages = vertex.queues[buffer].messages();
            let result = state.compute.compute(&graph, &vertex, messages.as_mut());
            drop(messages);

            match result {
                Ok(()) => {
                    if let Err(source) = vertex.queues[buffer].discard() {
                        try_set_error(
                            &state.step_error,
                            GraphError::Queue {
                                vertex: vertex.id.clone(),
                                source,
                            },
                        );
                    }
                }
                Err(source) => {
                    try_set_error(
                        &state.step_error,
                        GraphError::Compute {
                            vertex: vertex.id.clone(),
                            source,
                        },
                    );
                }
            }
        }

        if state.pending_in_step.fetch_sub(1, Ordering::SeqCst) == 1 {
            state.step_done.notify_one();
        }
    }
}

/// Retains the first error of the superstep; later ones are dropped so
/// workers never block on error reporting.
fn try_set_error(slot: &StdMutex<Option<GraphError>>, err: GraphError) {
    let mut slot = slot.lock().unwrap();
    if slot.is_none() {
        *slot = Some(err);
    } else {
        tracing::debug!(error = %err, "superstep error slot occupied, dropping error");
    }
}
