//! # webrover-linkstore - the crawled link graph
//!
//! Models the web as a graph of [`Link`]s connected by directed
//! [`Edge`]s, behind the [`LinkStore`] capability that the crawler and
//! any future scorer consume. Stores partition their contents by UUID
//! range so independent workers can process disjoint slices of the
//! graph in parallel.

mod memory;

pub use memory::InMemoryLinkStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Convenience result type using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by link store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A lookup referenced an id that is not in the store.
    #[error("not found")]
    NotFound,

    /// An edge referenced a source or destination link that is not in
    /// the store.
    #[error("unknown source or destination link")]
    UnknownEdgeLinks,
}

/// A crawled (or discovered) page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Store-assigned identifier; [`Uuid::nil`] until upserted.
    pub id: Uuid,
    pub url: String,
    /// When the page contents were last fetched.
    pub retrieved_at: DateTime<Utc>,
}

impl Link {
    /// A link that has never been retrieved.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            url: url.into(),
            retrieved_at: DateTime::<Utc>::MIN_UTC,
        }
    }
}

/// A directed connection between two links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Store-assigned identifier; [`Uuid::nil`] until upserted.
    pub id: Uuid,
    pub src: Uuid,
    pub dst: Uuid,
    /// When the edge was last observed by the crawler.
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(src: Uuid, dst: Uuid) -> Self {
        Self {
            id: Uuid::nil(),
            src,
            dst,
            updated_at: DateTime::<Utc>::MIN_UTC,
        }
    }
}

/// Iterator over a partition of links.
pub type LinkIterator = Box<dyn Iterator<Item = Link> + Send>;

/// Iterator over a partition of edges.
pub type EdgeIterator = Box<dyn Iterator<Item = Edge> + Send>;

/// The persistence capability consumed by the crawler.
pub trait LinkStore: Send + Sync {
    /// Inserts `link` or refreshes the stored entry with the same URL,
    /// returning the stored value (with its assigned id and the most
    /// recent retrieval time).
    fn upsert_link(&self, link: Link) -> Result<Link>;

    /// Fetches a link by id.
    fn find_link(&self, id: Uuid) -> Result<Link>;

    /// Inserts `edge` or refreshes the timestamp of the stored edge
    /// between the same endpoints, returning the stored value. Both
    /// endpoints must already be present.
    fn upsert_edge(&self, edge: Edge) -> Result<Edge>;

    /// Removes every edge originating at `from` whose `updated_at` is
    /// older than `updated_before`.
    fn remove_stale_edges(&self, from: Uuid, updated_before: DateTime<Utc>) -> Result<()>;

    /// Iterates the links whose id falls in `[from, to)` and whose
    /// `retrieved_at` is older than `retrieved_before`.
    fn links(
        &self,
        from: Uuid,
        to: Uuid,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkIterator>;

    /// Iterates the edges whose source link id falls in `[from, to)`
    /// and whose `updated_at` is older than `updated_before`.
    fn edges(&self, from: Uuid, to: Uuid, updated_before: DateTime<Utc>) -> Result<EdgeIterator>;
}
