//! # webrover-textindex - full-text search over crawled pages
//!
//! Models the crawled pages as [`Document`]s behind the [`Indexer`]
//! capability: add or re-index documents, look them up by link id,
//! search by keyword match or exact phrase, and maintain each
//! document's score. The in-memory implementation keeps an inverted
//! index and is meant for tests and single-host deployments.

mod memory;
mod tokenizer;

pub use memory::InMemoryIndex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Convenience result type using [`IndexError`].
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors surfaced by indexer implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A lookup referenced a link id that has not been indexed.
    #[error("not found")]
    NotFound,

    /// The document carries a nil link id.
    #[error("document does not specify a valid link id")]
    MissingLinkId,
}

/// An indexed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Id of the link this document was crawled from.
    pub link_id: Uuid,
    pub url: String,
    /// Contents of the page's `<title>` element, if any.
    pub title: String,
    /// Block of text extracted from the page.
    pub content: String,
    /// When the document was last (re-)indexed.
    pub indexed_at: DateTime<Utc>,
    /// Score assigned by a ranking pass; used to order search results.
    pub page_rank: f64,
}

impl Document {
    pub fn new(link_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            link_id,
            url: url.into(),
            title: String::new(),
            content: String::new(),
            indexed_at: DateTime::<Utc>::MIN_UTC,
            page_rank: 0.0,
        }
    }
}

/// The kind of expression a [`Query`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    /// Match documents containing the query keywords in any order.
    Match,
    /// Match documents containing the exact phrase.
    Phrase,
}

/// A search request.
#[derive(Debug, Clone)]
pub struct Query {
    pub kind: QueryKind,
    /// The expression entered by the end user.
    pub expression: String,
    /// Number of results to skip, for pagination.
    pub offset: usize,
}

impl Query {
    pub fn matching(expression: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Match,
            expression: expression.into(),
            offset: 0,
        }
    }

    pub fn phrase(expression: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Phrase,
            expression: expression.into(),
            offset: 0,
        }
    }
}

/// One page of search results.
///
/// Iterates the matched documents in ranking order and reports the
/// total number of hits across all pages.
pub struct SearchResults {
    documents: std::vec::IntoIter<Document>,
    total_count: u64,
}

impl SearchResults {
    pub(crate) fn new(documents: Vec<Document>, total_count: u64) -> Self {
        Self {
            documents: documents.into_iter(),
            total_count,
        }
    }

    /// The total number of documents matching the query, across every
    /// result page.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }
}

impl Iterator for SearchResults {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        self.documents.next()
    }
}

/// The indexing capability consumed by the crawler and any search
/// front end.
pub trait Indexer: Send + Sync {
    /// Adds `doc` to the index, or re-indexes the existing document
    /// with the same link id when its content changed.
    fn index(&self, doc: Document) -> Result<Document>;

    /// Fetches an indexed document by link id.
    fn find_by_id(&self, link_id: Uuid) -> Result<Document>;

    /// Runs a query and returns one page of results.
    fn search(&self, query: Query) -> Result<SearchResults>;

    /// Updates the ranking score of the document with `link_id`,
    /// storing a placeholder when the document has not been indexed
    /// yet.
    fn update_score(&self, link_id: Uuid, score: f64) -> Result<()>;
}
