//! # webrover-crawler - the crawl pipeline
//!
//! Wires the generic pipeline runtime into a web crawler. Given an
//! iterator of links, the [`Crawler`]:
//!
//! 1. retrieves each page over HTTP (a fixed pool of fetch workers),
//! 2. extracts and resolves the links it contains,
//! 3. extracts the page title and visible text, and
//! 4. fans out to two sibling stages that update the
//!    [link graph](webrover_linkstore) and feed the
//!    [text index](webrover_textindex).
//!
//! The HTTP client and private-network policy are capabilities
//! ([`UrlGetter`], [`PrivateNetworkDetector`]) so tests and alternative
//! transports can slot in without touching the stages.

mod crawler;
mod extract;
mod fetch;
mod index_docs;
mod payload;
mod text;
mod update_graph;

pub use crawler::{Crawler, CrawlerConfig};
pub use extract::LinkExtractor;
pub use fetch::{
    DefaultNetworkDetector, HttpGetter, LinkFetcher, PrivateNetworkDetector, UrlGetter,
    UrlResponse,
};
pub use index_docs::DocumentIndexer;
pub use payload::CrawlerPayload;
pub use text::TextExtractor;
pub use update_graph::GraphUpdater;
