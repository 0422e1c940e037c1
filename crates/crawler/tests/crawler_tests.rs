//! End-to-end crawl over a small stubbed site.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use webrover_crawler::{Crawler, CrawlerConfig, PrivateNetworkDetector, UrlGetter, UrlResponse};
use webrover_linkstore::{InMemoryLinkStore, Link, LinkStore};
use webrover_pipeline::BoxError;
use webrover_textindex::{InMemoryIndex, Indexer, Query};

/// Serves a fixed set of HTML pages.
struct StubSite {
    pages: HashMap<String, String>,
}

impl StubSite {
    fn new() -> Self {
        let mut pages = HashMap::new();
        pages.insert(
            "https://site.test/".to_string(),
            concat!(
                "<html><head><title>Home</title></head><body>",
                "Welcome to the landing page.",
                r#"<a href="/about">about us</a>"#,
                r#"<a href="/careers" rel="nofollow">careers</a>"#,
                "</body></html>",
            )
            .to_string(),
        );
        pages.insert(
            "https://site.test/about".to_string(),
            concat!(
                "<html><head><title>About</title></head><body>",
                "Everything about the project.",
                r#"<a href="/">home</a>"#,
                "</body></html>",
            )
            .to_string(),
        );
        Self { pages }
    }
}

#[async_trait]
impl UrlGetter for StubSite {
    async fn get(&self, url: &str) -> Result<UrlResponse, BoxError> {
        match self.pages.get(url) {
            Some(body) => Ok(UrlResponse {
                status: 200,
                content_type: "text/html; charset=utf-8".to_string(),
                body: body.clone(),
            }),
            None => Ok(UrlResponse {
                status: 404,
                content_type: "text/html".to_string(),
                body: String::new(),
            }),
        }
    }
}

struct NeverPrivate;

#[async_trait]
impl PrivateNetworkDetector for NeverPrivate {
    async fn is_private(&self, _host: &str) -> Result<bool, BoxError> {
        Ok(false)
    }
}

#[tokio::test]
async fn crawl_builds_the_graph_and_the_index() {
    let store = Arc::new(InMemoryLinkStore::new());
    let index = Arc::new(InMemoryIndex::new());

    // Seed the frontier the way a production run would: links come out
    // of the store and carry store-assigned ids.
    let home = store.upsert_link(Link::new("https://site.test/")).unwrap();
    let about = store
        .upsert_link(Link::new("https://site.test/about"))
        .unwrap();

    let crawler = Crawler::new(CrawlerConfig {
        getter: Arc::new(StubSite::new()),
        detector: Arc::new(NeverPrivate),
        store: store.clone(),
        indexer: index.clone(),
        fetch_workers: 2,
    })
    .unwrap();

    let crawled = crawler
        .crawl(
            &CancellationToken::new(),
            vec![home.clone(), about.clone()].into_iter(),
        )
        .await
        .expect("crawl failed");
    assert_eq!(crawled, 2);

    // The landing page links to /about and (nofollow) /careers; only
    // the former gets an edge.
    let cutoff = Utc::now() + Duration::hours(1);
    let edges: Vec<_> = store.edges(Uuid::nil(), Uuid::max(), cutoff).unwrap().collect();
    let careers = store
        .upsert_link(Link::new("https://site.test/careers"))
        .unwrap();
    assert!(
        edges
            .iter()
            .any(|e| e.src == home.id && e.dst == about.id),
        "home -> about edge missing"
    );
    assert!(
        edges.iter().all(|e| e.dst != careers.id),
        "nofollow links must not produce edges"
    );

    // Both pages are searchable by their extracted text.
    let doc = index.find_by_id(home.id).unwrap();
    assert_eq!(doc.title, "Home");
    assert!(doc.content.contains("landing page"));

    let hits: Vec<_> = index
        .search(Query::matching("project"))
        .unwrap()
        .collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].link_id, about.id);
}

#[tokio::test]
async fn unreachable_pages_are_skipped_not_fatal() {
    let store = Arc::new(InMemoryLinkStore::new());
    let index = Arc::new(InMemoryIndex::new());

    let missing = store
        .upsert_link(Link::new("https://site.test/missing"))
        .unwrap();

    let crawler = Crawler::new(CrawlerConfig {
        getter: Arc::new(StubSite::new()),
        detector: Arc::new(NeverPrivate),
        store: store.clone(),
        indexer: index.clone(),
        fetch_workers: 1,
    })
    .unwrap();

    let crawled = crawler
        .crawl(&CancellationToken::new(), vec![missing].into_iter())
        .await
        .expect("crawl failed");
    assert_eq!(crawled, 0, "a 404 page is discarded, not crawled");
}
