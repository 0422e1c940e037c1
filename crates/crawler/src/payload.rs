//! The payload flowing through the crawl pipeline.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use webrover_linkstore::Link;
use webrover_pipeline::{BoxError, Payload};

/// Accumulates everything the stages learn about one crawled link.
pub struct CrawlerPayload {
    pub link_id: Uuid,
    pub url: String,
    pub retrieved_at: DateTime<Utc>,

    /// Raw page body filled in by the fetch stage.
    pub raw_content: String,

    /// Links extracted from the page that rank passes should follow.
    pub links: Vec<String>,
    /// Links annotated with rel="nofollow".
    pub no_follow_links: Vec<String>,

    /// Page title extracted by the text stage.
    pub title: String,
    /// Visible text extracted by the text stage.
    pub text_content: String,

    processed: AtomicBool,
}

impl CrawlerPayload {
    pub fn from_link(link: &Link) -> Self {
        Self {
            link_id: link.id,
            url: link.url.clone(),
            retrieved_at: link.retrieved_at,
            raw_content: String::new(),
            links: Vec::new(),
            no_follow_links: Vec::new(),
            title: String::new(),
            text_content: String::new(),
            processed: AtomicBool::new(false),
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed.load(Ordering::SeqCst)
    }
}

impl Payload for CrawlerPayload {
    fn clone_payload(&self) -> Box<dyn Payload> {
        Box::new(Self {
            link_id: self.link_id,
            url: self.url.clone(),
            retrieved_at: self.retrieved_at,
            raw_content: self.raw_content.clone(),
            links: self.links.clone(),
            no_follow_links: self.no_follow_links.clone(),
            title: self.title.clone(),
            text_content: self.text_content.clone(),
            processed: AtomicBool::new(false),
        })
    }

    fn mark_as_processed(&self) {
        self.processed.store(true, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Downcasts a pipeline payload to the crawler's concrete type.
pub(crate) fn crawler_payload(
    payload: &mut dyn Payload,
) -> std::result::Result<&mut CrawlerPayload, BoxError> {
    payload
        .as_any_mut()
        .downcast_mut::<CrawlerPayload>()
        .ok_or_else(|| BoxError::from("unexpected payload type in crawl pipeline"))
}
