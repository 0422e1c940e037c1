//! Link-graph update stage (one arm of the final broadcast).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use webrover_linkstore::{Edge, Link, LinkStore};
use webrover_pipeline::{BoxError, Payload, Processor, StageOutcome};

use crate::payload::crawler_payload;

/// Upserts the crawled page and every discovered link, connects them
/// with edges, then sweeps edges that were not re-observed by this
/// crawl.
pub struct GraphUpdater {
    store: Arc<dyn LinkStore>,
}

impl GraphUpdater {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Processor for GraphUpdater {
    async fn process(
        &self,
        _ctx: &CancellationToken,
        payload: &mut dyn Payload,
    ) -> std::result::Result<StageOutcome, BoxError> {
        let payload = crawler_payload(payload)?;

        let mut src = Link::new(payload.url.clone());
        src.retrieved_at = Utc::now();
        let src = self.store.upsert_link(src)?;
        payload.link_id = src.id;

        // No-follow links become part of the graph but get no edge, so
        // ranking passes never follow them.
        for url in &payload.no_follow_links {
            self.store.upsert_link(Link::new(url.clone()))?;
        }

        let removal_cutoff = Utc::now();
        for url in &payload.links {
            let dst = self.store.upsert_link(Link::new(url.clone()))?;
            self.store.upsert_edge(Edge::new(src.id, dst.id))?;
        }
        // Edges refreshed above carry a newer timestamp and survive.
        self.store.remove_stale_edges(src.id, removal_cutoff)?;

        Ok(StageOutcome::Forward)
    }
}
