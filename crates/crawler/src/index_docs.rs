//! Document indexing stage (one arm of the final broadcast).

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use webrover_pipeline::{BoxError, Payload, Processor, StageOutcome};
use webrover_textindex::{Document, Indexer};

use crate::payload::crawler_payload;

/// Hands the extracted title and text of each crawled page to the
/// indexer.
pub struct DocumentIndexer {
    indexer: Arc<dyn Indexer>,
}

impl DocumentIndexer {
    pub fn new(indexer: Arc<dyn Indexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl Processor for DocumentIndexer {
    async fn process(
        &self,
        _ctx: &CancellationToken,
        payload: &mut dyn Payload,
    ) -> std::result::Result<StageOutcome, BoxError> {
        let payload = crawler_payload(payload)?;

        let mut doc = Document::new(payload.link_id, payload.url.clone());
        doc.title = payload.title.clone();
        doc.content = payload.text_content.clone();
        self.indexer.index(doc)?;

        Ok(StageOutcome::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::CrawlerPayload;
    use uuid::Uuid;
    use webrover_linkstore::Link;
    use webrover_textindex::{InMemoryIndex, Query};

    #[tokio::test]
    async fn indexes_the_extracted_text() {
        let index = Arc::new(InMemoryIndex::new());
        let mut link = Link::new("https://example.com/");
        link.id = Uuid::new_v4();

        let mut payload = CrawlerPayload::from_link(&link);
        payload.title = "Streaming pipelines".to_string();
        payload.text_content = "backpressure and barriers".to_string();

        let stage = DocumentIndexer::new(index.clone());
        let outcome = stage
            .process(&CancellationToken::new(), &mut payload)
            .await
            .unwrap();
        assert!(matches!(outcome, StageOutcome::Forward));

        let doc = index.find_by_id(link.id).unwrap();
        assert_eq!(doc.title, "Streaming pipelines");
        assert_eq!(index.search(Query::matching("barriers")).unwrap().count(), 1);
    }
}
