//! Crawl pipeline assembly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use webrover_linkstore::{Link, LinkStore};
use webrover_pipeline::{
    BoxError, Broadcast, Fifo, FixedWorkerPool, MultiError, Payload, Pipeline, Processor, Sink,
    Source, StageRunner,
};
use webrover_textindex::Indexer;

use crate::extract::LinkExtractor;
use crate::fetch::{LinkFetcher, PrivateNetworkDetector, UrlGetter};
use crate::index_docs::DocumentIndexer;
use crate::payload::CrawlerPayload;
use crate::text::TextExtractor;
use crate::update_graph::GraphUpdater;

/// Collaborators and tuning knobs for a [`Crawler`].
pub struct CrawlerConfig {
    pub getter: Arc<dyn UrlGetter>,
    pub detector: Arc<dyn PrivateNetworkDetector>,
    pub store: Arc<dyn LinkStore>,
    pub indexer: Arc<dyn Indexer>,
    /// Number of concurrent fetch workers.
    pub fetch_workers: usize,
}

/// A web-page crawling pipeline:
///
/// 1. fetch the page contents (worker pool)
/// 2. extract and resolve the page's links
/// 3. extract the page title and visible text
/// 4. in parallel, update the link graph and index the text
pub struct Crawler {
    pipeline: Pipeline,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> webrover_pipeline::Result<Self> {
        let fetch = FixedWorkerPool::new(
            Arc::new(LinkFetcher::new(config.getter, config.detector.clone())),
            config.fetch_workers,
        )?;
        let persist = Broadcast::new(vec![
            Arc::new(GraphUpdater::new(config.store)) as Arc<dyn Processor>,
            Arc::new(DocumentIndexer::new(config.indexer)) as Arc<dyn Processor>,
        ])?;

        let stages: Vec<Arc<dyn StageRunner>> = vec![
            Arc::new(fetch),
            Arc::new(Fifo::new(Arc::new(LinkExtractor::new(config.detector)))),
            Arc::new(Fifo::new(Arc::new(TextExtractor::new()))),
            Arc::new(persist),
        ];
        Ok(Self {
            pipeline: Pipeline::new(stages),
        })
    }

    /// Sends every link yielded by `links` through the crawl pipeline,
    /// returning how many made it all the way through.
    ///
    /// The links should originate from the link store so they carry
    /// valid ids. Blocks until the iterator is exhausted, an error
    /// occurs, or the context is cancelled.
    pub async fn crawl<I>(
        &self,
        ctx: &CancellationToken,
        links: I,
    ) -> std::result::Result<usize, MultiError>
    where
        I: Iterator<Item = Link> + Send + 'static,
    {
        let sink = CountingSink::default();
        let consumed = sink.counter();

        self.pipeline
            .process(ctx, LinkSource::new(links), sink)
            .await?;

        // The final broadcast emits two payloads per crawled link.
        Ok(consumed.load(Ordering::SeqCst) / 2)
    }
}

/// Adapts a link iterator to the pipeline's source contract.
struct LinkSource<I> {
    links: I,
    current: Option<Link>,
}

impl<I> LinkSource<I> {
    fn new(links: I) -> Self {
        Self {
            links,
            current: None,
        }
    }
}

#[async_trait]
impl<I> Source for LinkSource<I>
where
    I: Iterator<Item = Link> + Send,
{
    async fn next(&mut self, _ctx: &CancellationToken) -> bool {
        self.current = self.links.next();
        self.current.is_some()
    }

    fn payload(&mut self) -> Box<dyn Payload> {
        let link = self.current.take().expect("payload requested before next");
        Box::new(CrawlerPayload::from_link(&link))
    }

    fn error(&mut self) -> Option<BoxError> {
        None
    }
}

/// Counts consumed payloads; the crawl has no further use for them.
#[derive(Default)]
struct CountingSink {
    consumed: Arc<AtomicUsize>,
}

impl CountingSink {
    fn counter(&self) -> Arc<AtomicUsize> {
        self.consumed.clone()
    }
}

#[async_trait]
impl Sink for CountingSink {
    async fn consume(
        &mut self,
        _ctx: &CancellationToken,
        _payload: &dyn Payload,
    ) -> std::result::Result<(), BoxError> {
        self.consumed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
