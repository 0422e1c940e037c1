//! Fetch stage: retrieves page contents over HTTP.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use webrover_pipeline::{BoxError, Payload, Processor, StageOutcome};

use crate::payload::crawler_payload;

/// File extensions that are known to contain binary or non-indexable
/// content.
pub(crate) const EXCLUDED_EXTENSIONS: &str = r"(?i)\.(?:jpg|jpeg|png|gif|ico|css|js)$";

/// Performs HTTP GET requests on behalf of the fetch stage.
#[async_trait]
pub trait UrlGetter: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<UrlResponse, BoxError>;
}

/// The parts of an HTTP response the crawler cares about.
pub struct UrlResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// [`UrlGetter`] backed by a shared [`reqwest::Client`].
#[derive(Default)]
pub struct HttpGetter {
    client: reqwest::Client,
}

impl HttpGetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UrlGetter for HttpGetter {
    async fn get(&self, url: &str) -> std::result::Result<UrlResponse, BoxError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;
        Ok(UrlResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Detects whether a host resolves to a private network address.
#[async_trait]
pub trait PrivateNetworkDetector: Send + Sync {
    async fn is_private(&self, host: &str) -> std::result::Result<bool, BoxError>;
}

/// Detector covering loopback, RFC 1918 ranges, link-local addresses
/// and the literal `localhost`. Hostnames are not resolved.
pub struct DefaultNetworkDetector;

#[async_trait]
impl PrivateNetworkDetector for DefaultNetworkDetector {
    async fn is_private(&self, host: &str) -> std::result::Result<bool, BoxError> {
        let private = match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => {
                ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified()
            }
            Ok(IpAddr::V6(ip)) => {
                // Unique-local fc00::/7 and link-local fe80::/10.
                ip.is_loopback()
                    || ip.is_unspecified()
                    || (ip.segments()[0] & 0xfe00) == 0xfc00
                    || (ip.segments()[0] & 0xffc0) == 0xfe80
            }
            Err(_) => host.eq_ignore_ascii_case("localhost"),
        };
        Ok(private)
    }
}

/// Retrieves the contents of each payload's URL.
///
/// Payloads are discarded rather than failed when they cannot or should
/// not be fetched: skipping a link is not worth terminating the whole
/// crawl.
pub struct LinkFetcher {
    getter: Arc<dyn UrlGetter>,
    detector: Arc<dyn PrivateNetworkDetector>,
    excluded: Regex,
}

impl LinkFetcher {
    pub fn new(getter: Arc<dyn UrlGetter>, detector: Arc<dyn PrivateNetworkDetector>) -> Self {
        Self {
            getter,
            detector,
            excluded: Regex::new(EXCLUDED_EXTENSIONS).expect("static pattern"),
        }
    }

    async fn points_to_private_network(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return true;
        };
        self.detector.is_private(host).await.unwrap_or(true)
    }
}

#[async_trait]
impl Processor for LinkFetcher {
    async fn process(
        &self,
        _ctx: &CancellationToken,
        payload: &mut dyn Payload,
    ) -> std::result::Result<StageOutcome, BoxError> {
        let payload = crawler_payload(payload)?;

        if self.excluded.is_match(&payload.url) {
            return Ok(StageOutcome::Discard);
        }

        let Ok(url) = Url::parse(&payload.url) else {
            tracing::debug!(url = %payload.url, "skipping unparsable url");
            return Ok(StageOutcome::Discard);
        };
        if self.points_to_private_network(&url).await {
            return Ok(StageOutcome::Discard);
        }

        let response = match self.getter.get(&payload.url).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(url = %payload.url, %error, "fetch failed, skipping link");
                return Ok(StageOutcome::Discard);
            }
        };

        if !(200..300).contains(&response.status) {
            return Ok(StageOutcome::Discard);
        }
        if !response.content_type.contains("html") {
            return Ok(StageOutcome::Discard);
        }

        payload.raw_content = response.body;
        Ok(StageOutcome::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::CrawlerPayload;
    use webrover_linkstore::Link;

    struct StubGetter {
        status: u16,
        content_type: &'static str,
        body: &'static str,
    }

    #[async_trait]
    impl UrlGetter for StubGetter {
        async fn get(&self, _url: &str) -> std::result::Result<UrlResponse, BoxError> {
            Ok(UrlResponse {
                status: self.status,
                content_type: self.content_type.to_string(),
                body: self.body.to_string(),
            })
        }
    }

    struct NeverPrivate;

    #[async_trait]
    impl PrivateNetworkDetector for NeverPrivate {
        async fn is_private(&self, _host: &str) -> std::result::Result<bool, BoxError> {
            Ok(false)
        }
    }

    fn payload_for(url: &str) -> CrawlerPayload {
        CrawlerPayload::from_link(&Link::new(url))
    }

    async fn outcome_for(fetcher: &LinkFetcher, url: &str) -> (StageOutcome, CrawlerPayload) {
        let mut payload = payload_for(url);
        let outcome = fetcher
            .process(&CancellationToken::new(), &mut payload)
            .await
            .unwrap();
        (outcome, payload)
    }

    #[tokio::test]
    async fn fetches_html_pages() {
        let fetcher = LinkFetcher::new(
            Arc::new(StubGetter {
                status: 200,
                content_type: "text/html; charset=utf-8",
                body: "<html>hello</html>",
            }),
            Arc::new(NeverPrivate),
        );

        let (outcome, payload) = outcome_for(&fetcher, "https://example.com/index.html").await;
        assert!(matches!(outcome, StageOutcome::Forward));
        assert_eq!(payload.raw_content, "<html>hello</html>");
    }

    #[tokio::test]
    async fn discards_binary_extensions_without_fetching() {
        let fetcher = LinkFetcher::new(
            Arc::new(StubGetter {
                status: 200,
                content_type: "text/html",
                body: "",
            }),
            Arc::new(NeverPrivate),
        );

        let (outcome, _) = outcome_for(&fetcher, "https://example.com/logo.PNG").await;
        assert!(matches!(outcome, StageOutcome::Discard));
    }

    #[tokio::test]
    async fn discards_non_success_statuses() {
        let fetcher = LinkFetcher::new(
            Arc::new(StubGetter {
                status: 404,
                content_type: "text/html",
                body: "",
            }),
            Arc::new(NeverPrivate),
        );

        let (outcome, _) = outcome_for(&fetcher, "https://example.com/gone").await;
        assert!(matches!(outcome, StageOutcome::Discard));
    }

    #[tokio::test]
    async fn discards_non_html_content() {
        let fetcher = LinkFetcher::new(
            Arc::new(StubGetter {
                status: 200,
                content_type: "application/json",
                body: "{}",
            }),
            Arc::new(NeverPrivate),
        );

        let (outcome, _) = outcome_for(&fetcher, "https://example.com/api").await;
        assert!(matches!(outcome, StageOutcome::Discard));
    }

    #[tokio::test]
    async fn discards_private_hosts() {
        let fetcher = LinkFetcher::new(
            Arc::new(StubGetter {
                status: 200,
                content_type: "text/html",
                body: "",
            }),
            Arc::new(DefaultNetworkDetector),
        );

        let (outcome, _) = outcome_for(&fetcher, "http://192.168.0.1/admin").await;
        assert!(matches!(outcome, StageOutcome::Discard));
    }

    #[tokio::test]
    async fn default_detector_classifies_addresses() {
        let detector = DefaultNetworkDetector;
        assert!(detector.is_private("127.0.0.1").await.unwrap());
        assert!(detector.is_private("10.1.2.3").await.unwrap());
        assert!(detector.is_private("localhost").await.unwrap());
        assert!(detector.is_private("::1").await.unwrap());
        assert!(!detector.is_private("93.184.216.34").await.unwrap());
        assert!(!detector.is_private("example.com").await.unwrap());
    }
}
