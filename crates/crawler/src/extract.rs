//! Link extraction stage.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use webrover_pipeline::{BoxError, Payload, Processor, StageOutcome};

use crate::fetch::{PrivateNetworkDetector, EXCLUDED_EXTENSIONS};
use crate::payload::crawler_payload;

/// Extracts the outgoing links of a fetched page.
///
/// Relative links are resolved against the page URL (or the `<base>`
/// tag when present), duplicates and non-HTML targets are skipped, and
/// links annotated with rel="nofollow" are kept apart so ranking passes
/// can ignore them.
pub struct LinkExtractor {
    detector: Arc<dyn PrivateNetworkDetector>,
    base_href: Regex,
    find_link: Regex,
    no_follow: Regex,
    excluded: Regex,
}

impl LinkExtractor {
    pub fn new(detector: Arc<dyn PrivateNetworkDetector>) -> Self {
        Self {
            detector,
            base_href: Regex::new(r#"(?i)<base.*?href\s*?=\s*?"(.*?)\s*?""#)
                .expect("static pattern"),
            find_link: Regex::new(r#"(?i)<a.*?href\s*?=\s*?"\s*?(.*?)\s*?".*?>"#)
                .expect("static pattern"),
            no_follow: Regex::new(r#"(?i)rel\s*?=\s*?"?nofollow"?"#).expect("static pattern"),
            excluded: Regex::new(EXCLUDED_EXTENSIONS).expect("static pattern"),
        }
    }

    /// Whether an extracted link is worth keeping: http(s) scheme, and
    /// either on the same host as the page or on a public network.
    async fn retain_link(&self, src_host: &str, link: &Url) -> bool {
        if link.scheme() != "http" && link.scheme() != "https" {
            return false;
        }
        let Some(host) = link.host_str() else {
            return false;
        };
        if host == src_host {
            return true;
        }
        !self.detector.is_private(host).await.unwrap_or(true)
    }
}

#[async_trait]
impl Processor for LinkExtractor {
    async fn process(
        &self,
        _ctx: &CancellationToken,
        payload: &mut dyn Payload,
    ) -> std::result::Result<StageOutcome, BoxError> {
        let payload = crawler_payload(payload)?;

        // Relative links are qualified against the page URL unless a
        // <base> tag overrides it.
        let mut rel_to = Url::parse(&payload.url)?;
        let content = payload.raw_content.clone();
        if let Some(captures) = self.base_href.captures(&content) {
            let base = ensure_trailing_slash(&captures[1]);
            if let Some(resolved) = resolve_url(&rel_to, &base) {
                rel_to = resolved;
            }
        }

        let src_host = rel_to.host_str().unwrap_or_default().to_string();
        let mut seen: HashSet<String> = HashSet::new();
        for captures in self.find_link.captures_iter(&content) {
            let Some(mut link) = resolve_url(&rel_to, &captures[1]) else {
                continue;
            };
            if !self.retain_link(&src_host, &link).await {
                continue;
            }

            link.set_fragment(None);
            let link = link.to_string();
            if seen.contains(&link) || self.excluded.is_match(&link) {
                continue;
            }
            seen.insert(link.clone());

            if self.no_follow.is_match(&captures[0]) {
                payload.no_follow_links.push(link);
            } else {
                payload.links.push(link);
            }
        }
        tracing::trace!(
            url = %payload.url,
            links = payload.links.len(),
            no_follow = payload.no_follow_links.len(),
            "extracted links"
        );

        Ok(StageOutcome::Forward)
    }
}

fn resolve_url(rel_to: &Url, target: &str) -> Option<Url> {
    if target.is_empty() {
        return None;
    }
    rel_to.join(target).ok()
}

fn ensure_trailing_slash(s: &str) -> String {
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{s}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::CrawlerPayload;
    use webrover_linkstore::Link;

    struct NeverPrivate;

    #[async_trait]
    impl PrivateNetworkDetector for NeverPrivate {
        async fn is_private(&self, _host: &str) -> std::result::Result<bool, BoxError> {
            Ok(false)
        }
    }

    struct AlwaysPrivate;

    #[async_trait]
    impl PrivateNetworkDetector for AlwaysPrivate {
        async fn is_private(&self, _host: &str) -> std::result::Result<bool, BoxError> {
            Ok(true)
        }
    }

    async fn extract(detector: Arc<dyn PrivateNetworkDetector>, url: &str, content: &str) -> CrawlerPayload {
        let mut payload = CrawlerPayload::from_link(&Link::new(url));
        payload.raw_content = content.to_string();
        let extractor = LinkExtractor::new(detector);
        let outcome = extractor
            .process(&CancellationToken::new(), &mut payload)
            .await
            .unwrap();
        assert!(matches!(outcome, StageOutcome::Forward));
        payload
    }

    #[tokio::test]
    async fn resolves_relative_links() {
        let payload = extract(
            Arc::new(NeverPrivate),
            "https://example.com/docs/index.html",
            r#"<a href="./guide.html">guide</a> <a href="/about">about</a>"#,
        )
        .await;

        assert_eq!(
            payload.links,
            vec![
                "https://example.com/docs/guide.html",
                "https://example.com/about",
            ]
        );
    }

    #[tokio::test]
    async fn honours_base_tags() {
        let payload = extract(
            Arc::new(NeverPrivate),
            "https://example.com/deep/page.html",
            r#"<head><base href="https://example.com/root"></head><a href="leaf.html">x</a>"#,
        )
        .await;

        assert_eq!(payload.links, vec!["https://example.com/root/leaf.html"]);
    }

    #[tokio::test]
    async fn separates_nofollow_links() {
        let payload = extract(
            Arc::new(NeverPrivate),
            "https://example.com/",
            r#"<a href="/a">a</a> <a href="/b" rel="nofollow">b</a>"#,
        )
        .await;

        assert_eq!(payload.links, vec!["https://example.com/a"]);
        assert_eq!(payload.no_follow_links, vec!["https://example.com/b"]);
    }

    #[tokio::test]
    async fn deduplicates_and_strips_fragments() {
        let payload = extract(
            Arc::new(NeverPrivate),
            "https://example.com/",
            r#"<a href="/page#top">1</a> <a href="/page#bottom">2</a>"#,
        )
        .await;

        assert_eq!(payload.links, vec!["https://example.com/page"]);
    }

    #[tokio::test]
    async fn skips_non_http_schemes_and_binary_targets() {
        let payload = extract(
            Arc::new(NeverPrivate),
            "https://example.com/",
            r#"<a href="mailto:a@b.c">mail</a> <a href="/logo.png">logo</a> <a href="/ok">ok</a>"#,
        )
        .await;

        assert_eq!(payload.links, vec!["https://example.com/ok"]);
    }

    #[tokio::test]
    async fn keeps_same_host_links_even_on_private_networks() {
        let payload = extract(
            Arc::new(AlwaysPrivate),
            "https://intranet.test/",
            r#"<a href="/local">local</a> <a href="https://other.test/x">other</a>"#,
        )
        .await;

        assert_eq!(payload.links, vec!["https://intranet.test/local"]);
    }
}
