//! Text extraction stage.

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use webrover_pipeline::{BoxError, Payload, Processor, StageOutcome};

use crate::payload::crawler_payload;

/// Extracts the page title and the visible text from the raw page
/// contents.
pub struct TextExtractor {
    title: Regex,
    hidden_blocks: Regex,
    tags: Regex,
    whitespace: Regex,
}

impl TextExtractor {
    pub fn new() -> Self {
        Self {
            title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static pattern"),
            hidden_blocks: Regex::new(
                r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>|<!--.*?-->",
            )
            .expect("static pattern"),
            tags: Regex::new(r"<[^>]*>").expect("static pattern"),
            whitespace: Regex::new(r"\s+").expect("static pattern"),
        }
    }

    fn clean(&self, fragment: &str) -> String {
        let stripped = self.tags.replace_all(fragment, " ");
        self.whitespace.replace_all(&stripped, " ").trim().to_string()
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for TextExtractor {
    async fn process(
        &self,
        _ctx: &CancellationToken,
        payload: &mut dyn Payload,
    ) -> std::result::Result<StageOutcome, BoxError> {
        let payload = crawler_payload(payload)?;

        if let Some(captures) = self.title.captures(&payload.raw_content) {
            payload.title = self.clean(&captures[1]);
        }

        let visible = self.hidden_blocks.replace_all(&payload.raw_content, " ");
        payload.text_content = self.clean(&visible);

        Ok(StageOutcome::Forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::CrawlerPayload;
    use webrover_linkstore::Link;

    async fn extract(content: &str) -> CrawlerPayload {
        let mut payload = CrawlerPayload::from_link(&Link::new("https://example.com"));
        payload.raw_content = content.to_string();
        let outcome = TextExtractor::new()
            .process(&CancellationToken::new(), &mut payload)
            .await
            .unwrap();
        assert!(matches!(outcome, StageOutcome::Forward));
        payload
    }

    #[tokio::test]
    async fn extracts_title_and_text() {
        let payload = extract(
            "<html><head><title> Hello,\n World </title></head><body><p>first</p><p>second</p></body></html>",
        )
        .await;

        assert_eq!(payload.title, "Hello, World");
        assert!(payload.text_content.contains("first second"));
    }

    #[tokio::test]
    async fn strips_scripts_styles_and_comments() {
        let payload = extract(
            "<body>keep <script>var hidden = 1;</script><style>p { color: red }</style><!-- note -->this</body>",
        )
        .await;

        assert_eq!(payload.text_content, "keep this");
    }

    #[tokio::test]
    async fn handles_pages_without_a_title() {
        let payload = extract("<body>plain</body>").await;
        assert_eq!(payload.title, "");
        assert_eq!(payload.text_content, "plain");
    }
}
