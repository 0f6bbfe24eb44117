//! Web page and PDF text extraction.
//!
//! URLs are fetched through ScraperAPI when its key is configured, falling
//! back to a plain GET. HTML is parsed with `scraper`; text nodes outside
//! `script`, `style`, `noscript` and `template` are kept, comments are
//! dropped, and whitespace is collapsed. PDFs go through `pdf-extract` on the
//! blocking pool.

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use notebook_rag_core::extract::{ExtractInput, Extracted, ExtractionStatus, Extractor};
use notebook_rag_core::NotebookError;

use crate::config::ExtractionConfig;

const SCRAPER_API_URL: &str = "https://api.scraperapi.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Domains that serve little beyond a JavaScript shell or block scrapers.
const BLOCKED_DOMAINS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "snapchat.com",
];

/// Phrases that mark an interstitial or error page.
const FAILURE_INDICATORS: &[&str] = &[
    "javascript is needed",
    "enable javascript",
    "please enable javascript",
    "javascript required",
    "this site requires javascript",
    "access denied",
    "forbidden",
    "page not found",
    "error 404",
    "error 403",
    "error 500",
    "temporarily unavailable",
    "maintenance mode",
    "under construction",
];

/// Only the head of the page is scanned for failure indicators.
const INDICATOR_WINDOW: usize = 1000;

/// Elements whose text never reaches the reader.
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));

/// [`Extractor`] backed by HTTP fetches and `pdf-extract`.
pub struct WebExtractor {
    client: reqwest::Client,
    scraper_api_key: Option<String>,
    scraper_api_url: String,
    min_content_chars: usize,
    max_content_chars: usize,
}

impl WebExtractor {
    pub fn new(config: &ExtractionConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        let scraper_api_key = std::env::var(&config.scraper_api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            client,
            scraper_api_key,
            scraper_api_url: SCRAPER_API_URL.to_string(),
            min_content_chars: config.min_content_chars,
            max_content_chars: config.max_content_chars,
        })
    }

    async fn fetch(&self, url: &str) -> Result<String, NotebookError> {
        if let Some(key) = &self.scraper_api_key {
            match self.fetch_via_scraper(key, url).await {
                Ok(body) => return Ok(body),
                Err(e) => warn!(url, error = %e, "ScraperAPI fetch failed, trying direct GET"),
            }
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NotebookError::ExtractionFailed(format!("GET {}: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotebookError::ExtractionFailed(format!(
                "GET {} returned {}",
                url, status
            )));
        }
        response
            .text()
            .await
            .map_err(|e| NotebookError::ExtractionFailed(format!("reading {}: {}", url, e)))
    }

    async fn fetch_via_scraper(&self, key: &str, url: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(&self.scraper_api_url)
            .query(&[("api_key", key), ("url", url)])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    fn finish(&self, url: &str, body: &str) -> Extracted {
        let document = Html::parse_document(body);
        let title = document_title(&document);
        let text = truncate_chars(&document_text(&document), self.max_content_chars);

        let status = match assess(url, &text, self.min_content_chars) {
            Ok(()) => ExtractionStatus::Ok,
            Err(reason) => {
                info!(url, reason, "page marked unsupported");
                ExtractionStatus::Unsupported
            }
        };

        Extracted {
            title,
            content: text,
            status,
        }
    }

    async fn extract_url(&self, url: &str) -> Result<Extracted, NotebookError> {
        if let Some(domain) = blocked_domain(url) {
            info!(url, domain, "blocked domain, skipping fetch");
            return Ok(Extracted {
                title: None,
                content: String::new(),
                status: ExtractionStatus::Unsupported,
            });
        }

        let body = self.fetch(url).await?;
        debug!(url, bytes = body.len(), "fetched page");
        Ok(self.finish(url, &body))
    }

    async fn extract_pdf(&self, bytes: &[u8]) -> Result<Extracted, NotebookError> {
        let owned = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&owned))
            .await
            .map_err(|e| NotebookError::ExtractionFailed(format!("PDF worker: {}", e)))?
            .map_err(|e| NotebookError::ExtractionFailed(format!("PDF: {}", e)))?;

        let text = truncate_chars(&collapse_whitespace(&text), self.max_content_chars);
        let status = if text.chars().count() < self.min_content_chars {
            ExtractionStatus::Unsupported
        } else {
            ExtractionStatus::Ok
        };
        Ok(Extracted {
            title: None,
            content: text,
            status,
        })
    }
}

#[async_trait]
impl Extractor for WebExtractor {
    async fn extract(&self, input: ExtractInput<'_>) -> Result<Extracted, NotebookError> {
        match input {
            ExtractInput::Url(url) => self.extract_url(url).await,
            ExtractInput::Pdf(bytes) => self.extract_pdf(bytes).await,
        }
    }
}

/// Reduce an HTML document (or plain text) to a single line of text.
pub fn html_to_text(body: &str) -> String {
    document_text(&Html::parse_document(body))
}

fn document_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| NON_CONTENT_TAGS.contains(&e.name()))
        });
        if !hidden {
            parts.push(text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

fn document_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn blocked_domain(url: &str) -> Option<&'static str> {
    let host = url::Url::parse(url).ok()?.host_str()?.to_lowercase();
    BLOCKED_DOMAINS
        .iter()
        .copied()
        .find(|d| host == *d || host.ends_with(&format!(".{}", d)))
}

fn assess(url: &str, text: &str, min_chars: usize) -> Result<(), &'static str> {
    if text.chars().count() < min_chars {
        return Err("content too short");
    }
    if blocked_domain(url).is_some() {
        return Err("blocked domain");
    }
    let head: String = text.chars().take(INDICATOR_WINDOW).collect::<String>().to_lowercase();
    if FAILURE_INDICATORS.iter().any(|i| head.contains(i)) {
        return Err("interstitial or error page");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn extractor() -> WebExtractor {
        WebExtractor::new(&ExtractionConfig {
            scraper_api_key_env: "NB_TEST_UNSET_SCRAPER_KEY".into(),
            ..ExtractionConfig::default()
        })
        .unwrap()
    }

    const ARTICLE: &str = "<html><head><title>Tide Pools &amp; You</title>\
        <style>body { color: red }</style><script>var x = 1;</script></head>\
        <body><h1>Tide pools</h1><p>Tide pools are rocky pockets of seawater left behind \
        when the ocean retreats at low tide.</p><p>They host anemones,&nbsp;crabs and snails.</p>\
        </body></html>";

    #[test]
    fn test_html_to_text_strips_markup() {
        let text = html_to_text(ARTICLE);
        assert!(text.starts_with("Tide Pools & You Tide pools"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("var x"));
        assert!(text.contains("anemones, crabs"));
        assert_eq!(
            document_title(&Html::parse_document(ARTICLE)).as_deref(),
            Some("Tide Pools & You")
        );
    }

    #[test]
    fn test_html_to_text_drops_comments_and_decodes_entities() {
        let text = html_to_text(
            "<p>Caf&eacute; it&#8217;s</p><!-- <p>hidden draft</p> --><p>Visible</p>",
        );
        assert_eq!(text, "Caf\u{e9} it\u{2019}s Visible");
    }

    #[test]
    fn test_html_to_text_skips_noscript() {
        let text = html_to_text("<body><noscript>Turn on JS</noscript><p>Body &lt;ok&gt;</p></body>");
        assert_eq!(text, "Body <ok>");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(html_to_text("just  some\ntext"), "just some text");
    }

    #[test]
    fn test_truncate_chars_appends_ellipsis() {
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn test_blocked_domains_match_host_only() {
        assert_eq!(blocked_domain("https://www.youtube.com/watch?v=1"), Some("youtube.com"));
        assert_eq!(blocked_domain("https://x.com/someone"), Some("x.com"));
        assert_eq!(blocked_domain("https://example.com/x.com"), None);
    }

    #[test]
    fn test_assess_flags_interstitials() {
        let long_js = format!("Please enable JavaScript to continue. {}", "pad ".repeat(30));
        assert!(assess("https://example.com", &long_js, 50).is_err());
        assert!(assess("https://example.com", "short", 50).is_err());
        assert!(assess("https://example.com", &"real words ".repeat(10), 50).is_ok());
    }

    #[tokio::test]
    async fn test_extract_url_from_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE))
            .mount(&server)
            .await;

        let url = format!("{}/article", server.uri());
        let out = extractor().extract(ExtractInput::Url(&url)).await.unwrap();
        assert_eq!(out.status, ExtractionStatus::Ok);
        assert_eq!(out.title.as_deref(), Some("Tide Pools & You"));
        assert!(out.content.contains("rocky pockets"));
    }

    #[tokio::test]
    async fn test_http_error_is_extraction_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = format!("{}/gone", server.uri());
        let err = extractor().extract(ExtractInput::Url(&url)).await.unwrap_err();
        assert!(matches!(err, NotebookError::ExtractionFailed(_)));
    }

    #[tokio::test]
    async fn test_configured_min_content_chars_applies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<p>Low tide at 6:40 today.</p>"),
            )
            .mount(&server)
            .await;
        let url = format!("{}/tides", server.uri());

        let lenient = WebExtractor::new(&ExtractionConfig {
            min_content_chars: 10,
            scraper_api_key_env: "NB_TEST_UNSET_SCRAPER_KEY".into(),
            ..ExtractionConfig::default()
        })
        .unwrap();
        let out = lenient.extract(ExtractInput::Url(&url)).await.unwrap();
        assert_eq!(out.status, ExtractionStatus::Ok);
        assert!(!out.is_unsupported());

        let strict = extractor().extract(ExtractInput::Url(&url)).await.unwrap();
        assert!(strict.is_unsupported());
    }

    #[tokio::test]
    async fn test_blocked_domain_is_unsupported_without_fetch() {
        let out = extractor()
            .extract(ExtractInput::Url("https://www.instagram.com/p/abc"))
            .await
            .unwrap();
        assert_eq!(out.status, ExtractionStatus::Unsupported);
    }

    #[tokio::test]
    async fn test_invalid_pdf_is_extraction_failure() {
        let err = extractor()
            .extract(ExtractInput::Pdf(b"not a pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotebookError::ExtractionFailed(_)));
    }
}
