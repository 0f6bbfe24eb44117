//! Source intake: turn a text, URL, or PDF request into a stored source.
//!
//! URL and PDF payloads go through an [`Extractor`]. Content the extractor
//! judges unusable (or that is too short to be worth embedding) is still
//! stored, but as `unsupported`, so the user can see what happened.

use tracing::{info, warn};
use url::Url;

use crate::error::{NotebookError, Result};
use crate::extract::{ExtractInput, Extracted, Extractor};
use crate::models::{NewSource, Source, SourceStatus, SourceType};
use crate::store::Store;

/// Content stored for a URL or PDF whose extraction came back too thin.
pub const UNSUPPORTED_CONTENT: &str =
    "This source is not supported. The content could not be retrieved properly.";

/// A request to add material to a notebook.
#[derive(Debug, Clone)]
pub enum SourceRequest {
    Text {
        title: String,
        content: String,
    },
    Url {
        title: Option<String>,
        url: String,
    },
    Pdf {
        title: Option<String>,
        filename: String,
        bytes: Vec<u8>,
    },
}

/// Create a source in `notebook_id` from `request`.
pub async fn add_source<S, X>(
    store: &S,
    extractor: &X,
    notebook_id: &str,
    request: SourceRequest,
) -> Result<Source>
where
    S: Store + ?Sized,
    X: Extractor + ?Sized,
{
    if store.get_notebook(notebook_id).await?.is_none() {
        return Err(NotebookError::not_found("notebook", notebook_id));
    }

    let new = match request {
        SourceRequest::Text { title, content } => {
            if title.trim().is_empty() {
                return Err(NotebookError::validation("title is required"));
            }
            if content.trim().is_empty() {
                return Err(NotebookError::validation("content is required"));
            }
            NewSource {
                notebook_id: notebook_id.to_string(),
                title: title.trim().to_string(),
                source_type: SourceType::Text,
                content,
                url: None,
                status: SourceStatus::Pending,
            }
        }
        SourceRequest::Url { title, url } => {
            let parsed = Url::parse(url.trim())
                .map_err(|e| NotebookError::validation(format!("invalid URL '{}': {}", url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(NotebookError::validation(format!(
                    "unsupported URL scheme '{}'",
                    parsed.scheme()
                )));
            }

            let extracted = extractor.extract(ExtractInput::Url(parsed.as_str())).await?;
            let fallback = parsed.host_str().unwrap_or(parsed.as_str()).to_string();
            from_extracted(
                notebook_id,
                SourceType::Url,
                title,
                fallback,
                Some(parsed.to_string()),
                extracted,
            )
        }
        SourceRequest::Pdf {
            title,
            filename,
            bytes,
        } => {
            if bytes.is_empty() {
                return Err(NotebookError::validation("PDF file is empty"));
            }
            let extracted = extractor.extract(ExtractInput::Pdf(&bytes)).await?;
            from_extracted(notebook_id, SourceType::Pdf, title, filename, None, extracted)
        }
    };

    let source = store.create_source(&new).await?;
    if source.status == SourceStatus::Unsupported {
        warn!(source_id = %source.id, source_type = %source.source_type, "source stored as unsupported");
    } else {
        info!(source_id = %source.id, source_type = %source.source_type, "source added");
    }
    Ok(source)
}

fn from_extracted(
    notebook_id: &str,
    source_type: SourceType,
    title: Option<String>,
    fallback_title: String,
    url: Option<String>,
    extracted: Extracted,
) -> NewSource {
    let unsupported = extracted.is_unsupported();
    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            extracted
                .title
                .as_ref()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
        .unwrap_or(fallback_title);

    let content = if unsupported && extracted.content.trim().is_empty() {
        UNSUPPORTED_CONTENT.to_string()
    } else {
        extracted.content
    };

    NewSource {
        notebook_id: notebook_id.to_string(),
        title,
        source_type,
        content,
        url,
        status: if unsupported {
            SourceStatus::Unsupported
        } else {
            SourceStatus::Pending
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractionStatus;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;

    struct FixedExtractor(std::result::Result<Extracted, String>);

    #[async_trait]
    impl Extractor for FixedExtractor {
        async fn extract(&self, _input: ExtractInput<'_>) -> Result<Extracted> {
            self.0.clone().map_err(NotebookError::ExtractionFailed)
        }
    }

    fn page(title: Option<&str>, content: &str, status: ExtractionStatus) -> FixedExtractor {
        FixedExtractor(Ok(Extracted {
            title: title.map(str::to_string),
            content: content.to_string(),
            status,
        }))
    }

    const LONG: &str = "This article body is comfortably longer than fifty characters of text.";

    #[tokio::test]
    async fn test_text_source_pending() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("nb", "").await.unwrap();
        let source = add_source(
            &store,
            &page(None, "", ExtractionStatus::Ok),
            &nb.id,
            SourceRequest::Text {
                title: "Notes".into(),
                content: "short".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(source.status, SourceStatus::Pending);
        assert_eq!(source.source_type, SourceType::Text);
    }

    #[tokio::test]
    async fn test_text_source_requires_fields() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("nb", "").await.unwrap();
        let x = page(None, "", ExtractionStatus::Ok);
        for (title, content) in [("", "body"), ("Title", "  ")] {
            let err = add_source(
                &store,
                &x,
                &nb.id,
                SourceRequest::Text {
                    title: title.into(),
                    content: content.into(),
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, NotebookError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_url_title_fallbacks() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("nb", "").await.unwrap();

        let with_page_title = add_source(
            &store,
            &page(Some("Page Title"), LONG, ExtractionStatus::Ok),
            &nb.id,
            SourceRequest::Url {
                title: None,
                url: "https://example.com/a".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(with_page_title.title, "Page Title");
        assert_eq!(with_page_title.status, SourceStatus::Pending);
        assert_eq!(with_page_title.url.as_deref(), Some("https://example.com/a"));

        let host_only = add_source(
            &store,
            &page(None, LONG, ExtractionStatus::Ok),
            &nb.id,
            SourceRequest::Url {
                title: Some("  ".into()),
                url: "https://docs.example.org/x".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(host_only.title, "docs.example.org");
    }

    #[tokio::test]
    async fn test_thin_or_flagged_content_unsupported() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("nb", "").await.unwrap();

        let blank = add_source(
            &store,
            &page(None, "  \n ", ExtractionStatus::Ok),
            &nb.id,
            SourceRequest::Url {
                title: None,
                url: "https://spa.example.com".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(blank.status, SourceStatus::Unsupported);
        assert_eq!(blank.content, UNSUPPORTED_CONTENT);

        let short_but_accepted = add_source(
            &store,
            &page(None, "Tide tables", ExtractionStatus::Ok),
            &nb.id,
            SourceRequest::Url {
                title: None,
                url: "https://tides.example.com".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(short_but_accepted.status, SourceStatus::Pending);

        let flagged = add_source(
            &store,
            &page(None, "", ExtractionStatus::Unsupported),
            &nb.id,
            SourceRequest::Pdf {
                title: None,
                filename: "scan.pdf".into(),
                bytes: vec![1, 2, 3],
            },
        )
        .await
        .unwrap();
        assert_eq!(flagged.status, SourceStatus::Unsupported);
        assert_eq!(flagged.title, "scan.pdf");
        assert_eq!(flagged.content, UNSUPPORTED_CONTENT);
    }

    #[tokio::test]
    async fn test_invalid_url_and_extraction_error() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("nb", "").await.unwrap();

        for url in ["not a url", "ftp://example.com/file"] {
            let err = add_source(
                &store,
                &page(None, LONG, ExtractionStatus::Ok),
                &nb.id,
                SourceRequest::Url {
                    title: None,
                    url: url.into(),
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, NotebookError::Validation(_)));
        }

        let err = add_source(
            &store,
            &FixedExtractor(Err("connection refused".into())),
            &nb.id,
            SourceRequest::Url {
                title: None,
                url: "https://example.com".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NotebookError::ExtractionFailed(_)));
        assert!(store.list_sources(&nb.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_notebook() {
        let store = InMemoryStore::new();
        let err = add_source(
            &store,
            &page(None, LONG, ExtractionStatus::Ok),
            "missing",
            SourceRequest::Text {
                title: "t".into(),
                content: "c".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NotebookError::NotFound { .. }));
    }
}
