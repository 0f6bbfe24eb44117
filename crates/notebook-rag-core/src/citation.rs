//! Citation tokens: formatting, extraction, and rendering.
//!
//! A token has the form `[S<id8>:<chunk_index>]`, where `<id8>` is the
//! first eight characters of the source id. Tokens in generated text are
//! bound back to the [`Citation`]s that were offered to the model; tokens
//! that match nothing (or match more than one source) are left as text.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::models::Citation;

/// Characters of the source id carried in a citation token.
pub const SHORT_ID_LEN: usize = 8;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[S([0-9A-Za-z_-]+):(\d+)\]").expect("citation token regex is valid")
});

/// First [`SHORT_ID_LEN`] characters of `source_id`.
pub fn short_source_id(source_id: &str) -> &str {
    match source_id.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &source_id[..end],
        None => source_id,
    }
}

/// Render the token for one chunk reference.
///
/// ```rust
/// use notebook_rag_core::citation::citation_token;
///
/// assert_eq!(citation_token("abcdef1234567890", 2), "[Sabcdef12:2]");
/// ```
pub fn citation_token(source_id: &str, chunk_index: i64) -> String {
    format!("[S{}:{}]", short_source_id(source_id), chunk_index)
}

/// Space-joined tokens for `citations`, in order. Empty input gives `""`.
pub fn format_citations(citations: &[Citation]) -> String {
    citations
        .iter()
        .map(|c| citation_token(&c.source_id, c.chunk_index))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A token found in text and the citation it resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationMatch<'a> {
    /// Byte range of the token in the scanned text.
    pub span: Range<usize>,
    pub citation: &'a Citation,
}

/// Find every token in `text` that resolves to exactly one of `known`.
///
/// Matches are returned in text order. A token resolves when its short id
/// and chunk index equal those of a known citation. If two distinct source
/// ids share the prefix and index, the token is ambiguous and skipped.
pub fn extract_citations<'a>(text: &str, known: &'a [Citation]) -> Vec<CitationMatch<'a>> {
    let mut matches = Vec::new();

    for caps in TOKEN_RE.captures_iter(text) {
        let (Some(whole), Some(prefix), Some(index)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let Ok(index) = index.as_str().parse::<i64>() else {
            continue;
        };

        let mut candidates = known
            .iter()
            .filter(|c| c.chunk_index == index && short_source_id(&c.source_id) == prefix.as_str());
        let Some(first) = candidates.next() else {
            continue;
        };
        if candidates.any(|c| c.source_id != first.source_id) {
            warn!(token = whole.as_str(), "ambiguous citation token left unresolved");
            continue;
        }

        matches.push(CitationMatch {
            span: whole.range(),
            citation: first,
        });
    }

    matches
}

/// Distinct citations referenced by `text`, in first-appearance order.
pub fn cited_citations(text: &str, known: &[Citation]) -> Vec<Citation> {
    let mut out: Vec<Citation> = Vec::new();
    for m in extract_citations(text, known) {
        if !out
            .iter()
            .any(|c| c.source_id == m.citation.source_id && c.chunk_index == m.citation.chunk_index)
        {
            out.push(m.citation.clone());
        }
    }
    out
}

/// Display unit of text that may contain citation tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Citation { token: String, citation: Citation },
}

/// Split `text` into plain runs and resolved citations.
///
/// Unresolved tokens stay inside the surrounding text segment.
/// Concatenating every segment's text (or token) reproduces `text`.
pub fn render_segments(text: &str, known: &[Citation]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for m in extract_citations(text, known) {
        if m.span.start > cursor {
            segments.push(Segment::Text {
                text: text[cursor..m.span.start].to_string(),
            });
        }
        segments.push(Segment::Citation {
            token: text[m.span.clone()].to_string(),
            citation: m.citation.clone(),
        });
        cursor = m.span.end;
    }
    if cursor < text.len() {
        segments.push(Segment::Text {
            text: text[cursor..].to_string(),
        });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(source_id: &str, chunk_index: i64) -> Citation {
        Citation {
            source_id: source_id.to_string(),
            chunk_index,
            content: format!("content {chunk_index}"),
            source_title: "Doc".to_string(),
        }
    }

    #[test]
    fn test_format_single_citation() {
        assert_eq!(
            format_citations(&[citation("abcdef1234567890", 2)]),
            "[Sabcdef12:2]"
        );
    }

    #[test]
    fn test_format_multiple_and_empty() {
        let cs = [citation("11111111-aaaa", 0), citation("22222222-bbbb", 5)];
        assert_eq!(format_citations(&cs), "[S11111111:0] [S22222222:5]");
        assert_eq!(format_citations(&[]), "");
    }

    #[test]
    fn test_short_id_of_short_input() {
        assert_eq!(short_source_id("abc"), "abc");
        assert_eq!(short_source_id("0123456789"), "01234567");
    }

    #[test]
    fn test_extract_recovers_formatted_tokens_at_positions() {
        let known = vec![
            citation("aaaaaaaa-1111", 0),
            citation("bbbbbbbb-2222", 3),
            citation("cccccccc-3333", 1),
        ];
        let tokens = format_citations(&known);
        let text = format!("Intro text. {tokens} And a trailing remark.");

        let found = extract_citations(&text, &known);
        assert_eq!(found.len(), 3);
        for (m, expected) in found.iter().zip(&known) {
            assert_eq!(m.citation, expected);
            assert_eq!(
                &text[m.span.clone()],
                citation_token(&expected.source_id, expected.chunk_index)
            );
        }
        assert!(found.windows(2).all(|w| w[0].span.end <= w[1].span.start));
    }

    #[test]
    fn test_unknown_tokens_are_inert() {
        let known = vec![citation("aaaaaaaa-1111", 0)];
        let text = "See [Saaaaaaaa:9] and [Szzzzzzzz:0] and [not a token].";
        assert!(extract_citations(text, &known).is_empty());
    }

    #[test]
    fn test_ambiguous_prefix_is_inert() {
        let known = vec![citation("abcdefgh-one", 0), citation("abcdefgh-two", 0)];
        assert!(extract_citations("claim [Sabcdefgh:0]", &known).is_empty());

        let same_source_twice = vec![citation("abcdefgh-one", 0), citation("abcdefgh-one", 0)];
        assert_eq!(
            extract_citations("claim [Sabcdefgh:0]", &same_source_twice).len(),
            1
        );
    }

    #[test]
    fn test_cited_citations_dedup_in_order() {
        let known = vec![citation("aaaaaaaa-1", 0), citation("bbbbbbbb-2", 1)];
        let text = "B first [Sbbbbbbbb:1], then A [Saaaaaaaa:0], B again [Sbbbbbbbb:1].";
        let cited = cited_citations(text, &known);
        assert_eq!(cited, vec![known[1].clone(), known[0].clone()]);
    }

    #[test]
    fn test_render_segments_reassembles_text() {
        let known = vec![citation("aaaaaaaa-1", 0)];
        let text = "Fact [Saaaaaaaa:0] and a dangling [Sffffffff:2] ending";
        let segments = render_segments(text, &known);

        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[1], Segment::Citation { citation, .. } if citation == &known[0]));

        let rebuilt: String = segments
            .iter()
            .map(|s| match s {
                Segment::Text { text } => text.as_str(),
                Segment::Citation { token, .. } => token.as_str(),
            })
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_render_segments_token_only() {
        let known = vec![citation("aaaaaaaa-1", 4)];
        let segments = render_segments("[Saaaaaaaa:4]", &known);
        assert_eq!(segments.len(), 1);
        assert!(render_segments("", &known).is_empty());
    }
}
