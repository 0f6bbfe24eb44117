//! Paragraph-boundary text chunker.
//!
//! Splits a source's extracted text into segments that respect a
//! configurable `max_tokens` limit, for embedding and for context-window
//! limited generation.
//!
//! # Algorithm
//!
//! 1. Convert `max_tokens` to `max_chars` using a 4 chars/token ratio.
//! 2. Split text on blank-line paragraph boundaries.
//! 3. Accumulate paragraphs into a buffer (joined by `\n\n`) until adding
//!    the next paragraph would exceed `max_chars`; then flush the buffer as
//!    a chunk and start a new one with that paragraph.
//! 4. Any chunk still over `max_chars` (a single long paragraph) is
//!    re-split at sentence boundaries (`.`, `!`, `?`) with the same greedy
//!    rule, sentences joined by a single space.
//! 5. Chunks are trimmed and empty chunks dropped.
//!
//! A sentence that alone exceeds `max_chars` is kept whole rather than
//! truncated. Empty input produces no chunks.
//!
//! # Example
//!
//! ```rust
//! use notebook_rag_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", 800);
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph.".to_string()]);
//! ```

/// Approximate characters-per-token ratio.
pub const CHARS_PER_TOKEN: usize = 4;

/// Token budget per chunk when the caller has no preference.
pub const DEFAULT_MAX_TOKENS: usize = 800;

/// Split text into ordered chunks of at most `max_tokens * 4` characters.
///
/// Character counts are Unicode scalar values, not bytes.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;

    let paragraphs = split_paragraphs(text);
    let packed = pack(paragraphs.iter().map(String::as_str), "\n\n", max_chars);

    let mut chunks = Vec::with_capacity(packed.len());
    for chunk in packed {
        if char_len(&chunk) > max_chars {
            chunks.extend(pack(split_sentences(&chunk), " ", max_chars));
        } else {
            chunks.push(chunk);
        }
    }

    chunks
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Estimate the token count of `text` (`ceil(chars / 4)`).
pub fn estimate_tokens(text: &str) -> i64 {
    char_len(text).div_ceil(CHARS_PER_TOKEN) as i64
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on blank lines (a line that is empty or whitespace-only).
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
}

/// Split a paragraph into sentences, keeping each terminator run attached.
///
/// A run of `.`, `!`, `?` ends a sentence only when followed by whitespace
/// or end of text, so `3.14` and `e.g.x` stay intact.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        let at_boundary = chars.peek().is_none_or(|&(_, next)| next.is_whitespace());
        if at_boundary {
            sentences.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Greedy accumulation of trimmed pieces into buffers of at most
/// `max_chars`, except when a single piece is itself larger.
fn pack<'a>(pieces: impl IntoIterator<Item = &'a str>, sep: &str, max_chars: usize) -> Vec<String> {
    let sep_chars = char_len(sep);
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for piece in pieces {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let piece_chars = char_len(piece);

        if !buf.is_empty() && buf_chars + sep_chars + piece_chars > max_chars {
            out.push(std::mem::take(&mut buf));
            buf_chars = 0;
        }
        if !buf.is_empty() {
            buf.push_str(sep);
            buf_chars += sep_chars;
        }
        buf.push_str(piece);
        buf_chars += piece_chars;
    }

    if !buf.is_empty() {
        out.push(buf);
    }
    out
}
