//! Prompt construction for chat and study artifacts.
//!
//! Every prompt is a system message followed by a user message. Context
//! blocks are labelled with their citation token so the model can cite
//! exactly what it was shown.

use crate::citation::citation_token;
use crate::generation::PromptMessage;
use crate::models::NotebookChunk;
use crate::retrieve::RetrievedChunk;

/// Reply the model is told to give when the sources do not cover the
/// question.
pub const UNGROUNDED_REPLY: &str = "I don't have that information";

const STYLE_RULES: &str = "\
Formatting rules:
- Plain text only. No markdown emphasis or headings.
- Keep sentences short and clear.
- Put one blank line between sections and between list items.
- Use bullets (•) for unordered lists and numbers (1., 2., 3.) when order matters.
- Square brackets are reserved for citations.";

/// Context for chat: one block per retrieved chunk, headed by its token.
pub fn chat_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|r| {
            format!(
                "{} {} ({})\n{}",
                citation_token(&r.chunk.source_id, r.chunk.chunk_index),
                r.source_title,
                r.source_type,
                r.chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Context for study artifacts: all chunks grouped under a header per
/// source, in the order given.
pub fn aggregate_context(chunks: &[NotebookChunk]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;

    for c in chunks {
        if current != Some(c.chunk.source_id.as_str()) {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&format!("=== Source: {} ===", c.source_title));
            current = Some(c.chunk.source_id.as_str());
        }
        out.push_str(&format!(
            "\n\n{}\n{}",
            citation_token(&c.chunk.source_id, c.chunk.chunk_index),
            c.chunk.content
        ));
    }

    out
}

pub fn chat_prompt(question: &str, context: &str, tokens: &str) -> Vec<PromptMessage> {
    let system = format!(
        "You are a research assistant answering questions about the user's notebook.\n\
         \n\
         Answer only from the sources below. Do not use outside knowledge.\n\
         If the sources do not contain the answer, reply exactly: \"{UNGROUNDED_REPLY}\".\n\
         \n\
         Citations:\n\
         - Cite every claim taken from a source with its token, for example {example}.\n\
         - Valid tokens: {tokens}\n\
         - Never invent tokens.\n\
         \n\
         {STYLE_RULES}\n\
         \n\
         Sources:\n\
         {context}",
        example = tokens.split(' ').next().unwrap_or("[S<source>:<chunk>]"),
    );
    vec![
        PromptMessage::system(system),
        PromptMessage::user(question.trim()),
    ]
}

pub fn briefing_prompt(context: &str) -> Vec<PromptMessage> {
    let user = format!(
        "Create a well-structured briefing from the sources below.\n\
         \n\
         {STYLE_RULES}\n\
         \n\
         Cite sources with the token shown above each passage.\n\
         \n\
         Use these sections:\n\
         \n\
         Overview:\n\
         2 to 4 sentences on what matters most.\n\
         \n\
         Key Points:\n\
         • One short sentence per point.\n\
         \n\
         Important Details:\n\
         Short paragraphs separated by blank lines.\n\
         \n\
         Conclusion:\n\
         1 to 3 sentences with the bottom line.\n\
         \n\
         Sources:\n\
         {context}"
    );
    vec![
        PromptMessage::system(
            "You are an expert at writing clear, well-formatted briefings that follow the style rules exactly.",
        ),
        PromptMessage::user(user),
    ]
}

pub fn quiz_prompt(context: &str, question_count: usize) -> Vec<PromptMessage> {
    let user = format!(
        "Create a quiz with {question_count} questions from the sources below. \
         Mix multiple choice and short answer questions, focused on key facts and concepts.\n\
         End every answer with the citation token of the source block it comes from, \
         written exactly as it appears above that block (for example [Sabcdef12:0]).\n\
         \n\
         Return only a JSON object, with no surrounding text, in this shape:\n\
         {{\n\
         \x20 \"questions\": [\n\
         \x20   {{\"type\": \"multiple_choice\", \"question\": \"...\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \"answer\": \"... [S<id>:<n>]\"}},\n\
         \x20   {{\"type\": \"short_answer\", \"question\": \"...\", \"answer\": \"... [S<id>:<n>]\"}}\n\
         \x20 ]\n\
         }}\n\
         \n\
         Sources:\n\
         {context}"
    );
    vec![
        PromptMessage::system(
            "You are an expert at creating educational quizzes. Always return valid JSON.",
        ),
        PromptMessage::user(user),
    ]
}

pub fn flashcards_prompt(context: &str) -> Vec<PromptMessage> {
    let user = format!(
        "Create study flashcards from the sources below. Each card has a short \
         question or term on the front and a concise answer on the back.\n\
         \n\
         Return only a JSON array, with no surrounding text, in this shape:\n\
         [\n\
         \x20 {{\"front\": \"...\", \"back\": \"...\"}}\n\
         ]\n\
         \n\
         Sources:\n\
         {context}"
    );
    vec![
        PromptMessage::system(
            "You are an expert at creating study flashcards. Always return valid JSON.",
        ),
        PromptMessage::user(user),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::PromptRole;
    use crate::models::{Chunk, SourceType};
    use chrono::Utc;

    fn notebook_chunk(source_id: &str, title: &str, index: i64, text: &str) -> NotebookChunk {
        NotebookChunk {
            chunk: Chunk {
                id: format!("{source_id}-{index}"),
                source_id: source_id.to_string(),
                content: text.to_string(),
                chunk_index: index,
                token_count: 1,
                embedding: vec![],
                created_at: Utc::now(),
            },
            source_title: title.to_string(),
            source_type: SourceType::Text,
            source_created_at: Utc::now(),
        }
    }

    #[test]
    fn test_aggregate_context_groups_by_source() {
        let chunks = vec![
            notebook_chunk("aaaaaaaa-1", "Alpha", 0, "a0"),
            notebook_chunk("aaaaaaaa-1", "Alpha", 1, "a1"),
            notebook_chunk("bbbbbbbb-2", "Beta", 0, "b0"),
        ];
        let ctx = aggregate_context(&chunks);
        assert_eq!(ctx.matches("=== Source: Alpha ===").count(), 1);
        assert_eq!(ctx.matches("=== Source: Beta ===").count(), 1);
        assert!(ctx.contains("[Saaaaaaaa:1]\na1"));
        assert!(ctx.find("a1").unwrap() < ctx.find("Beta").unwrap());
    }

    #[test]
    fn test_chat_context_labels_tokens() {
        let nc = notebook_chunk("abcdef1234", "Doc", 2, "body text");
        let retrieved = RetrievedChunk {
            chunk: nc.chunk,
            source_title: nc.source_title,
            source_type: nc.source_type,
            distance: 0.1,
        };
        assert_eq!(
            chat_context(&[retrieved]),
            "[Sabcdef12:2] Doc (text)\nbody text"
        );
    }

    #[test]
    fn test_chat_prompt_shape() {
        let messages = chat_prompt("  what?  ", "ctx", "[Sabcdef12:2]");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, PromptRole::System);
        assert!(messages[0].content.contains(UNGROUNDED_REPLY));
        assert!(messages[0].content.contains("[Sabcdef12:2]"));
        assert!(messages[0].content.ends_with("ctx"));
        assert_eq!(messages[1].content, "what?");
    }

    #[test]
    fn test_quiz_prompt_mentions_count() {
        let messages = quiz_prompt("ctx", 7);
        assert!(messages[1].content.contains("with 7 questions"));
        assert!(messages[1].content.contains("\"questions\""));
    }

    #[test]
    fn test_quiz_prompt_asks_for_cited_answers() {
        let messages = quiz_prompt("[Sabcdef12:0]\nbody", 3);
        assert!(messages[1].content.contains("End every answer with the citation token"));
        assert!(messages[1].content.contains("[S<id>:<n>]"));
    }
}
