//! Notebook-scoped semantic retrieval.
//!
//! Embeds the query, scores every chunk of the notebook by cosine distance,
//! and returns the closest `top_k`. Candidates are loaded through
//! [`Store::list_chunks_by_notebook`], so chunks from other notebooks are
//! never scored.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;

use crate::embedding::{cosine_distance, Embedder};
use crate::error::{NotebookError, Result};
use crate::models::{Chunk, Citation, NotebookChunk, SourceType};
use crate::store::Store;

/// Number of chunks returned when the caller does not specify.
pub const DEFAULT_TOP_K: usize = 5;

/// A chunk ranked against a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub source_title: String,
    pub source_type: SourceType,
    /// Cosine distance to the query; smaller is closer.
    pub distance: f32,
}

impl From<&RetrievedChunk> for Citation {
    fn from(r: &RetrievedChunk) -> Self {
        Citation {
            source_id: r.chunk.source_id.clone(),
            chunk_index: r.chunk.chunk_index,
            content: r.chunk.content.clone(),
            source_title: r.source_title.clone(),
        }
    }
}

/// Retrieve the `top_k` chunks of `notebook_id` closest to `query`.
///
/// Ordering is ascending distance, then ascending `chunk_index`, then
/// ascending source creation time, then source id. A notebook without
/// chunks, a blank query, or `top_k == 0` yields an empty result.
pub async fn retrieve<S, E>(
    store: &S,
    embedder: &E,
    notebook_id: &str,
    query: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>>
where
    S: Store + ?Sized,
    E: Embedder + ?Sized,
{
    if query.trim().is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let candidates = store.list_chunks_by_notebook(notebook_id).await?;
    if candidates.is_empty() {
        debug!(notebook_id, "no chunks to retrieve from");
        return Ok(Vec::new());
    }

    let query_vec = embedder
        .embed(query)
        .await
        .map_err(|e| NotebookError::Embedding(format!("{:#}", e)))?;

    let mut scored: Vec<(f32, NotebookChunk)> = candidates
        .into_iter()
        .map(|c| (cosine_distance(&query_vec, &c.chunk.embedding), c))
        .collect();
    scored.sort_by(|(da, a), (db, b)| compare_ranked(*da, a, *db, b));
    scored.truncate(top_k);

    debug!(notebook_id, results = scored.len(), "retrieval complete");

    Ok(scored
        .into_iter()
        .map(|(distance, c)| RetrievedChunk {
            chunk: c.chunk,
            source_title: c.source_title,
            source_type: c.source_type,
            distance,
        })
        .collect())
}

fn compare_ranked(da: f32, a: &NotebookChunk, db: f32, b: &NotebookChunk) -> Ordering {
    da.total_cmp(&db)
        .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        .then_with(|| a.source_created_at.cmp(&b.source_created_at))
        .then_with(|| a.chunk.source_id.cmp(&b.chunk.source_id))
}
