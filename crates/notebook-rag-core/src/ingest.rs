//! Ingestion pipeline: chunk → embed → store.
//!
//! Turns a source's raw content into embedded chunks and drives the
//! source's status through `processing` to `completed` or `failed`.
//!
//! # Status transitions
//!
//! ```text
//! pending ──▶ processing ──▶ completed
//!                  │
//!                  └──────▶ failed
//! ```
//!
//! A missing source or blank content is rejected before the status is
//! touched. Once the source is `processing`, every exit path leaves it
//! `completed` or `failed`.

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::chunk::{chunk_text, estimate_tokens};
use crate::embedding::Embedder;
use crate::error::{NotebookError, Result};
use crate::models::{NewChunk, Source, SourceStatus};
use crate::store::Store;

/// Outcome of a successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub source_id: String,
    pub chunks_created: usize,
}

/// Chunk, embed, and persist the content of `source_id`.
///
/// Chunks left by an earlier run are replaced. If chunking, any
/// embed/persist step, or the final `completed` write fails, the chunks
/// written by this run are removed, the source is marked `failed`, and the
/// triggering error is returned.
pub async fn ingest_source<S, E>(
    store: &S,
    embedder: &E,
    source_id: &str,
    max_tokens: usize,
) -> Result<IngestReport>
where
    S: Store + ?Sized,
    E: Embedder + ?Sized,
{
    let source = store
        .get_source(source_id)
        .await?
        .ok_or_else(|| NotebookError::not_found("source", source_id))?;

    if source.status == SourceStatus::Unsupported {
        return Err(NotebookError::validation(format!(
            "source {} is unsupported and cannot be ingested",
            source_id
        )));
    }
    if source.content.trim().is_empty() {
        return Err(NotebookError::EmptyContent {
            source_id: source_id.to_string(),
        });
    }

    store
        .update_source_status(source_id, SourceStatus::Processing)
        .await?;

    let written = match write_chunks(store, embedder, &source, max_tokens).await {
        Ok(chunks_created) => store
            .update_source_status(source_id, SourceStatus::Completed)
            .await
            .map(|()| chunks_created)
            .map_err(NotebookError::from),
        Err(err) => Err(err),
    };

    match written {
        Ok(chunks_created) => {
            info!(source_id, chunks_created, "ingestion completed");
            Ok(IngestReport {
                source_id: source_id.to_string(),
                chunks_created,
            })
        }
        Err(err) => {
            warn!(source_id, error = %err, "ingestion failed");
            if let Err(cleanup) = store.delete_chunks_by_source(source_id).await {
                warn!(source_id, error = %cleanup, "failed to remove partial chunks");
            }
            if let Err(status_err) = store
                .update_source_status(source_id, SourceStatus::Failed)
                .await
            {
                warn!(source_id, error = %status_err, "failed to mark source failed");
            }
            Err(err)
        }
    }
}

async fn write_chunks<S, E>(
    store: &S,
    embedder: &E,
    source: &Source,
    max_tokens: usize,
) -> Result<usize>
where
    S: Store + ?Sized,
    E: Embedder + ?Sized,
{
    let removed = store.delete_chunks_by_source(&source.id).await?;
    if removed > 0 {
        info!(source_id = %source.id, removed, "replacing previous chunks");
    }

    let pieces = chunk_text(&source.content, max_tokens);
    if pieces.is_empty() {
        return Err(NotebookError::NoChunksProduced {
            source_id: source.id.clone(),
        });
    }

    let dims = embedder.dims();
    let writes = pieces.iter().enumerate().map(|(index, text)| async move {
        let embedding = embedder
            .embed(text)
            .await
            .map_err(|e| NotebookError::Embedding(format!("{:#}", e)))?;
        if embedding.len() != dims {
            return Err(NotebookError::Embedding(format!(
                "expected {} dimensions, got {}",
                dims,
                embedding.len()
            )));
        }
        store
            .create_chunk(&NewChunk {
                source_id: source.id.clone(),
                content: text.clone(),
                chunk_index: index as i64,
                token_count: estimate_tokens(text),
                embedding,
            })
            .await?;
        Ok::<_, NotebookError>(())
    });
    try_join_all(writes).await?;

    Ok(pieces.len())
}
