//! In-memory [`Store`] implementation for tests and embedded use.
//!
//! All tables live behind a single `std::sync::RwLock`, so cascading deletes
//! and notebook recency bumps are applied atomically. Rows are kept in
//! insertion order, which doubles as the tie-breaker when timestamps are
//! equal.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    ArtifactContent, ArtifactKind, Chunk, Citation, Message, NewChunk, NewSource, Notebook,
    NotebookChunk, NotebookSummary, Role, Source, SourceStatus, StudyArtifact,
};

use super::Store;

#[derive(Default)]
struct Tables {
    notebooks: Vec<Notebook>,
    sources: Vec<Source>,
    chunks: Vec<Chunk>,
    messages: Vec<Message>,
    artifacts: Vec<StudyArtifact>,
}

impl Tables {
    fn touch_notebook(&mut self, id: &str) {
        if let Some(nb) = self.notebooks.iter_mut().find(|n| n.id == id) {
            nb.updated_at = Utc::now();
        }
    }

    fn remove_source(&mut self, id: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|s| s.id != id);
        self.chunks.retain(|c| c.source_id != id);
        self.sources.len() != before
    }
}

/// In-memory store. Construct one per process or per test.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_notebook(&self, title: &str, description: &str) -> Result<Notebook> {
        let now = Utc::now();
        let notebook = Notebook {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.write()?.notebooks.push(notebook.clone());
        Ok(notebook)
    }

    async fn get_notebook(&self, id: &str) -> Result<Option<Notebook>> {
        Ok(self.read()?.notebooks.iter().find(|n| n.id == id).cloned())
    }

    async fn list_notebooks(&self, limit: i64, offset: i64) -> Result<Vec<NotebookSummary>> {
        let tables = self.read()?;
        let mut summaries: Vec<NotebookSummary> = tables
            .notebooks
            .iter()
            .rev()
            .map(|nb| NotebookSummary {
                notebook: nb.clone(),
                source_count: tables
                    .sources
                    .iter()
                    .filter(|s| s.notebook_id == nb.id)
                    .count() as i64,
                message_count: tables
                    .messages
                    .iter()
                    .filter(|m| m.notebook_id == nb.id)
                    .count() as i64,
            })
            .collect();
        summaries.sort_by(|a, b| b.notebook.updated_at.cmp(&a.notebook.updated_at));

        Ok(summaries
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn delete_notebook(&self, id: &str) -> Result<bool> {
        let mut tables = self.write()?;
        let before = tables.notebooks.len();
        tables.notebooks.retain(|n| n.id != id);
        if tables.notebooks.len() == before {
            return Ok(false);
        }

        let source_ids: Vec<String> = tables
            .sources
            .iter()
            .filter(|s| s.notebook_id == id)
            .map(|s| s.id.clone())
            .collect();
        for source_id in &source_ids {
            tables.remove_source(source_id);
        }
        tables.messages.retain(|m| m.notebook_id != id);
        tables.artifacts.retain(|a| a.notebook_id != id);
        Ok(true)
    }

    async fn create_source(&self, new: &NewSource) -> Result<Source> {
        let mut tables = self.write()?;
        if !tables.notebooks.iter().any(|n| n.id == new.notebook_id) {
            return Err(anyhow!("notebook {} does not exist", new.notebook_id));
        }
        let now = Utc::now();
        let source = Source {
            id: Uuid::new_v4().to_string(),
            notebook_id: new.notebook_id.clone(),
            title: new.title.clone(),
            source_type: new.source_type,
            content: new.content.clone(),
            url: new.url.clone(),
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        tables.sources.push(source.clone());
        tables.touch_notebook(&new.notebook_id);
        Ok(source)
    }

    async fn get_source(&self, id: &str) -> Result<Option<Source>> {
        Ok(self.read()?.sources.iter().find(|s| s.id == id).cloned())
    }

    async fn list_sources(&self, notebook_id: &str) -> Result<Vec<Source>> {
        let tables = self.read()?;
        let mut sources: Vec<Source> = tables
            .sources
            .iter()
            .rev()
            .filter(|s| s.notebook_id == notebook_id)
            .cloned()
            .collect();
        sources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sources)
    }

    async fn update_source_status(&self, id: &str, status: SourceStatus) -> Result<()> {
        let mut tables = self.write()?;
        let source = tables
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow!("source {} does not exist", id))?;
        source.status = status;
        source.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_source(&self, id: &str) -> Result<bool> {
        Ok(self.write()?.remove_source(id))
    }

    async fn create_chunk(&self, new: &NewChunk) -> Result<Chunk> {
        let mut tables = self.write()?;
        if !tables.sources.iter().any(|s| s.id == new.source_id) {
            return Err(anyhow!("source {} does not exist", new.source_id));
        }
        if tables
            .chunks
            .iter()
            .any(|c| c.source_id == new.source_id && c.chunk_index == new.chunk_index)
        {
            return Err(anyhow!(
                "chunk {} already exists for source {}",
                new.chunk_index,
                new.source_id
            ));
        }
        let chunk = Chunk {
            id: Uuid::new_v4().to_string(),
            source_id: new.source_id.clone(),
            content: new.content.clone(),
            chunk_index: new.chunk_index,
            token_count: new.token_count,
            embedding: new.embedding.clone(),
            created_at: Utc::now(),
        };
        tables.chunks.push(chunk.clone());
        Ok(chunk)
    }

    async fn delete_chunks_by_source(&self, source_id: &str) -> Result<u64> {
        let mut tables = self.write()?;
        let before = tables.chunks.len();
        tables.chunks.retain(|c| c.source_id != source_id);
        Ok((before - tables.chunks.len()) as u64)
    }

    async fn list_chunks_by_source(&self, source_id: &str) -> Result<Vec<Chunk>> {
        let tables = self.read()?;
        let mut chunks: Vec<Chunk> = tables
            .chunks
            .iter()
            .filter(|c| c.source_id == source_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn list_chunks_by_notebook(&self, notebook_id: &str) -> Result<Vec<NotebookChunk>> {
        let tables = self.read()?;
        let mut sources: Vec<&Source> = tables
            .sources
            .iter()
            .filter(|s| s.notebook_id == notebook_id)
            .collect();
        sources.sort_by_key(|s| s.created_at);

        let mut out = Vec::new();
        for source in sources {
            let mut chunks: Vec<&Chunk> = tables
                .chunks
                .iter()
                .filter(|c| c.source_id == source.id)
                .collect();
            chunks.sort_by_key(|c| c.chunk_index);
            out.extend(chunks.into_iter().map(|c| NotebookChunk {
                chunk: c.clone(),
                source_title: source.title.clone(),
                source_type: source.source_type,
                source_created_at: source.created_at,
            }));
        }
        Ok(out)
    }

    async fn append_message(
        &self,
        notebook_id: &str,
        role: Role,
        content: &str,
        citations: &[Citation],
    ) -> Result<Message> {
        let mut tables = self.write()?;
        if !tables.notebooks.iter().any(|n| n.id == notebook_id) {
            return Err(anyhow!("notebook {} does not exist", notebook_id));
        }
        let message = Message {
            id: Uuid::new_v4().to_string(),
            notebook_id: notebook_id.to_string(),
            role,
            content: content.to_string(),
            citations: citations.to_vec(),
            created_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        tables.touch_notebook(notebook_id);
        Ok(message)
    }

    async fn list_messages(&self, notebook_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .read()?
            .messages
            .iter()
            .filter(|m| m.notebook_id == notebook_id)
            .cloned()
            .collect())
    }

    async fn create_study_artifact(
        &self,
        notebook_id: &str,
        title: &str,
        content: &ArtifactContent,
    ) -> Result<StudyArtifact> {
        let mut tables = self.write()?;
        if !tables.notebooks.iter().any(|n| n.id == notebook_id) {
            return Err(anyhow!("notebook {} does not exist", notebook_id));
        }
        let artifact = StudyArtifact {
            id: Uuid::new_v4().to_string(),
            notebook_id: notebook_id.to_string(),
            title: title.to_string(),
            content: content.clone(),
            created_at: Utc::now(),
        };
        tables.artifacts.push(artifact.clone());
        Ok(artifact)
    }

    async fn list_study_artifacts(
        &self,
        notebook_id: &str,
        kind: Option<ArtifactKind>,
    ) -> Result<Vec<StudyArtifact>> {
        let tables = self.read()?;
        let mut artifacts: Vec<StudyArtifact> = tables
            .artifacts
            .iter()
            .rev()
            .filter(|a| a.notebook_id == notebook_id)
            .filter(|a| kind.is_none_or(|k| a.kind() == k))
            .cloned()
            .collect();
        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;

    fn text_source(notebook_id: &str, title: &str) -> NewSource {
        NewSource {
            notebook_id: notebook_id.to_string(),
            title: title.to_string(),
            source_type: SourceType::Text,
            content: "body".to_string(),
            url: None,
            status: SourceStatus::Pending,
        }
    }

    fn chunk(source_id: &str, index: i64) -> NewChunk {
        NewChunk {
            source_id: source_id.to_string(),
            content: format!("chunk {index}"),
            chunk_index: index,
            token_count: 2,
            embedding: vec![0.1, 0.2],
        }
    }

    #[tokio::test]
    async fn test_delete_notebook_cascades() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("A", "").await.unwrap();
        let other = store.create_notebook("B", "").await.unwrap();
        let src = store.create_source(&text_source(&nb.id, "s")).await.unwrap();
        let keep = store
            .create_source(&text_source(&other.id, "t"))
            .await
            .unwrap();
        store.create_chunk(&chunk(&src.id, 0)).await.unwrap();
        store.create_chunk(&chunk(&keep.id, 0)).await.unwrap();
        store
            .append_message(&nb.id, Role::User, "hi", &[])
            .await
            .unwrap();
        store
            .create_study_artifact(&nb.id, "B", &ArtifactContent::Briefing { text: "x".into() })
            .await
            .unwrap();

        assert!(store.delete_notebook(&nb.id).await.unwrap());
        assert!(!store.delete_notebook(&nb.id).await.unwrap());
        assert!(store.get_source(&src.id).await.unwrap().is_none());
        assert!(store.list_chunks_by_source(&src.id).await.unwrap().is_empty());
        assert!(store.list_messages(&nb.id).await.unwrap().is_empty());
        assert!(store
            .list_study_artifacts(&nb.id, None)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.list_chunks_by_source(&keep.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_source_cascades_to_chunks() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("A", "").await.unwrap();
        let src = store.create_source(&text_source(&nb.id, "s")).await.unwrap();
        store.create_chunk(&chunk(&src.id, 0)).await.unwrap();
        store.create_chunk(&chunk(&src.id, 1)).await.unwrap();

        assert!(store.delete_source(&src.id).await.unwrap());
        assert!(store.list_chunks_by_notebook(&nb.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_chunk_index_rejected() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("A", "").await.unwrap();
        let src = store.create_source(&text_source(&nb.id, "s")).await.unwrap();
        store.create_chunk(&chunk(&src.id, 0)).await.unwrap();
        assert!(store.create_chunk(&chunk(&src.id, 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_list_notebooks_counts_and_recency() {
        let store = InMemoryStore::new();
        let first = store.create_notebook("first", "").await.unwrap();
        let second = store.create_notebook("second", "").await.unwrap();
        store
            .create_source(&text_source(&first.id, "s"))
            .await
            .unwrap();
        store
            .append_message(&first.id, Role::User, "q", &[])
            .await
            .unwrap();

        let listed = store.list_notebooks(20, 0).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].notebook.id, first.id, "touched notebook sorts first");
        assert_eq!(listed[0].source_count, 1);
        assert_eq!(listed[0].message_count, 1);
        assert_eq!(listed[1].notebook.id, second.id);
        assert_eq!(listed[1].source_count, 0);

        assert_eq!(store.list_notebooks(1, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chunks_by_notebook_ordered_by_source_then_index() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("A", "").await.unwrap();
        let s1 = store.create_source(&text_source(&nb.id, "one")).await.unwrap();
        let s2 = store.create_source(&text_source(&nb.id, "two")).await.unwrap();
        store.create_chunk(&chunk(&s2.id, 1)).await.unwrap();
        store.create_chunk(&chunk(&s1.id, 1)).await.unwrap();
        store.create_chunk(&chunk(&s2.id, 0)).await.unwrap();
        store.create_chunk(&chunk(&s1.id, 0)).await.unwrap();

        let order: Vec<(String, i64)> = store
            .list_chunks_by_notebook(&nb.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| (c.source_title, c.chunk.chunk_index))
            .collect();
        assert_eq!(
            order,
            vec![
                ("one".to_string(), 0),
                ("one".to_string(), 1),
                ("two".to_string(), 0),
                ("two".to_string(), 1)
            ]
        );
    }

    #[tokio::test]
    async fn test_artifacts_filtered_by_kind() {
        let store = InMemoryStore::new();
        let nb = store.create_notebook("A", "").await.unwrap();
        store
            .create_study_artifact(&nb.id, "b", &ArtifactContent::Briefing { text: "x".into() })
            .await
            .unwrap();
        store
            .create_study_artifact(&nb.id, "q", &ArtifactContent::Quiz { questions: vec![] })
            .await
            .unwrap();

        let quizzes = store
            .list_study_artifacts(&nb.id, Some(ArtifactKind::Quiz))
            .await
            .unwrap();
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].title, "q");
        assert_eq!(store.list_study_artifacts(&nb.id, None).await.unwrap().len(), 2);
    }
}
