//! SQLite-backed [`Store`] implementation.
//!
//! Timestamps are stored as Unix milliseconds; `rowid` breaks ties between
//! rows written in the same millisecond. Embeddings are little-endian f32
//! BLOBs, citations and artifact bodies are JSON text. Child rows are
//! removed through `ON DELETE CASCADE`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use notebook_rag_core::embedding::{blob_to_vec, vec_to_blob};
use notebook_rag_core::models::{
    ArtifactContent, ArtifactKind, Chunk, Citation, Message, NewChunk, NewSource, Notebook,
    NotebookChunk, NotebookSummary, Role, Source, SourceStatus, StudyArtifact,
};
use notebook_rag_core::store::Store;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp out of range: {}", ms))
}

fn notebook_from_row(row: &SqliteRow) -> Result<Notebook> {
    Ok(Notebook {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    let source_type: String = row.get("type");
    let status: String = row.get("status");
    Ok(Source {
        id: row.get("id"),
        notebook_id: row.get("notebook_id"),
        title: row.get("title"),
        source_type: source_type.parse()?,
        content: row.get("content"),
        url: row.get("url"),
        status: status.parse()?,
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

fn chunk_from_row(row: &SqliteRow) -> Result<Chunk> {
    let blob: Vec<u8> = row.get("embedding");
    Ok(Chunk {
        id: row.get("id"),
        source_id: row.get("source_id"),
        content: row.get("content"),
        chunk_index: row.get("chunk_index"),
        token_count: row.get("token_count"),
        embedding: blob_to_vec(&blob),
        created_at: from_millis(row.get("created_at"))?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let role: String = row.get("role");
    let citations_json: String = row.get("citations_json");
    Ok(Message {
        id: row.get("id"),
        notebook_id: row.get("notebook_id"),
        role: role.parse()?,
        content: row.get("content"),
        citations: serde_json::from_str(&citations_json)
            .context("corrupt citations_json in messages")?,
        created_at: from_millis(row.get("created_at"))?,
    })
}

fn artifact_from_row(row: &SqliteRow) -> Result<StudyArtifact> {
    let content_json: String = row.get("content_json");
    Ok(StudyArtifact {
        id: row.get("id"),
        notebook_id: row.get("notebook_id"),
        title: row.get("title"),
        content: serde_json::from_str(&content_json)
            .context("corrupt content_json in study_artifacts")?,
        created_at: from_millis(row.get("created_at"))?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_notebook(&self, title: &str, description: &str) -> Result<Notebook> {
        let now = Utc::now();
        let notebook = Notebook {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO notebooks (id, title, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&notebook.id)
        .bind(&notebook.title)
        .bind(&notebook.description)
        .bind(now.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(notebook)
    }

    async fn get_notebook(&self, id: &str) -> Result<Option<Notebook>> {
        let row = sqlx::query("SELECT * FROM notebooks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(notebook_from_row).transpose()
    }

    async fn list_notebooks(&self, limit: i64, offset: i64) -> Result<Vec<NotebookSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT n.*,
                   (SELECT COUNT(*) FROM sources s WHERE s.notebook_id = n.id) AS source_count,
                   (SELECT COUNT(*) FROM messages m WHERE m.notebook_id = n.id) AS message_count
            FROM notebooks n
            ORDER BY n.updated_at DESC, n.rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(NotebookSummary {
                    notebook: notebook_from_row(row)?,
                    source_count: row.get("source_count"),
                    message_count: row.get("message_count"),
                })
            })
            .collect()
    }

    async fn delete_notebook(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notebooks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_source(&self, new: &NewSource) -> Result<Source> {
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

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO sources (id, notebook_id, title, type, content, url, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&source.id)
        .bind(&source.notebook_id)
        .bind(&source.title)
        .bind(source.source_type.as_str())
        .bind(&source.content)
        .bind(&source.url)
        .bind(source.status.as_str())
        .bind(now.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to insert source into notebook {}", new.notebook_id))?;

        sqlx::query("UPDATE notebooks SET updated_at = ? WHERE id = ?")
            .bind(now.timestamp_millis())
            .bind(&source.notebook_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(source)
    }

    async fn get_source(&self, id: &str) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT * FROM sources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(source_from_row).transpose()
    }

    async fn list_sources(&self, notebook_id: &str) -> Result<Vec<Source>> {
        let rows = sqlx::query(
            "SELECT * FROM sources WHERE notebook_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(notebook_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(source_from_row).collect()
    }

    async fn update_source_status(&self, id: &str, status: SourceStatus) -> Result<()> {
        let result = sqlx::query("UPDATE sources SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("source {} does not exist", id);
        }
        Ok(())
    }

    async fn delete_source(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_chunk(&self, new: &NewChunk) -> Result<Chunk> {
        let now = Utc::now();
        let chunk = Chunk {
            id: Uuid::new_v4().to_string(),
            source_id: new.source_id.clone(),
            content: new.content.clone(),
            chunk_index: new.chunk_index,
            token_count: new.token_count,
            embedding: new.embedding.clone(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO chunks (id, source_id, content, chunk_index, token_count, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.source_id)
        .bind(&chunk.content)
        .bind(chunk.chunk_index)
        .bind(chunk.token_count)
        .bind(vec_to_blob(&chunk.embedding))
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "failed to insert chunk {} for source {}",
                new.chunk_index, new.source_id
            )
        })?;

        Ok(chunk)
    }

    async fn delete_chunks_by_source(&self, source_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_chunks_by_source(&self, source_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query("SELECT * FROM chunks WHERE source_id = ? ORDER BY chunk_index")
            .bind(source_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(chunk_from_row).collect()
    }

    async fn list_chunks_by_notebook(&self, notebook_id: &str) -> Result<Vec<NotebookChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.*, s.title AS source_title, s.type AS source_type,
                   s.created_at AS source_created_at
            FROM chunks c
            JOIN sources s ON c.source_id = s.id
            WHERE s.notebook_id = ?
            ORDER BY s.created_at, s.rowid, c.chunk_index
            "#,
        )
        .bind(notebook_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let source_type: String = row.get("source_type");
                Ok(NotebookChunk {
                    chunk: chunk_from_row(row)?,
                    source_title: row.get("source_title"),
                    source_type: source_type.parse()?,
                    source_created_at: from_millis(row.get("source_created_at"))?,
                })
            })
            .collect()
    }

    async fn append_message(
        &self,
        notebook_id: &str,
        role: Role,
        content: &str,
        citations: &[Citation],
    ) -> Result<Message> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            notebook_id: notebook_id.to_string(),
            role,
            content: content.to_string(),
            citations: citations.to_vec(),
            created_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO messages (id, notebook_id, role, content, citations_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(notebook_id)
        .bind(role.as_str())
        .bind(content)
        .bind(serde_json::to_string(citations)?)
        .bind(now.timestamp_millis())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to append message to notebook {}", notebook_id))?;

        sqlx::query("UPDATE notebooks SET updated_at = ? WHERE id = ?")
            .bind(now.timestamp_millis())
            .bind(notebook_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(message)
    }

    async fn list_messages(&self, notebook_id: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE notebook_id = ? ORDER BY created_at, rowid",
        )
        .bind(notebook_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn create_study_artifact(
        &self,
        notebook_id: &str,
        title: &str,
        content: &ArtifactContent,
    ) -> Result<StudyArtifact> {
        let now = Utc::now();
        let artifact = StudyArtifact {
            id: Uuid::new_v4().to_string(),
            notebook_id: notebook_id.to_string(),
            title: title.to_string(),
            content: content.clone(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO study_artifacts (id, notebook_id, type, title, content_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&artifact.id)
        .bind(notebook_id)
        .bind(content.kind().as_str())
        .bind(title)
        .bind(serde_json::to_string(content)?)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to store artifact for notebook {}", notebook_id))?;

        Ok(artifact)
    }

    async fn list_study_artifacts(
        &self,
        notebook_id: &str,
        kind: Option<ArtifactKind>,
    ) -> Result<Vec<StudyArtifact>> {
        let kind = kind.map(|k| k.as_str());
        let rows = sqlx::query(
            r#"
            SELECT * FROM study_artifacts
            WHERE notebook_id = ? AND (? IS NULL OR type = ?)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(notebook_id)
        .bind(kind)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(artifact_from_row).collect()
    }
}
