//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/notebooks` | List notebooks, most recently updated first |
//! | `POST` | `/notebooks` | Create a notebook |
//! | `GET`  | `/notebooks/{id}` | Fetch one notebook |
//! | `DELETE` | `/notebooks/{id}` | Delete a notebook and everything in it |
//! | `GET`  | `/notebooks/{id}/sources` | List sources, newest first |
//! | `POST` | `/notebooks/{id}/sources` | Add a text or URL source |
//! | `POST` | `/notebooks/{id}/sources/pdf` | Add a PDF source (raw body) |
//! | `DELETE` | `/sources/{id}` | Delete a source and its chunks |
//! | `POST` | `/ingest/{source_id}` | Chunk, embed, and store a source |
//! | `POST` | `/chat` | Ask a grounded question |
//! | `GET`  | `/notebooks/{id}/messages` | Conversation log, oldest first |
//! | `POST` | `/briefing`, `/quiz`, `/flashcards` | Generate a study artifact |
//! | `GET`  | `/briefing`, `/quiz`, `/flashcards` | List artifacts (`?notebookId=`) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "title is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `ingest_failed` (422),
//! `extraction_failed` (422), `generation_unavailable` (502),
//! `invalid_generation_format` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use notebook_rag_core::assemble::ChatReply;
use notebook_rag_core::citation::{render_segments, Segment};
use notebook_rag_core::ingest::IngestReport;
use notebook_rag_core::models::{
    ArtifactKind, Message, Notebook, NotebookSummary, Source, StudyArtifact,
};
use notebook_rag_core::source::SourceRequest;
use notebook_rag_core::NotebookError;

use crate::app::App;
use crate::config::Config;

const MAX_PDF_BYTES: usize = 25 * 1024 * 1024;

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = Arc::new(App::open(config).await?);
    let bind_addr = config.server.bind.clone();

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "server listening");
    println!("Notebook server listening on http://{}", bind_addr);

    axum::serve(listener, router(app)).await?;
    Ok(())
}

/// Build the router over a shared [`App`].
pub fn router(app: Arc<App>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/notebooks", get(handle_list_notebooks).post(handle_create_notebook))
        .route(
            "/notebooks/{id}",
            get(handle_get_notebook).delete(handle_delete_notebook),
        )
        .route(
            "/notebooks/{id}/sources",
            get(handle_list_sources).post(handle_add_source),
        )
        .route(
            "/notebooks/{id}/sources/pdf",
            post(handle_add_pdf).layer(DefaultBodyLimit::max(MAX_PDF_BYTES)),
        )
        .route("/notebooks/{id}/messages", get(handle_list_messages))
        .route("/sources/{id}", delete(handle_delete_source))
        .route("/ingest/{source_id}", post(handle_ingest))
        .route("/chat", post(handle_chat))
        .route("/briefing", get(handle_list_briefings).post(handle_briefing))
        .route("/quiz", get(handle_list_quizzes).post(handle_quiz))
        .route(
            "/flashcards",
            get(handle_list_flashcards).post(handle_flashcards),
        )
        .layer(cors)
        .with_state(app)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

impl From<NotebookError> for AppError {
    fn from(err: NotebookError) -> Self {
        let message = err.to_string();
        match err {
            NotebookError::Validation(msg) => bad_request(msg),
            NotebookError::NotFound { .. } => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", message)
            }
            NotebookError::EmptyContent { .. } | NotebookError::NoChunksProduced { .. } => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "ingest_failed", message)
            }
            NotebookError::ExtractionFailed(_) => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed", message)
            }
            NotebookError::GenerationUnavailable(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "generation_unavailable", message)
            }
            NotebookError::InvalidGenerationFormat(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, "invalid_generation_format", message)
            }
            NotebookError::Embedding(_) | NotebookError::Storage(_) => {
                error!(error = %message, "request failed");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        NotebookError::Storage(err).into()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Notebooks ============

#[derive(Deserialize)]
struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
struct NotebookListResponse {
    notebooks: Vec<NotebookSummary>,
}

async fn handle_list_notebooks(
    State(app): State<Arc<App>>,
    Query(params): Query<ListParams>,
) -> Result<Json<NotebookListResponse>, AppError> {
    let limit = params.limit.unwrap_or(50);
    let offset = params.offset.unwrap_or(0);
    if !(1..=500).contains(&limit) || offset < 0 {
        return Err(bad_request("limit must be 1..=500 and offset >= 0"));
    }
    let notebooks = app.store.list_notebooks(limit, offset).await?;
    Ok(Json(NotebookListResponse { notebooks }))
}

#[derive(Deserialize)]
struct CreateNotebookRequest {
    title: String,
    #[serde(default)]
    description: String,
}

async fn handle_create_notebook(
    State(app): State<Arc<App>>,
    Json(req): Json<CreateNotebookRequest>,
) -> Result<(StatusCode, Json<Notebook>), AppError> {
    if req.title.trim().is_empty() {
        return Err(bad_request("title is required"));
    }
    let notebook = app
        .store
        .create_notebook(req.title.trim(), req.description.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(notebook)))
}

async fn handle_get_notebook(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<Notebook>, AppError> {
    let notebook = app
        .store
        .get_notebook(&id)
        .await?
        .ok_or_else(|| NotebookError::not_found("notebook", &id))?;
    Ok(Json(notebook))
}

#[derive(Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn handle_delete_notebook(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    if !app.store.delete_notebook(&id).await? {
        return Err(NotebookError::not_found("notebook", &id).into());
    }
    Ok(Json(DeletedResponse { deleted: true }))
}

// ============ Sources ============

#[derive(Serialize)]
struct SourceListResponse {
    sources: Vec<Source>,
}

async fn handle_list_sources(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<SourceListResponse>, AppError> {
    require_notebook(&app, &id).await?;
    let sources = app.store.list_sources(&id).await?;
    Ok(Json(SourceListResponse { sources }))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AddSourceRequest {
    Text {
        title: String,
        content: String,
    },
    Url {
        #[serde(default)]
        title: Option<String>,
        url: String,
    },
}

async fn handle_add_source(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
    Json(req): Json<AddSourceRequest>,
) -> Result<(StatusCode, Json<Source>), AppError> {
    let request = match req {
        AddSourceRequest::Text { title, content } => SourceRequest::Text { title, content },
        AddSourceRequest::Url { title, url } => SourceRequest::Url { title, url },
    };
    let source = app.add_source(&id, request).await?;
    Ok((StatusCode::CREATED, Json(source)))
}

#[derive(Deserialize)]
struct PdfParams {
    filename: Option<String>,
    title: Option<String>,
}

async fn handle_add_pdf(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
    Query(params): Query<PdfParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<Source>), AppError> {
    let request = SourceRequest::Pdf {
        title: params.title,
        filename: params.filename.unwrap_or_else(|| "document.pdf".to_string()),
        bytes: body.to_vec(),
    };
    let source = app.add_source(&id, request).await?;
    Ok((StatusCode::CREATED, Json(source)))
}

async fn handle_delete_source(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    if !app.store.delete_source(&id).await? {
        return Err(NotebookError::not_found("source", &id).into());
    }
    Ok(Json(DeletedResponse { deleted: true }))
}

async fn handle_ingest(
    State(app): State<Arc<App>>,
    Path(source_id): Path<String>,
) -> Result<Json<IngestReport>, AppError> {
    Ok(Json(app.ingest(&source_id).await?))
}

// ============ Chat ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    notebook_id: String,
    message: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct ChatResponse {
    #[serde(flatten)]
    reply: ChatReply,
    /// The assistant reply split into text runs and resolved citations.
    segments: Vec<Segment>,
}

async fn handle_chat(
    State(app): State<Arc<App>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.top_k == Some(0) {
        return Err(bad_request("topK must be >= 1"));
    }
    let reply = app.chat(&req.notebook_id, &req.message, req.top_k).await?;
    let segments = render_segments(&reply.assistant_message.content, &reply.context);
    Ok(Json(ChatResponse { reply, segments }))
}

#[derive(Serialize)]
struct MessageListResponse {
    messages: Vec<Message>,
}

async fn handle_list_messages(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<MessageListResponse>, AppError> {
    require_notebook(&app, &id).await?;
    let messages = app.store.list_messages(&id).await?;
    Ok(Json(MessageListResponse { messages }))
}

// ============ Study artifacts ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactRequest {
    notebook_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    question_count: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactQuery {
    notebook_id: Option<String>,
}

#[derive(Serialize)]
struct ArtifactListResponse {
    artifacts: Vec<StudyArtifact>,
}

async fn handle_briefing(
    State(app): State<Arc<App>>,
    Json(req): Json<ArtifactRequest>,
) -> Result<(StatusCode, Json<StudyArtifact>), AppError> {
    let artifact = app
        .briefing(&req.notebook_id, req.title.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

async fn handle_quiz(
    State(app): State<Arc<App>>,
    Json(req): Json<ArtifactRequest>,
) -> Result<(StatusCode, Json<StudyArtifact>), AppError> {
    let artifact = app
        .quiz(&req.notebook_id, req.title.as_deref(), req.question_count)
        .await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

async fn handle_flashcards(
    State(app): State<Arc<App>>,
    Json(req): Json<ArtifactRequest>,
) -> Result<(StatusCode, Json<StudyArtifact>), AppError> {
    let artifact = app
        .flashcards(&req.notebook_id, req.title.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

async fn list_artifacts(
    app: &App,
    query: ArtifactQuery,
    kind: ArtifactKind,
) -> Result<Json<ArtifactListResponse>, AppError> {
    let notebook_id = query
        .notebook_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| bad_request("notebookId is required"))?;
    require_notebook(app, &notebook_id).await?;
    let artifacts = app
        .store
        .list_study_artifacts(&notebook_id, Some(kind))
        .await?;
    Ok(Json(ArtifactListResponse { artifacts }))
}

async fn handle_list_briefings(
    State(app): State<Arc<App>>,
    Query(query): Query<ArtifactQuery>,
) -> Result<Json<ArtifactListResponse>, AppError> {
    list_artifacts(&app, query, ArtifactKind::Briefing).await
}

async fn handle_list_quizzes(
    State(app): State<Arc<App>>,
    Query(query): Query<ArtifactQuery>,
) -> Result<Json<ArtifactListResponse>, AppError> {
    list_artifacts(&app, query, ArtifactKind::Quiz).await
}

async fn handle_list_flashcards(
    State(app): State<Arc<App>>,
    Query(query): Query<ArtifactQuery>,
) -> Result<Json<ArtifactListResponse>, AppError> {
    list_artifacts(&app, query, ArtifactKind::Flashcards).await
}

async fn require_notebook(app: &App, id: &str) -> Result<(), AppError> {
    match app.store.get_notebook(id).await? {
        Some(_) => Ok(()),
        None => Err(NotebookError::not_found("notebook", id).into()),
    }
}
