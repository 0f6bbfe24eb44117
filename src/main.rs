//! # Notebook RAG CLI (`nb`)
//!
//! ## Usage
//!
//! ```bash
//! nb --config ./config/nb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `nb init` | Create the SQLite database and run schema migrations |
//! | `nb notebook create\|list\|delete` | Manage notebooks |
//! | `nb source add-text\|add-url\|add-pdf\|list\|delete` | Manage sources |
//! | `nb ingest <source-id>` | Chunk and embed a source |
//! | `nb retrieve <notebook> "<query>"` | Show the closest chunks |
//! | `nb ask <notebook> "<question>"` | Grounded chat turn |
//! | `nb messages <notebook>` | Print the conversation log |
//! | `nb briefing\|quiz\|flashcards <notebook>` | Generate a study artifact |
//! | `nb artifacts <notebook>` | List stored study artifacts |
//! | `nb serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! nb init
//! nb notebook create "Marine Biology"
//! nb source add-url <notebook-id> https://en.wikipedia.org/wiki/Coral_reef
//! nb ingest <source-id>
//! nb ask <notebook-id> "What do polyps eat?"
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use notebook_rag::app::App;
use notebook_rag::config::{self, Config};
use notebook_rag::{migrate, server};
use notebook_rag_core::citation::citation_token;
use notebook_rag_core::models::{ArtifactContent, ArtifactKind, StudyArtifact};
use notebook_rag_core::source::SourceRequest;

/// Notebook RAG: ground answers, briefings, quizzes, and flashcards in the
/// sources you add to a notebook.
#[derive(Parser)]
#[command(name = "nb", version, about = "Notebook RAG: grounded chat and study artifacts over your sources")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/nb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Create, list, or delete notebooks.
    Notebook {
        #[command(subcommand)]
        action: NotebookAction,
    },

    /// Add, list, or delete sources.
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Chunk, embed, and store a source's content.
    Ingest {
        /// Source UUID.
        source_id: String,
    },

    /// Rank a notebook's chunks against a query.
    Retrieve {
        notebook_id: String,
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Ask a question answered from the notebook's sources.
    Ask {
        notebook_id: String,
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Print a notebook's conversation, oldest first.
    Messages { notebook_id: String },

    /// Generate a briefing document.
    Briefing {
        notebook_id: String,
        #[arg(long)]
        title: Option<String>,
    },

    /// Generate a quiz.
    Quiz {
        notebook_id: String,
        #[arg(long)]
        title: Option<String>,
        /// Number of questions to request.
        #[arg(long)]
        questions: Option<usize>,
    },

    /// Generate a flashcard set.
    Flashcards {
        notebook_id: String,
        #[arg(long)]
        title: Option<String>,
    },

    /// List stored study artifacts, newest first.
    Artifacts {
        notebook_id: String,
        /// Only show `briefing`, `quiz`, or `flashcards`.
        #[arg(long)]
        kind: Option<String>,
    },

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum NotebookAction {
    Create {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    List {
        #[arg(long, default_value = "50")]
        limit: i64,
        #[arg(long, default_value = "0")]
        offset: i64,
    },
    Delete { notebook_id: String },
}

#[derive(Subcommand)]
enum SourceAction {
    /// Add pasted text. Reads stdin when `--content` is omitted.
    AddText {
        notebook_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: Option<String>,
    },
    /// Fetch and add a web page.
    AddUrl {
        notebook_id: String,
        url: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Extract and add a local PDF file.
    AddPdf {
        notebook_id: String,
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },
    List { notebook_id: String },
    Delete { source_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        command => run_command(&cfg, command).await?,
    }

    Ok(())
}

async fn run_command(cfg: &Config, command: Commands) -> Result<()> {
    let app = App::open(cfg).await?;

    match command {
        Commands::Notebook { action } => notebook_command(&app, action).await?,
        Commands::Source { action } => source_command(&app, action).await?,
        Commands::Ingest { source_id } => {
            let report = app.ingest(&source_id).await?;
            println!(
                "Ingested source {}: {} chunks",
                report.source_id, report.chunks_created
            );
        }
        Commands::Retrieve {
            notebook_id,
            query,
            top_k,
        } => {
            let hits = app.retrieve(&notebook_id, &query, top_k).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {} {} ({})",
                    i + 1,
                    hit.distance,
                    citation_token(&hit.chunk.source_id, hit.chunk.chunk_index),
                    hit.source_title,
                    hit.source_type
                );
                println!("   {}", preview(&hit.chunk.content, 160));
            }
        }
        Commands::Ask {
            notebook_id,
            question,
            top_k,
        } => {
            let reply = app.chat(&notebook_id, &question, top_k).await?;
            println!("{}", reply.assistant_message.content);
            if !reply.assistant_message.citations.is_empty() {
                println!();
                println!("Sources:");
                for c in &reply.assistant_message.citations {
                    println!(
                        "  {} {}",
                        citation_token(&c.source_id, c.chunk_index),
                        c.source_title
                    );
                }
            }
        }
        Commands::Messages { notebook_id } => {
            let messages = app.store.list_messages(&notebook_id).await?;
            for m in messages {
                println!("[{}] {}: {}", m.created_at.to_rfc3339(), m.role.as_str(), m.content);
            }
        }
        Commands::Briefing { notebook_id, title } => {
            let artifact = app.briefing(&notebook_id, title.as_deref()).await?;
            print_artifact(&artifact);
        }
        Commands::Quiz {
            notebook_id,
            title,
            questions,
        } => {
            let artifact = app.quiz(&notebook_id, title.as_deref(), questions).await?;
            print_artifact(&artifact);
        }
        Commands::Flashcards { notebook_id, title } => {
            let artifact = app.flashcards(&notebook_id, title.as_deref()).await?;
            print_artifact(&artifact);
        }
        Commands::Artifacts { notebook_id, kind } => {
            let kind = kind.as_deref().map(str::parse::<ArtifactKind>).transpose()?;
            let artifacts = app.store.list_study_artifacts(&notebook_id, kind).await?;
            if artifacts.is_empty() {
                println!("No artifacts.");
            }
            for a in artifacts {
                println!(
                    "{}  {:<10}  {}  {}",
                    a.id,
                    a.kind().as_str(),
                    a.created_at.format("%Y-%m-%d %H:%M"),
                    a.title
                );
            }
        }
        Commands::Init | Commands::Serve => {}
    }

    Ok(())
}

async fn notebook_command(app: &App, action: NotebookAction) -> Result<()> {
    match action {
        NotebookAction::Create { title, description } => {
            if title.trim().is_empty() {
                bail!("title must not be empty");
            }
            let nb = app
                .store
                .create_notebook(title.trim(), description.trim())
                .await?;
            println!("{}", nb.id);
        }
        NotebookAction::List { limit, offset } => {
            let notebooks = app.store.list_notebooks(limit, offset).await?;
            if notebooks.is_empty() {
                println!("No notebooks.");
            }
            for s in notebooks {
                println!(
                    "{}  {}  ({} sources, {} messages)",
                    s.notebook.id, s.notebook.title, s.source_count, s.message_count
                );
            }
        }
        NotebookAction::Delete { notebook_id } => {
            if !app.store.delete_notebook(&notebook_id).await? {
                bail!("notebook not found: {}", notebook_id);
            }
            println!("Deleted notebook {}", notebook_id);
        }
    }
    Ok(())
}

async fn source_command(app: &App, action: SourceAction) -> Result<()> {
    let (notebook_id, request) = match action {
        SourceAction::AddText {
            notebook_id,
            title,
            content,
        } => {
            let content = match content {
                Some(c) => c,
                None => std::io::read_to_string(std::io::stdin())
                    .context("Failed to read content from stdin")?,
            };
            (notebook_id, SourceRequest::Text { title, content })
        }
        SourceAction::AddUrl {
            notebook_id,
            url,
            title,
        } => (notebook_id, SourceRequest::Url { title, url }),
        SourceAction::AddPdf {
            notebook_id,
            path,
            title,
        } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document.pdf".to_string());
            (
                notebook_id,
                SourceRequest::Pdf {
                    title,
                    filename,
                    bytes,
                },
            )
        }
        SourceAction::List { notebook_id } => {
            let sources = app.store.list_sources(&notebook_id).await?;
            if sources.is_empty() {
                println!("No sources.");
            }
            for s in sources {
                println!(
                    "{}  {:<4}  {:<11}  {}",
                    s.id,
                    s.source_type.as_str(),
                    s.status.as_str(),
                    s.title
                );
            }
            return Ok(());
        }
        SourceAction::Delete { source_id } => {
            if !app.store.delete_source(&source_id).await? {
                bail!("source not found: {}", source_id);
            }
            println!("Deleted source {}", source_id);
            return Ok(());
        }
    };

    let source = app.add_source(&notebook_id, request).await?;
    println!("{}  {}  {}", source.id, source.status, source.title);
    Ok(())
}

fn print_artifact(artifact: &StudyArtifact) {
    println!("{} ({})", artifact.title, artifact.id);
    println!();
    match &artifact.content {
        ArtifactContent::Briefing { text } => println!("{}", text),
        ArtifactContent::Quiz { questions } => {
            for (i, q) in questions.iter().enumerate() {
                println!("{}. {}", i + 1, q.question);
                for (j, opt) in q.options.iter().enumerate() {
                    let letter = (b'A' + (j % 26) as u8) as char;
                    println!("   {}) {}", letter, opt);
                }
                println!("   Answer: {}", q.answer);
            }
        }
        ArtifactContent::Flashcards { cards } => {
            for card in cards {
                println!("Q: {}", card.front);
                println!("A: {}", card.back);
                println!();
            }
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}
