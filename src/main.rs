//! # Lecture RAG CLI (`lrag`)
//!
//! ## Usage
//!
//! ```bash
//! lrag --config ./config/lrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lrag init` | Create the SQLite database and schema |
//! | `lrag ingest <file>` | Chunk, embed, and store a lecture text file |
//! | `lrag documents` | List stored documents |
//! | `lrag delete <filename>` | Remove a document and its chunks |
//! | `lrag ask "<question>" --user <id>` | Answer a question from the lecture material |
//! | `lrag history [--user <id>]` | Show previously answered questions |
//! | `lrag stats` | Database summary |
//! | `lrag serve` | Start the HTTP API |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lecture_rag::{answer, config, ingest, migrate, server, state::AppContext, stats};

/// Lecture RAG: retrieval-augmented question answering over lecture material.
#[derive(Parser)]
#[command(name = "lrag", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest a plain-text lecture file.
    ///
    /// Re-ingesting the same name replaces the earlier upload.
    Ingest {
        /// UTF-8 text file extracted from the lecture material.
        file: PathBuf,

        /// Store under this filename instead of the file's own name.
        #[arg(long)]
        name: Option<String>,
    },

    /// List stored documents.
    Documents,

    /// Delete a document and its chunks.
    Delete {
        filename: String,
    },

    /// Ask a question.
    Ask {
        question: String,

        /// Id of the asking user; answers are cached per user.
        #[arg(long)]
        user: i64,
    },

    /// Show answered questions, newest first.
    History {
        /// Only this user's questions.
        #[arg(long)]
        user: Option<i64>,
    },

    /// Show database statistics.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, name } => {
            let ctx = AppContext::open(cfg).await?;
            ingest::run_ingest(&ctx, &file, name).await?;
        }
        Commands::Documents => {
            let ctx = AppContext::open_offline(cfg).await?;
            ingest::run_list_documents(&ctx).await?;
        }
        Commands::Delete { filename } => {
            let ctx = AppContext::open_offline(cfg).await?;
            ingest::run_delete(&ctx, &filename).await?;
        }
        Commands::Ask { question, user } => {
            let ctx = AppContext::open(cfg).await?;
            answer::run_ask(&ctx, user, &question).await?;
        }
        Commands::History { user } => {
            let ctx = AppContext::open_offline(cfg).await?;
            answer::run_history(&ctx, user).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            let ctx = AppContext::open(cfg).await?;
            server::run_server(ctx).await?;
        }
    }

    Ok(())
}
