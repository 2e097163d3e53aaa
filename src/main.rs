//! # clinic-rag CLI
//!
//! Indexes the clinic FAQ into a vector index and answers patient messages,
//! either one-off from the command line or through the `/chat` HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! clinic-rag --config ./config/clinic-rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `clinic-rag init` | Create the vector index if missing and wait until ready |
//! | `clinic-rag index` | Embed the FAQ file and upsert it in batches |
//! | `clinic-rag ask "<query>"` | Retrieve FAQ context and print a generated answer |
//! | `clinic-rag chat "<message>"` | Route a message and print the JSON response |
//! | `clinic-rag serve` | Start the `/chat` HTTP server |
//!
//! Credentials come from `PINECONE_API_KEY`, `PINECONE_ENVIRONMENT` and
//! `GEMINI_API_KEY`; a `.env` file in the working directory is loaded first.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use clinic_rag::config::{resolve_config, Config};
use clinic_rag::error::RagError;
use clinic_rag::indexer::IndexOutcome;
use clinic_rag::logging::init_logging;
use clinic_rag::progress::ProgressMode;
use clinic_rag::server::run_server;
use clinic_rag::services::Services;
use clinic_rag::vector_index::{ensure_index, index_spec};

/// Clinic FAQ assistant: index the FAQ, answer questions, serve `/chat`.
#[derive(Parser)]
#[command(
    name = "clinic-rag",
    about = "Clinic FAQ assistant backed by a vector index and Gemini",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/clinic-rag.toml`, or built-in defaults when
    /// that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector index if it is missing and wait until it is ready.
    ///
    /// Idempotent: an existing index is left as is.
    Init,

    /// Embed every FAQ entry and upsert the vectors.
    ///
    /// Document ids are `faq_<position>`, so re-running overwrites the
    /// previous vectors in place.
    Index {
        /// Progress output on stderr. Defaults to `human` on a TTY, `off`
        /// otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Answer a question from the FAQ index.
    Ask {
        /// The question.
        query: String,
    },

    /// Route a message as `POST /chat` would and print the JSON response.
    Chat {
        /// The patient's message.
        message: String,
    },

    /// Start the `/chat` HTTP server.
    Serve {
        /// Index the FAQ file before accepting requests. Failures are logged
        /// and the server starts anyway.
        #[arg(long)]
        index_on_startup: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut cfg = resolve_config(cli.config.as_deref())?;
    init_logging(&cfg.logging)?;

    let result = match cli.command {
        Commands::Init => run_init(&cfg).await,
        Commands::Index { progress } => run_index(&cfg, progress).await,
        Commands::Ask { query } => {
            let services = Services::from_config(&cfg)?;
            let answer = services.rag.retrieve_and_generate_answer(&query).await?;
            println!("{}", answer);
            Ok(())
        }
        Commands::Chat { message } => {
            let services = Services::from_config(&cfg)?;
            let response = services.router.handle(&message).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Serve { index_on_startup } => {
            cfg.server.index_on_startup |= index_on_startup;
            run_server(&cfg).await
        }
    };

    if let Err(e) = &result {
        if let Some(RagError::IndexNotReady { .. }) = e.downcast_ref::<RagError>() {
            eprintln!(
                "hint: the index may still be initialising; re-run later or raise \
                 [index.readiness] max_attempts"
            );
        }
    }
    result
}

async fn run_init(cfg: &Config) -> Result<()> {
    let services = Services::from_config(cfg)?;
    let spec = index_spec(cfg);
    let description =
        ensure_index(services.index.as_ref(), &spec, &cfg.index.readiness.policy()).await?;

    println!(
        "index {} ready (dimension {}, metric {})",
        description.name, description.dimension, description.metric
    );
    if let Some(host) = &description.host {
        println!("  host: {}", host);
    }
    Ok(())
}

async fn run_index(cfg: &Config, progress: Option<ProgressMode>) -> Result<()> {
    let services = Services::from_config(cfg)?;
    let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
    let report = services
        .indexer()
        .with_progress(mode.reporter())
        .index_faq_data()
        .await?;

    match report.outcome {
        IndexOutcome::Aborted => {
            println!(
                "indexing aborted: FAQ file not found: {}",
                cfg.data.faq_path.display()
            );
        }
        IndexOutcome::Completed => {
            println!("index {}", cfg.index.name);
            println!("  entries: {}", report.entries);
            println!("  upserted: {}", report.upserted);
            println!("  batches: {}", report.batches);
            if let Some(digest) = &report.source_digest {
                println!("  source sha256: {}", digest);
            }
            println!("ok");
        }
    }
    Ok(())
}
