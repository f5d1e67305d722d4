//! # CourseMaster CLI (`cm`)
//!
//! ## Usage
//!
//! ```bash
//! cm --config ./config/coursemaster.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cm init` | Create the SQLite database and run schema migrations |
//! | `cm index <owner> <file-id> <path>` | Extract, chunk, embed, and store a document |
//! | `cm query <owner> <file-id> "<query>"` | Most similar chunks of one document |
//! | `cm context <owner> <file-id>` | Context string for chat, summary, or quiz generation |
//! | `cm delete <owner> <file-id>` | Remove a document's chunks |
//! | `cm stats <owner> <file-id>` | Chunk and character totals |
//! | `cm weakness record <owner> <concept>...` | Record missed concepts |
//! | `cm weakness list <owner>` | Most frequent weaknesses |
//!
//! If the config file does not exist, built-in defaults are used.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use coursemaster::config::{self, Config};
use coursemaster::{commands, logging, migrate};
use coursemaster_core::engine::UseCase;
use coursemaster_core::weakness::DEFAULT_TOP_WEAKNESSES;

/// CourseMaster: tenant-scoped document retrieval for study assistants.
#[derive(Parser)]
#[command(name = "cm", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/coursemaster.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Index a PDF or text file for one owner.
    ///
    /// Reindexing an existing file id replaces its chunks.
    Index {
        owner: String,
        file_id: String,
        path: PathBuf,
    },

    /// Search one document for the chunks most similar to a query.
    Query {
        owner: String,
        file_id: String,
        query: String,

        /// Number of chunks (default: retrieval.query_top_k).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print `{chunks, total_results}` JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the context string handed to the generation step.
    Context {
        owner: String,
        file_id: String,

        /// Rank chunks by this topic; without it, the first chunks are used.
        #[arg(long)]
        topic: Option<String>,

        /// chat, summary, or quiz; selects the default top-k.
        #[arg(long, default_value = "chat", value_parser = parse_use_case)]
        use_case: UseCase,

        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Delete every chunk of a document.
    Delete { owner: String, file_id: String },

    /// Show chunk and character totals of a document.
    Stats { owner: String, file_id: String },

    /// Track concepts a student keeps missing.
    Weakness {
        #[command(subcommand)]
        action: WeaknessAction,
    },
}

#[derive(Subcommand)]
enum WeaknessAction {
    /// Record one miss for each distinct concept.
    Record {
        owner: String,
        #[arg(required = true)]
        concepts: Vec<String>,
    },
    /// List weaknesses by descending frequency.
    List {
        owner: String,
        #[arg(long, default_value_t = DEFAULT_TOP_WEAKNESSES)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
}

fn parse_use_case(s: &str) -> Result<UseCase, String> {
    s.parse::<UseCase>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::minimal()
    };
    logging::init_logging(&cfg.logging, cli.verbose)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            owner,
            file_id,
            path,
        } => {
            commands::run_index(&cfg, &owner, &file_id, &path).await?;
        }
        Commands::Query {
            owner,
            file_id,
            query,
            top_k,
            json,
        } => {
            commands::run_query(&cfg, &owner, &file_id, &query, top_k, json).await?;
        }
        Commands::Context {
            owner,
            file_id,
            topic,
            use_case,
            top_k,
        } => {
            commands::run_context(&cfg, &owner, &file_id, topic.as_deref(), use_case, top_k)
                .await?;
        }
        Commands::Delete { owner, file_id } => {
            commands::run_delete(&cfg, &owner, &file_id).await?;
        }
        Commands::Stats { owner, file_id } => {
            commands::run_stats(&cfg, &owner, &file_id).await?;
        }
        Commands::Weakness { action } => match action {
            WeaknessAction::Record { owner, concepts } => {
                commands::run_weakness_record(&cfg, &owner, &concepts).await?;
            }
            WeaknessAction::List { owner, limit, json } => {
                commands::run_weakness_list(&cfg, &owner, limit, json).await?;
            }
        },
    }

    Ok(())
}
