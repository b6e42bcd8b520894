//! # Botforge CLI (`botforge`)
//!
//! The `botforge` binary drives the whole pipeline: database setup, crawl
//! and upload ingestion, bot management, claiming staged content, and asking
//! questions.
//!
//! ## Usage
//!
//! ```bash
//! botforge --config ./botforge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `botforge init` | Create the SQLite database and run schema migrations |
//! | `botforge crawl <url>` | Crawl a site, chunk its text, stage the batch |
//! | `botforge upload <files…>` | Extract and chunk files, stage the batch |
//! | `botforge bot create` | Create a bot persona |
//! | `botforge bot list` | List all bots |
//! | `botforge bot update <id>` | Patch a bot's name, language, or prompt |
//! | `botforge bot delete <id>` | Delete a bot, its vectors, and its history |
//! | `botforge claim <bot> <session>` | Index a staged batch into a bot |
//! | `botforge ask <bot> "<query>"` | Ask a bot a question |
//! | `botforge history <bot>` | Print a bot's conversation log |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use botforge::bots::{self, ClaimError};
use botforge::crawl::{CrawlLimits, HttpFetcher};
use botforge::embedding::create_embedder;
use botforge::generate::create_generative_client;
use botforge::ingest::{self, IngestError};
use botforge::models::{BotDraft, BotPatch};
use botforge::{answer, config, db, history, migrate};

/// Botforge — build retrieval-grounded chat bots from crawled sites and
/// uploaded documents.
#[derive(Parser)]
#[command(
    name = "botforge",
    about = "Build retrieval-grounded chat bots from crawled sites and uploaded documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./botforge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Idempotent.
    Init,

    /// Crawl a website and stage its chunked text.
    ///
    /// Breadth-first within the seed URL's subtree, bounded by depth,
    /// concurrency, and page budget. Prints the staging session id to pass
    /// to `claim`.
    Crawl {
        /// Seed URL; crawling stays within this URL's subtree.
        url: String,

        /// Override the configured crawl depth (1-10).
        #[arg(long)]
        depth: Option<usize>,

        /// Override the configured page budget (1-100).
        #[arg(long)]
        page_limit: Option<usize>,
    },

    /// Extract, chunk, and stage a batch of files.
    ///
    /// Supported: .txt, .pdf, .docx, .csv. Unreadable files are skipped;
    /// the command fails only when nothing at all could be extracted.
    Upload {
        /// Files to ingest.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Manage bot personas.
    Bot {
        #[command(subcommand)]
        action: BotAction,
    },

    /// Index a staged batch into a bot's knowledge.
    ///
    /// The session id comes from a prior `crawl` or `upload`; staged batches
    /// expire 30 minutes after creation.
    Claim {
        /// Bot id.
        bot_id: String,
        /// Staging session id.
        session_id: String,
    },

    /// Ask a bot a question grounded in its indexed knowledge.
    Ask {
        /// Bot id.
        bot_id: String,
        /// The question.
        query: String,
    },

    /// Print a bot's conversation log, oldest first.
    History {
        /// Bot id.
        bot_id: String,
    },
}

/// Bot management subcommands.
#[derive(Subcommand)]
enum BotAction {
    /// Create a bot persona.
    Create {
        /// Display name.
        name: String,
        /// Response language (e.g. `English`).
        language: String,
        /// System prompt defining the bot's persona.
        system_prompt: String,
    },
    /// List all bots.
    List,
    /// Update a bot. Only name, language, and system prompt can change.
    Update {
        /// Bot id.
        bot_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        system_prompt: Option<String>,
    },
    /// Delete a bot along with its vectors and chat history.
    Delete {
        /// Bot id.
        bot_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }

        Commands::Crawl {
            url,
            depth,
            page_limit,
        } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;

            let limits = CrawlLimits {
                max_depth: depth.unwrap_or(cfg.crawl.max_depth).clamp(1, 10),
                max_concurrency: cfg.crawl.max_concurrency,
                page_limit: page_limit.unwrap_or(cfg.crawl.page_limit).clamp(1, 100),
                memory_threshold_percent: cfg.crawl.memory_threshold_percent,
            };
            let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(
                cfg.crawl.fetch_timeout_secs,
            ))?);

            match ingest::ingest_crawl(
                &pool,
                fetcher,
                &url,
                &limits,
                &cfg.chunking,
                cfg.staging.retention_secs,
            )
            .await
            {
                Ok(report) => {
                    println!("Crawled {} pages into {} chunks.", report.pages_crawled, report.chunk_count);
                    println!("Session id: {}", report.session_id);
                    println!("Claim it within {} minutes.", cfg.staging.retention_secs / 60);
                }
                Err(IngestError::NoUsableContent) => {
                    println!("Nothing usable found at {}.", url);
                    std::process::exit(1);
                }
                Err(IngestError::Internal(e)) => return Err(e),
            }
        }

        Commands::Upload { files } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;

            let mut batch: Vec<(String, Vec<u8>)> = Vec::with_capacity(files.len());
            for path in &files {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let bytes = std::fs::read(path)?;
                batch.push((name, bytes));
            }

            match ingest::ingest_files(&pool, &batch, &cfg.chunking, cfg.staging.retention_secs)
                .await
            {
                Ok(report) => {
                    println!("Staged {} chunks from {} files.", report.chunk_count, files.len());
                    println!("Session id: {}", report.session_id);
                    println!("Claim it within {} minutes.", cfg.staging.retention_secs / 60);
                }
                Err(IngestError::NoUsableContent) => {
                    println!("Nothing usable could be extracted from the given files.");
                    std::process::exit(1);
                }
                Err(IngestError::Internal(e)) => return Err(e),
            }
        }

        Commands::Bot { action } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;

            match action {
                BotAction::Create {
                    name,
                    language,
                    system_prompt,
                } => {
                    let bot = bots::create_bot(
                        &pool,
                        &BotDraft {
                            name,
                            language,
                            system_prompt,
                        },
                    )
                    .await?;
                    println!("Created bot {} ({}).", bot.id, bot.name);
                }
                BotAction::List => {
                    let all = bots::list_bots(&pool).await?;
                    if all.is_empty() {
                        println!("No bots yet.");
                    }
                    for bot in all {
                        println!("{}  {}  [{}]", bot.id, bot.name, bot.language);
                    }
                }
                BotAction::Update {
                    bot_id,
                    name,
                    language,
                    system_prompt,
                } => {
                    let patch = BotPatch {
                        name,
                        language,
                        system_prompt,
                    };
                    match bots::update_bot(&pool, &bot_id, &patch).await? {
                        Some(bot) => println!("Updated bot {} ({}).", bot.id, bot.name),
                        None => {
                            println!("No bot with id {}.", bot_id);
                            std::process::exit(1);
                        }
                    }
                }
                BotAction::Delete { bot_id } => {
                    if bots::delete_bot(&pool, &bot_id).await? {
                        println!("Deleted bot {}.", bot_id);
                    } else {
                        println!("No bot with id {}.", bot_id);
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Claim { bot_id, session_id } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;
            let embedder = create_embedder(&cfg.embedding)?;

            match bots::materialize_bot_knowledge(
                &pool,
                embedder.as_ref(),
                &bot_id,
                &session_id,
                cfg.staging.retention_secs,
            )
            .await
            {
                Ok(indexed) => println!("Indexed {} chunks into bot {}.", indexed, bot_id),
                Err(e @ (ClaimError::BotNotFound(_) | ClaimError::SessionNotFound(_))) => {
                    println!("{}", e);
                    std::process::exit(1);
                }
                Err(ClaimError::Internal(e)) => return Err(e),
            }
        }

        Commands::Ask { bot_id, query } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;
            let embedder = create_embedder(&cfg.embedding)?;
            let client = create_generative_client(&cfg.generation)?;

            let response = answer::ask(
                &pool,
                embedder.as_ref(),
                client.as_ref(),
                &bot_id,
                &query,
                cfg.retrieval.top_k,
            )
            .await?;
            println!("{}", response);
        }

        Commands::History { bot_id } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;

            let messages = history::list(&pool, &bot_id).await?;
            if messages.is_empty() {
                println!("No history for bot {}.", bot_id);
            }
            for message in messages {
                println!("[{}] Q: {}", message.created_at.format("%Y-%m-%d %H:%M:%S"), message.query);
                println!("    A: {}", message.response);
            }
        }
    }

    Ok(())
}
