//! # Rag Harness CLI (`rh`)
//!
//! The `rh` binary drives a [`RagEngine`] backed by the SQLite store named in
//! the config file.
//!
//! ## Usage
//!
//! ```bash
//! rh --config ./config/rh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rh init` | Create the SQLite database and run schema migrations |
//! | `rh ingest <path>` | Ingest a file, or every supported file under a directory |
//! | `rh ingest-url <url>` | Fetch a web page and ingest it |
//! | `rh docs` | List documents |
//! | `rh stats` | Show document counts |
//! | `rh delete <id>` | Delete a document and its vectors |
//! | `rh search "<query>"` | Similarity search over ingested documents |
//! | `rh query "<text>"` | Query the configured knowledge bases |
//! | `rh source <action>` | Manage and sync external sources |
//!
//! ## Examples
//!
//! ```bash
//! rh init
//! rh ingest ./docs
//! rh search "borrow checker" --top-k 3 --min-score 0.3
//! rh source add https://example.com/guide --name Guide --kb kb_rust
//! rh source sync ext_0f3c...
//! rh query "how do lifetimes work" --kb kb_rust
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rag_harness::config::{self, Config};
use rag_harness::engine::RagEngine;
use rag_harness::logging::init_tracing;
use rag_harness::migrate;
use rag_harness::sources::NewSource;
use rag_harness_core::models::{ExternalSource, SearchResult, SourceKind};
use rag_harness_core::search::SearchOptions;

/// Rag Harness CLI, a local-first semantic retrieval engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rh",
    about = "Rag Harness, a local-first semantic retrieval engine",
    version,
    long_about = "Rag Harness chunks and embeds documents, web pages, and external sources \
    into a local vector index and answers similarity queries across them and across \
    configured knowledge bases."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest a file, or every supported file under a directory.
    Ingest {
        path: PathBuf,

        /// MIME type of the file. Guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
    },

    /// Fetch a web page through the reader proxy and ingest it.
    IngestUrl { url: String },

    /// List ingested documents.
    Docs,

    /// Show document counts by status.
    Stats,

    /// Delete a document and its vectors.
    Delete { id: String },

    /// Similarity search over ingested documents.
    Search {
        query: String,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        min_score: Option<f32>,

        /// Restrict the search to these document ids.
        #[arg(long = "doc")]
        doc_ids: Vec<String>,
    },

    /// Query the configured knowledge bases and print the merged context.
    Query {
        text: String,

        /// Only query these knowledge bases. Defaults to all enabled ones.
        #[arg(long = "kb")]
        knowledge_bases: Vec<String>,
    },

    /// Manage external sources.
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
}

#[derive(Subcommand)]
enum SourceAction {
    /// Register a new source.
    Add {
        url: String,

        #[arg(long, default_value = "")]
        name: String,

        /// `website`, `api`, or `database`.
        #[arg(long, default_value = "website")]
        kind: SourceKind,

        /// Knowledge base the source belongs to.
        #[arg(long)]
        kb: Option<String>,

        #[arg(long, default_value = "")]
        description: String,
    },
    /// List sources, optionally for one knowledge base.
    List {
        #[arg(long)]
        kb: Option<String>,
    },
    /// Remove a source and its synced content.
    Remove { id: String },
    /// Fetch a source and rebuild its vectors.
    Sync { id: String },
    Enable { id: String },
    Disable { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    if let Commands::Init = cli.command {
        migrate::run_migrations(&cfg).await?;
        println!("Database initialized successfully.");
        return Ok(());
    }

    let engine = RagEngine::from_config(&cfg).await?;

    match cli.command {
        Commands::Init => unreachable!(),
        Commands::Ingest { path, mime } => {
            let docs = if path.is_dir() {
                engine.ingest_dir(&path).await?
            } else {
                vec![engine.ingest_file(&path, mime.as_deref()).await?]
            };
            for doc in &docs {
                let note = match (&doc.error, &doc.metadata.degraded_reason) {
                    (Some(err), _) => format!("  error: {}", err),
                    (None, Some(reason)) => format!("  degraded: {}", reason),
                    (None, None) => String::new(),
                };
                println!(
                    "{}  {}  {} chunks  vectorized: {}{}",
                    doc.id,
                    doc.name,
                    doc.chunks.len(),
                    doc.vectorized,
                    note
                );
            }
            println!("Ingested {} document(s).", docs.len());
        }
        Commands::IngestUrl { url } => {
            let doc = engine.ingest_url(&url).await?;
            println!("{}  {}  {} chunks", doc.id, doc.name, doc.chunks.len());
        }
        Commands::Docs => {
            let docs = engine.list_documents().await;
            if docs.is_empty() {
                println!("No documents.");
            }
            for doc in docs {
                println!(
                    "{}  {:<30}  {:<24}  {:>5} chunks  {}  {}",
                    doc.id,
                    doc.name,
                    doc.mime_type,
                    doc.chunks.len(),
                    if doc.vectorized { "vectorized" } else { "-" },
                    doc.uploaded_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Stats => {
            let stats = engine.stats().await;
            println!("Documents:   {}", stats.total);
            println!("  parsed:    {}", stats.parsed);
            println!("  parsing:   {}", stats.parsing);
            println!("  error:     {}", stats.error);
            println!("Vectorized:  {}", stats.vectorized);
            println!("Chunks:      {}", stats.total_chunks);
        }
        Commands::Delete { id } => {
            if engine.delete_document(&id).await? {
                println!("Deleted {}.", id);
            } else {
                println!("No document with id {}.", id);
            }
        }
        Commands::Search {
            query,
            top_k,
            min_score,
            doc_ids,
        } => {
            let opts = SearchOptions {
                top_k: top_k.unwrap_or(cfg.retrieval.top_k),
                doc_ids: (!doc_ids.is_empty()).then_some(doc_ids),
                min_score: min_score.unwrap_or(cfg.retrieval.min_score),
                use_cache: true,
            };
            let results = engine.search(&query, &opts).await;
            print_results(&results);
        }
        Commands::Query {
            text,
            knowledge_bases,
        } => {
            let selected = select_knowledge_bases(&cfg, &knowledge_bases)?;
            let answer = engine.query_knowledge(&text, &selected).await;
            if answer.is_empty() {
                println!("No knowledge base matched.");
            } else {
                for m in &answer.matches {
                    println!(
                        "# {} ({}, score {:.2})",
                        m.knowledge_base_name,
                        m.strategy.label(),
                        m.score
                    );
                }
                println!();
                println!("{}", answer.context);
            }
        }
        Commands::Source { action } => run_source(&engine, action).await?,
    }

    Ok(())
}

async fn run_source(engine: &RagEngine, action: SourceAction) -> anyhow::Result<()> {
    match action {
        SourceAction::Add {
            url,
            name,
            kind,
            kb,
            description,
        } => {
            let mut new = NewSource::website(name, url)
                .kind(kind)
                .description(description);
            if let Some(kb) = kb {
                new = new.knowledge_base(kb);
            }
            let source = engine.add_source(new).await?;
            println!("Added source {}.", source.id);
        }
        SourceAction::List { kb } => {
            let sources = engine.list_sources(kb.as_deref()).await;
            if sources.is_empty() {
                println!("No external sources.");
            }
            for source in &sources {
                print_source(source);
            }
        }
        SourceAction::Remove { id } => {
            if engine.remove_source(&id).await? {
                println!("Removed source {}.", id);
            } else {
                println!("No source with id {}.", id);
            }
        }
        SourceAction::Sync { id } => {
            let doc = engine.sync_source(&id).await?;
            println!("Synced {}: {} chunks.", id, doc.chunks.len());
        }
        SourceAction::Enable { id } => {
            engine.set_source_enabled(&id, true).await?;
            println!("Enabled {}.", id);
        }
        SourceAction::Disable { id } => {
            engine.set_source_enabled(&id, false).await?;
            println!("Disabled {}.", id);
        }
    }
    Ok(())
}

/// The knowledge bases named on the command line, or every configured one.
fn select_knowledge_bases(
    cfg: &Config,
    ids: &[String],
) -> anyhow::Result<Vec<config::KnowledgeBaseConfig>> {
    if ids.is_empty() {
        return Ok(cfg.knowledge_bases.clone());
    }
    ids.iter()
        .map(|id| {
            cfg.knowledge_bases
                .iter()
                .find(|kb| &kb.id == id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown knowledge base '{}'", id))
        })
        .collect()
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (rank, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} #{} ({})",
            rank + 1,
            r.score,
            r.doc_name,
            r.index,
            r.doc_id
        );
        println!("   {}", r.text.trim().replace('\n', " "));
    }
}

fn print_source(source: &ExternalSource) {
    println!(
        "{}  {:<20}  {:<8}  {:<7}  {}{}",
        source.id,
        source.name,
        source.kind.as_str(),
        source.sync_status.as_str(),
        if source.enabled { "" } else { "(disabled) " },
        source.url
    );
    if let Some(err) = &source.last_error {
        println!("    last error: {}", err);
    }
}
