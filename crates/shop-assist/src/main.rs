//! # Shop Assist CLI (`shopctl`)
//!
//! The `shopctl` binary drives the retrieval engine: database
//! initialization, catalog import, reindexing, search, and chat turns.
//!
//! ## Usage
//!
//! ```bash
//! shopctl --config ./config/shop.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shopctl init` | Create the SQLite database and run schema migrations |
//! | `shopctl import <file>` | Seed the catalog from a JSON file |
//! | `shopctl reindex <target>` | Rebuild chunks+embeddings (`all`, `faqs`, `services`, `documents`) |
//! | `shopctl search <kind> "<query>"` | Ranked search over one entity kind |
//! | `shopctl chat "<message>"` | Run one assistant turn with tool calling |
//! | `shopctl stats` | Row counts per table |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use shop_assist::completion::{ChatMessage, OpenAiChat};
use shop_assist::config::{load_config, Config};
use shop_assist::dispatch::Dispatcher;
use shop_assist::embedding::create_embedder;
use shop_assist::import::import_catalog;
use shop_assist::retrieval::Retriever;
use shop_assist::sqlite_store::SqliteStore;
use shop_assist::tools::ToolExecutor;
use shop_assist::{db, migrate};

/// Shop Assist CLI — retrieval-augmented assistant engine for the
/// ShopMefy storefront.
#[derive(Parser)]
#[command(
    name = "shopctl",
    about = "Shop Assist — chunking, embeddings, hybrid search, and the tool-calling chat loop",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/shop.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Seed products, FAQs, services, and documents from a JSON file.
    Import {
        /// Path to the catalog JSON file.
        file: PathBuf,
    },

    /// Rebuild chunks and embeddings.
    ///
    /// Target is `all`, `faqs`, `services`, or `documents`; pass
    /// `--id` to reindex a single record.
    Reindex {
        target: String,
        /// Reindex only this record.
        #[arg(long)]
        id: Option<String>,
    },

    /// Ranked hybrid search over one entity kind.
    Search {
        /// `faqs`, `services`, or `documents`.
        kind: String,
        query: String,
        /// Maximum results (defaults to retrieval.default_limit).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run one assistant chat turn.
    Chat { message: String },

    /// Row counts per table.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::Import { file } => run_import(&config, &file).await,
        Commands::Reindex { target, id } => run_reindex(&config, &target, id.as_deref()).await,
        Commands::Search { kind, query, limit } => {
            run_search(&config, &kind, &query, limit).await
        }
        Commands::Chat { message } => run_chat(&config, &message).await,
        Commands::Stats => run_stats(&config).await,
    }
}

async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    Ok(Arc::new(SqliteStore::new(pool, config.embedding.dims)))
}

fn build_retriever(config: &Config, store: Arc<SqliteStore>) -> Result<Arc<Retriever>> {
    let embedder = Arc::new(create_embedder(&config.embedding)?);
    Ok(Arc::new(Retriever::new(
        store.clone(),
        store,
        embedder,
        config.chunking.max_chars,
        config.chunking.overlap_chars,
    )))
}

async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("initialized {}", config.db.path.display());
    Ok(())
}

async fn run_import(config: &Config, file: &std::path::Path) -> Result<()> {
    let store = open_store(config).await?;
    let summary = import_catalog(store.as_ref(), file).await?;
    println!("import {}", file.display());
    println!("  products: {}", summary.products);
    println!("  faqs: {}", summary.faqs);
    println!("  services: {}", summary.services);
    println!("  documents: {}", summary.documents);
    Ok(())
}

async fn run_reindex(config: &Config, target: &str, id: Option<&str>) -> Result<()> {
    let store = open_store(config).await?;
    let retriever = build_retriever(config, store)?;

    match (target, id) {
        ("faqs", Some(id)) => {
            let chunks = retriever.reindex_faq(id).await?;
            println!("reindex faq {id}");
            println!("  chunks: {chunks}");
        }
        ("services", Some(id)) => {
            let chunks = retriever.reindex_service(id).await?;
            println!("reindex service {id}");
            println!("  chunks: {chunks}");
        }
        ("documents", Some(id)) => {
            let chunks = retriever.reindex_document(id).await?;
            println!("reindex document {id}");
            println!("  chunks: {chunks}");
        }
        ("faqs", None) => {
            let (parents, chunks) = retriever.reindex_all_faqs().await?;
            print_reindex_summary("faqs", parents, chunks);
        }
        ("services", None) => {
            let (parents, chunks) = retriever.reindex_all_services().await?;
            print_reindex_summary("services", parents, chunks);
        }
        ("documents", None) => {
            let (parents, chunks) = retriever.reindex_all_documents().await?;
            print_reindex_summary("documents", parents, chunks);
        }
        ("all", None) => {
            let (fp, fc) = retriever.reindex_all_faqs().await?;
            let (sp, sc) = retriever.reindex_all_services().await?;
            let (dp, dc) = retriever.reindex_all_documents().await?;
            print_reindex_summary("faqs", fp, fc);
            print_reindex_summary("services", sp, sc);
            print_reindex_summary("documents", dp, dc);
        }
        ("all", Some(_)) => bail!("--id requires a specific target (faqs, services, documents)"),
        (other, _) => bail!(
            "Unknown reindex target: '{}'. Use all, faqs, services, or documents.",
            other
        ),
    }

    Ok(())
}

fn print_reindex_summary(kind: &str, parents: usize, chunks: usize) {
    println!("reindex {kind}");
    println!("  parents: {parents}");
    println!("  chunks: {chunks}");
}

async fn run_search(config: &Config, kind: &str, query: &str, limit: Option<usize>) -> Result<()> {
    let store = open_store(config).await?;
    let retriever = build_retriever(config, store)?;
    let limit = limit.unwrap_or(config.retrieval.default_limit);

    match kind {
        "faqs" => {
            let faqs = retriever.search_faqs(query, limit).await?;
            println!("search faqs \"{query}\" ({} results)", faqs.len());
            for faq in faqs {
                println!("  {} — {}", faq.question, faq.answer);
            }
        }
        "services" => {
            let services = retriever.search_services(query, limit).await?;
            println!("search services \"{query}\" ({} results)", services.len());
            for service in services {
                println!("  {} (€{:.2}) — {}", service.name, service.price, service.description);
            }
        }
        "documents" => {
            let hits = retriever.search_documents(query, limit).await?;
            println!("search documents \"{query}\" ({} results)", hits.len());
            for hit in hits {
                println!(
                    "  {} [{:.3}] — {}",
                    hit.document.title, hit.similarity, hit.snippet
                );
            }
        }
        other => bail!(
            "Unknown search kind: '{}'. Use faqs, services, or documents.",
            other
        ),
    }

    Ok(())
}

async fn run_chat(config: &Config, message: &str) -> Result<()> {
    let store = open_store(config).await?;
    let retriever = build_retriever(config, store.clone())?;

    let backend = Arc::new(OpenAiChat::new(&config.completion)?);
    let executor = ToolExecutor::new(retriever, store, config.retrieval.default_limit);
    let dispatcher = Dispatcher::new(
        backend,
        executor,
        config.completion.clone(),
        &config.assistant,
    );

    let outcome = dispatcher
        .run_chat_turn(vec![ChatMessage::user(message)])
        .await?;

    for entry in &outcome.tool_trace {
        println!(
            "tool {} ({} results{})",
            entry.tool,
            entry.result_total,
            entry
                .alternative_search
                .as_deref()
                .map(|term| format!(", alternative search: \"{term}\""))
                .unwrap_or_default()
        );
    }
    println!("{}", outcome.message.content.as_deref().unwrap_or(""));

    Ok(())
}

async fn run_stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    println!("stats");
    for (table, count) in store.counts().await? {
        println!("  {table}: {count}");
    }
    Ok(())
}
