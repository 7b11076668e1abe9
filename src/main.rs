use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use textlens::analysis::registry::PipelineRegistry;
use textlens::config::{Config, StoreBackend};
use textlens::output::terminal;
use textlens::similarity::SimilarityEngine;
use textlens::store::elastic::ElasticStore;
use textlens::store::memory::MemoryStore;
use textlens::store::models::QuerySpec;
use textlens::store::DocumentStore;
use textlens::walkthrough;

/// textlens: custom text analysis, bulk loading and similarity search.
///
/// Defines named analysis pipelines, creates an index that carries them,
/// loads a JSON-lines corpus and queries it through an
/// Elasticsearch-compatible engine.
#[derive(Parser)]
#[command(name = "textlens", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured analysis pipelines and normalizers
    Pipelines,

    /// Create the index with every configured pipeline
    CreateIndex {
        /// Delete the index first if it already exists
        #[arg(long)]
        recreate: bool,
    },

    /// Bulk-load a JSON-lines corpus file
    Ingest {
        /// Corpus file (bulk-shaped or one document per line)
        path: PathBuf,

        /// Documents per bulk request (default: TEXTLENS_BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Bulk requests in flight at once (default: TEXTLENS_INGEST_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Stop after the first failed batch
        #[arg(long)]
        fail_fast: bool,
    },

    /// Run text through a named pipeline
    Analyze {
        pipeline: String,
        text: String,
    },

    /// Run text through a named normalizer
    Normalize {
        normalizer: String,
        text: String,
    },

    /// Find documents similar to a reference text
    Similar {
        text: String,
    },

    /// Query the index
    Search {
        #[command(subcommand)]
        query: SearchCommand,

        /// Maximum hits (default: TEXTLENS_RESULT_SIZE)
        #[arg(long, global = true)]
        size: Option<usize>,
    },

    /// Create, load and exercise an index end to end
    Walkthrough {
        /// Corpus file to load
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum SearchCommand {
    /// Every document, unscored
    All,
    /// Full-text match on one field
    Match { field: String, query: String },
    /// Exact phrase on one field
    Phrase { field: String, phrase: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("textlens=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let registry = config.registry()?;

    match cli.command {
        Commands::Pipelines => {
            terminal::display_pipelines(&registry);
        }

        Commands::CreateIndex { recreate } => {
            let store = open_store(&config, &registry).await?;
            let spec = config.index_spec(&registry)?;
            // The in-memory store already holds a fresh index for this process.
            if recreate || config.store_backend == StoreBackend::Memory {
                walkthrough::recreate_index(store.as_ref(), &config.index, &spec).await?;
            } else {
                store
                    .create_index(&config.index, &spec)
                    .await
                    .with_context(|| format!("Failed to create index {}", config.index))?;
            }
            println!(
                "{}",
                format!(
                    "Index {} created with {} pipelines.",
                    config.index,
                    spec.pipelines.len()
                )
                .bold()
            );
        }

        Commands::Ingest {
            path,
            batch_size,
            concurrency,
            fail_fast,
        } => {
            let store = open_store(&config, &registry).await?;
            let mut options = config.ingest_options();
            if let Some(batch_size) = batch_size {
                options.batch_size = batch_size;
            }
            if let Some(concurrency) = concurrency {
                options.concurrency = concurrency;
            }
            options.fail_fast = fail_fast;

            println!("Loading {} into {}...", path.display(), config.index);
            let report =
                walkthrough::ingest_file(store.as_ref(), &config.index, &path, &options).await?;
            terminal::display_ingest_report(&report);

            let failed = report.failed_ranges();
            if !failed.is_empty() {
                anyhow::bail!(
                    "{} batch(es) failed, {} record(s) never sent; resubmit records {:?}",
                    report.failed_batches().count(),
                    report.unprocessed.as_ref().map_or(0, |r| r.len()),
                    failed
                );
            }
        }

        Commands::Analyze { pipeline, text } => {
            let store = open_store(&config, &registry).await?;
            let tokens = store.analyze(&config.index, &pipeline, &text).await?;
            terminal::display_tokens(&pipeline, &text, &tokens);
        }

        Commands::Normalize { normalizer, text } => {
            let store = open_store(&config, &registry).await?;
            let tokens = store.normalize(&config.index, &normalizer, &text).await?;
            terminal::display_tokens(&normalizer, &text, &tokens);
        }

        Commands::Similar { text } => {
            let store = open_store(&config, &registry).await?;
            let engine = SimilarityEngine::new(store, config.index.clone(), config.similarity_settings());
            let results = engine.find_similar(&text).await?;
            terminal::display_similar(&text, &results);
        }

        Commands::Search { query, size } => {
            let store = open_store(&config, &registry).await?;
            let size = size.unwrap_or(config.result_size);
            let query = match query {
                SearchCommand::All => QuerySpec::MatchAll { size },
                SearchCommand::Match { field, query } => QuerySpec::Match { field, query, size },
                SearchCommand::Phrase { field, phrase } => {
                    QuerySpec::MatchPhrase { field, phrase, size }
                }
            };
            let hits = store.search(&config.index, &query).await?;
            terminal::display_hits(&hits, &config.text_field);
        }

        Commands::Walkthrough { path } => {
            let store = open_store(&config, &registry).await?;
            walkthrough::run(store, &registry, &config, &path).await?;
        }
    }

    Ok(())
}

/// Select the document store backend based on configuration.
///
/// The in-memory store starts empty in every process, so the configured
/// index is created up front; that makes one-shot commands like `analyze`
/// usable without an engine.
async fn open_store(
    config: &Config,
    registry: &PipelineRegistry,
) -> Result<Arc<dyn DocumentStore>> {
    match config.store_backend {
        StoreBackend::Elastic => {
            info!(url = %config.store_url, "Using search engine backend");
            let store = ElasticStore::new(&config.store_url, config.timeout)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory backend");
            let store = MemoryStore::new();
            store
                .create_index(&config.index, &config.index_spec(registry)?)
                .await?;
            Ok(Arc::new(store))
        }
    }
}
