// Guided tour over a corpus — create, load, then exercise every pipeline.
//
// Also home to the ingest-with-progress helper the `ingest` command shares.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::analysis::definitions::{
    ENGLISH_STOP, LOWERCASE_NORMALIZER, LOWERCASE_STANDARD, SYNONYMS, WHITESPACE_STEMMER,
};
use crate::analysis::registry::PipelineRegistry;
use crate::config::Config;
use crate::corpus;
use crate::error::StoreError;
use crate::output::terminal;
use crate::similarity::SimilarityEngine;
use crate::store::ingest::bulk_ingest;
use crate::store::models::{IndexSpec, IngestOptions, IngestReport, QuerySpec};
use crate::store::DocumentStore;

/// Documents the per-document steps run over.
const SAMPLE_SIZE: usize = 10;

/// Drop `index` if present, then create it from `spec`.
pub async fn recreate_index(store: &dyn DocumentStore, index: &str, spec: &IndexSpec) -> Result<()> {
    match store.delete_index(index).await {
        Ok(()) | Err(StoreError::IndexNotFound(_)) => {}
        Err(e) => {
            return Err(anyhow::Error::new(e).context(format!("Failed to delete index {index}")))
        }
    }
    store
        .create_index(index, spec)
        .await
        .with_context(|| format!("Failed to create index {index}"))
}

/// Stream a corpus file into `index`, showing a running count.
pub async fn ingest_file(
    store: &dyn DocumentStore,
    index: &str,
    path: &Path,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let records = corpus::open(path)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  Ingest {spinner} {pos} records ({elapsed})")
            .context("Invalid progress template")?,
    );

    let report = bulk_ingest(store, index, records, options, |outcome| {
        pb.inc(outcome.records.len() as u64);
    })
    .await;
    pb.finish_and_clear();
    Ok(report)
}

/// The three fixed queries the tour ends with.
pub fn canned_queries(size: usize) -> Vec<(&'static str, QuerySpec)> {
    vec![
        (
            "match play_name \"Henry IV\"",
            QuerySpec::Match {
                field: "play_name".to_string(),
                query: "Henry IV".to_string(),
                size,
            },
        ),
        (
            "match speaker \"KING HENRY IV\"",
            QuerySpec::Match {
                field: "speaker".to_string(),
                query: "KING HENRY IV".to_string(),
                size,
            },
        ),
        (
            "match_phrase text_entry \"shall daub her lips\"",
            QuerySpec::MatchPhrase {
                field: "text_entry".to_string(),
                phrase: "shall daub her lips".to_string(),
                size,
            },
        ),
    ]
}

/// Run the full tour against `store`.
pub async fn run(
    store: Arc<dyn DocumentStore>,
    registry: &PipelineRegistry,
    config: &Config,
    corpus_path: &Path,
) -> Result<()> {
    let index = config.index.as_str();

    terminal::section(&format!("Creating index {index}"));
    let spec = config.index_spec(registry)?;
    recreate_index(store.as_ref(), index, &spec).await?;
    println!("  Index created with {} pipelines.", spec.pipelines.len());

    terminal::section("Loading corpus");
    let report = ingest_file(store.as_ref(), index, corpus_path, &config.ingest_options()).await?;
    terminal::display_ingest_report(&report);

    terminal::section(&format!("First {SAMPLE_SIZE} documents"));
    let sample = store
        .search(index, &QuerySpec::MatchAll { size: SAMPLE_SIZE })
        .await
        .context("Failed to fetch sample documents")?;
    terminal::display_hits(&sample, &config.text_field);

    let texts: Vec<String> = sample
        .iter()
        .filter_map(|hit| hit.document.field(&config.text_field).map(str::to_string))
        .collect();
    info!(sample = texts.len(), "Running per-document analysis steps");

    // (title, name, is_normalizer)
    let steps = [
        ("Tokenization: lowercasing", LOWERCASE_STANDARD, false),
        ("Tokenization with synonyms", SYNONYMS, false),
        ("Normalization", LOWERCASE_NORMALIZER, true),
        ("Stemming", WHITESPACE_STEMMER, false),
        ("Removing stop words", ENGLISH_STOP, false),
    ];
    for (title, name, is_normalizer) in steps {
        terminal::section(title);
        let defined = if is_normalizer {
            registry.get_normalizer(name).is_some()
        } else {
            registry.get(name).is_some()
        };
        if !defined {
            warn!(name, "Not defined in the analysis definitions, skipping step");
            println!("  {}", format!("{name} is not defined.").yellow());
            continue;
        }
        for text in &texts {
            let tokens = if is_normalizer {
                store.normalize(index, name, text).await?
            } else {
                store.analyze(index, name, text).await?
            };
            terminal::display_token_line(&tokens);
        }
    }

    terminal::section("Similar documents");
    let engine = SimilarityEngine::new(store.clone(), index, config.similarity_settings());
    for text in &texts {
        let results = engine.find_similar(text).await?;
        terminal::display_similar(text, &results);
    }

    for (i, (label, query)) in canned_queries(config.result_size).into_iter().enumerate() {
        terminal::section(&format!("Search result {}: {label}", i + 1));
        let hits = store.search(index, &query).await?;
        terminal::display_hits(&hits, &config.text_field);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canned_queries_carry_size() {
        let queries = canned_queries(5);
        assert_eq!(queries.len(), 3);
        assert!(queries.iter().all(|(_, q)| q.size() == 5));
        assert!(matches!(queries[2].1, QuerySpec::MatchPhrase { .. }));
    }
}
