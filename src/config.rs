use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis::definitions::{AnalysisDefinitions, LOWERCASE_STANDARD, TRIGRAM};
use crate::analysis::registry::PipelineRegistry;
use crate::similarity::SimilaritySettings;
use crate::store::elastic::DEFAULT_URL;
use crate::store::models::{IndexSpec, IngestOptions, MoreLikeThisParams};

/// Which document store backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreBackend {
    /// Elasticsearch-compatible engine over HTTP (default)
    Elastic,
    /// In-process store; nothing survives the process
    Memory,
}

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded at startup via dotenvy. Every value has a
/// default, so an empty environment talks to a local engine.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_url: String,
    pub store_backend: StoreBackend,
    pub index: String,
    /// Field the similarity and walkthrough steps read text from.
    pub text_field: String,
    /// JSON analysis definitions; built-in pipelines when unset.
    pub analysis_path: Option<PathBuf>,
    /// Field → pipeline mappings applied at index creation.
    pub field_pipelines: BTreeMap<String, String>,
    pub batch_size: usize,
    pub ingest_concurrency: usize,
    /// Bound on every store request and every ingest batch.
    pub timeout: Duration,
    pub ranking_pipeline: String,
    pub display_pipeline: String,
    pub more_like_this: MoreLikeThisParams,
    pub result_size: usize,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_backend = match var("TEXTLENS_STORE").as_deref().map(str::trim) {
            None | Some("elastic") => StoreBackend::Elastic,
            Some("memory") => StoreBackend::Memory,
            Some(other) => anyhow::bail!(
                "TEXTLENS_STORE must be `elastic` or `memory`, got `{other}`"
            ),
        };

        let field_pipelines = match var("TEXTLENS_FIELD_PIPELINES") {
            Some(raw) => parse_field_pipelines(&raw)?,
            None => BTreeMap::new(),
        };

        let minimum_should_match: u8 = parse_var(&var, "TEXTLENS_MLT_MINIMUM_SHOULD_MATCH", 1)?;
        if minimum_should_match > 100 {
            anyhow::bail!(
                "TEXTLENS_MLT_MINIMUM_SHOULD_MATCH is a percentage (0-100), got {minimum_should_match}"
            );
        }

        Ok(Self {
            store_url: var("TEXTLENS_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            store_backend,
            index: var("TEXTLENS_INDEX").unwrap_or_else(|| "shakespeare".to_string()),
            text_field: var("TEXTLENS_TEXT_FIELD").unwrap_or_else(|| "text_entry".to_string()),
            analysis_path: var("TEXTLENS_ANALYSIS_PATH").map(PathBuf::from),
            field_pipelines,
            batch_size: parse_var(&var, "TEXTLENS_BATCH_SIZE", 1000)?,
            ingest_concurrency: parse_var(&var, "TEXTLENS_INGEST_CONCURRENCY", 4)?,
            timeout: Duration::from_secs(parse_var(&var, "TEXTLENS_TIMEOUT_SECS", 30)?),
            ranking_pipeline: var("TEXTLENS_RANKING_PIPELINE")
                .unwrap_or_else(|| LOWERCASE_STANDARD.to_string()),
            display_pipeline: var("TEXTLENS_DISPLAY_PIPELINE")
                .unwrap_or_else(|| TRIGRAM.to_string()),
            more_like_this: MoreLikeThisParams {
                min_term_frequency: parse_var(&var, "TEXTLENS_MLT_MIN_TERM_FREQ", 1)?,
                max_query_terms: parse_var(&var, "TEXTLENS_MLT_MAX_QUERY_TERMS", 12)?,
                min_doc_frequency: parse_var(&var, "TEXTLENS_MLT_MIN_DOC_FREQ", 1)?,
                minimum_should_match,
            },
            result_size: parse_var(&var, "TEXTLENS_RESULT_SIZE", 10)?,
        })
    }

    /// Read the analysis definitions: the configured file, or the built-ins.
    pub fn analysis_definitions(&self) -> Result<AnalysisDefinitions> {
        match &self.analysis_path {
            Some(path) => AnalysisDefinitions::load(path)
                .with_context(|| format!("Failed to load analysis definitions from {}", path.display())),
            None => Ok(AnalysisDefinitions::default()),
        }
    }

    /// Build and freeze the pipeline registry. Any definition error is fatal.
    pub fn registry(&self) -> Result<Arc<PipelineRegistry>> {
        let definitions = self.analysis_definitions()?;
        let registry = PipelineRegistry::from_definitions(&definitions)
            .context("Invalid analysis definitions")?;

        // The similarity engine leans on these two; fail now rather than mid-query.
        for name in [&self.ranking_pipeline, &self.display_pipeline] {
            if registry.get(name).is_none() {
                anyhow::bail!(
                    "Pipeline `{name}` is configured for similarity queries but not defined"
                );
            }
        }
        Ok(registry.freeze())
    }

    /// Index creation payload for the configured field mappings.
    pub fn index_spec(&self, registry: &PipelineRegistry) -> Result<IndexSpec> {
        registry
            .index_spec(&self.field_pipelines)
            .context("Invalid TEXTLENS_FIELD_PIPELINES")
    }

    pub fn similarity_settings(&self) -> SimilaritySettings {
        SimilaritySettings {
            field: self.text_field.clone(),
            ranking_pipeline: self.ranking_pipeline.clone(),
            display_pipeline: self.display_pipeline.clone(),
            more_like_this: self.more_like_this,
            size: self.result_size,
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            batch_size: self.batch_size,
            concurrency: self.ingest_concurrency,
            fail_fast: false,
            batch_timeout: self.timeout,
        }
    }
}

fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value `{raw}`")),
        None => Ok(default),
    }
}

/// Parse `field=pipeline,field=pipeline`.
fn parse_field_pipelines(raw: &str) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((field, pipeline)) = entry.split_once('=') else {
            anyhow::bail!("TEXTLENS_FIELD_PIPELINES entry `{entry}` is not `field=pipeline`");
        };
        let (field, pipeline) = (field.trim(), pipeline.trim());
        if field.is_empty() || pipeline.is_empty() {
            anyhow::bail!("TEXTLENS_FIELD_PIPELINES entry `{entry}` is not `field=pipeline`");
        }
        map.insert(field.to_string(), pipeline.to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.store_url, "http://localhost:9200");
        assert_eq!(config.store_backend, StoreBackend::Elastic);
        assert_eq!(config.index, "shakespeare");
        assert_eq!(config.text_field, "text_entry");
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.ingest_concurrency, 4);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.more_like_this, MoreLikeThisParams::default());
        assert_eq!(config.result_size, 10);
        assert!(config.field_pipelines.is_empty());
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = config_from(&[("TEXTLENS_BATCH_SIZE", "lots")]).unwrap_err();
        assert!(err.to_string().contains("TEXTLENS_BATCH_SIZE"));
    }

    #[test]
    fn test_percentage_out_of_range() {
        assert!(config_from(&[("TEXTLENS_MLT_MINIMUM_SHOULD_MATCH", "150")]).is_err());
    }

    #[test]
    fn test_unknown_backend() {
        assert!(config_from(&[("TEXTLENS_STORE", "sqlite")]).is_err());
        let memory = config_from(&[("TEXTLENS_STORE", "memory")]).unwrap();
        assert_eq!(memory.store_backend, StoreBackend::Memory);
    }

    #[test]
    fn test_field_pipelines_parsing() {
        let config = config_from(&[(
            "TEXTLENS_FIELD_PIPELINES",
            "text_entry=english_stop, speaker = lowercase_standard",
        )])
        .unwrap();
        assert_eq!(config.field_pipelines["text_entry"], "english_stop");
        assert_eq!(config.field_pipelines["speaker"], "lowercase_standard");
        assert!(parse_field_pipelines("text_entry").is_err());
    }

    #[test]
    fn test_registry_rejects_missing_similarity_pipeline() {
        let config = config_from(&[("TEXTLENS_DISPLAY_PIPELINE", "fourgram")]).unwrap();
        assert!(config.registry().is_err());
        let config = config_from(&[]).unwrap();
        assert!(config.registry().is_ok());
    }
}
