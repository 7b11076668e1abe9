// Analysis definitions — the static configuration the registry is built from.
//
// Loaded from a JSON file when TEXTLENS_ANALYSIS_PATH is set; otherwise the
// built-in set below is used. The built-in set covers case folding, English
// stop words, stemming, synonyms and trigrams over a standard corpus.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::pipeline::{AnalysisPipeline, CharClass, FilterSpec, Normalizer, TokenizerSpec};
use crate::error::ConfigError;

pub const LOWERCASE_STANDARD: &str = "lowercase_standard";
pub const ENGLISH_STOP: &str = "english_stop";
pub const WHITESPACE_STEMMER: &str = "whitespace_stemmer";
pub const SYNONYMS: &str = "synonyms";
pub const TRIGRAM: &str = "trigram";
pub const LOWERCASE_NORMALIZER: &str = "lowercase_normalizer";

/// Filters, pipelines and normalizers as written in a definitions file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDefinitions {
    #[serde(default)]
    pub filters: BTreeMap<String, FilterSpec>,
    pub pipelines: Vec<AnalysisPipeline>,
    #[serde(default)]
    pub normalizers: Vec<Normalizer>,
}

impl AnalysisDefinitions {
    /// Read definitions from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Definitions(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
            .map_err(|e| ConfigError::Definitions(format!("{}: {e}", path.display())))
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl Default for AnalysisDefinitions {
    fn default() -> Self {
        let mut filters = BTreeMap::new();
        filters.insert("english_stop".to_string(), FilterSpec::english_stop());
        filters.insert(
            "shakespeare_synonyms".to_string(),
            FilterSpec::synonyms([vec!["fight", "quarrel"], vec!["people", "public"]]),
        );

        let pipelines = vec![
            AnalysisPipeline::new(LOWERCASE_STANDARD, TokenizerSpec::Standard)
                .with_filter("lowercase"),
            AnalysisPipeline::new(ENGLISH_STOP, TokenizerSpec::Standard)
                .with_filter("lowercase")
                .with_filter("english_stop"),
            AnalysisPipeline::new(WHITESPACE_STEMMER, TokenizerSpec::Whitespace)
                .with_filter("stemmer"),
            AnalysisPipeline::new(SYNONYMS, TokenizerSpec::Standard)
                .with_filter("lowercase")
                .with_filter("shakespeare_synonyms"),
            AnalysisPipeline::new(
                TRIGRAM,
                TokenizerSpec::ngram(3, 3, &[CharClass::Letter, CharClass::Digit]),
            )
            .with_filter("lowercase"),
        ];

        let normalizers = vec![Normalizer {
            name: LOWERCASE_NORMALIZER.to_string(),
            filters: vec!["lowercase".into()],
        }];

        Self {
            filters,
            pipelines,
            normalizers,
        }
    }
}
