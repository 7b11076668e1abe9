// Similarity query engine — "more like this" over the document store.
//
// Flow for a reference text:
//   1. analyze it with the ranking pipeline -> token set T
//   2. more-like-this query on the text field using T
//   3. per hit: tokens shared with T (ranking pipeline) and an n-gram view
//      (display pipeline), the latter purely for display
//   4. order by score descending, then document id ascending (numeric ids
//      numerically)

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::models::{compare_ids, MoreLikeThisParams, MoreLikeThisQuery, QuerySpec};
use crate::store::DocumentStore;

/// What the engine needs to know about the index it queries.
#[derive(Debug, Clone)]
pub struct SimilaritySettings {
    /// Text field candidates are compared on.
    pub field: String,
    /// Pipeline that produces the terms the query ranks on.
    pub ranking_pipeline: String,
    /// Fixed-width n-gram pipeline for the secondary token view.
    pub display_pipeline: String,
    pub more_like_this: MoreLikeThisParams,
    /// Maximum number of results.
    pub size: usize,
}

/// One similar document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub document_id: String,
    pub score: f64,
    /// Reference terms that also occur in the candidate, in reference order.
    pub matched_tokens: Vec<String>,
    /// The candidate's text through the display pipeline.
    pub ngram_tokens: Vec<String>,
}

pub struct SimilarityEngine {
    store: Arc<dyn DocumentStore>,
    index: String,
    settings: SimilaritySettings,
}

impl SimilarityEngine {
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>, settings: SimilaritySettings) -> Self {
        Self {
            store,
            index: index.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &SimilaritySettings {
        &self.settings
    }

    /// Find documents similar to `text`.
    ///
    /// Empty text, or text that analyzes to nothing, gives an empty list.
    pub async fn find_similar(&self, text: &str) -> Result<Vec<SimilarityResult>, StoreError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let reference = self.ranking_terms(text).await?;
        if reference.is_empty() {
            debug!(text_len = text.len(), "Reference text produced no tokens");
            return Ok(Vec::new());
        }

        let query = QuerySpec::MoreLikeThis(MoreLikeThisQuery {
            fields: vec![self.settings.field.clone()],
            like: reference.clone(),
            params: self.settings.more_like_this,
            size: self.settings.size,
        });
        let hits = self.store.search(&self.index, &query).await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let (matched_tokens, ngram_tokens) = match hit.document.field(&self.settings.field) {
                Some(candidate) => {
                    let candidate_terms: HashSet<String> =
                        self.ranking_terms(candidate).await?.into_iter().collect();
                    let matched = reference
                        .iter()
                        .filter(|t| candidate_terms.contains(*t))
                        .cloned()
                        .collect();
                    (matched, self.display_tokens(candidate).await?)
                }
                None => (Vec::new(), Vec::new()),
            };
            results.push(SimilarityResult {
                document_id: hit.document.id,
                score: hit.score.max(0.0),
                matched_tokens,
                ngram_tokens,
            });
        }

        sort_results(&mut results);
        info!(
            index = %self.index,
            reference_terms = reference.len(),
            results = results.len(),
            "Similarity query complete"
        );
        Ok(results)
    }

    /// Distinct ranking-pipeline terms, in first-seen order.
    async fn ranking_terms(&self, text: &str) -> Result<Vec<String>, StoreError> {
        let tokens = self
            .store
            .analyze(&self.index, &self.settings.ranking_pipeline, text)
            .await?;
        let mut seen = HashSet::new();
        Ok(tokens
            .into_iter()
            .filter(|t| seen.insert(t.text.clone()))
            .map(|t| t.text)
            .collect())
    }

    async fn display_tokens(&self, text: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .analyze(&self.index, &self.settings.display_pipeline, text)
            .await?
            .into_iter()
            .map(|t| t.text)
            .collect())
    }
}

/// Score descending; equal scores by document id ascending, numerically
/// when both ids are integers.
pub fn sort_results(results: &mut [SimilarityResult]) {
    results.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => compare_ids(&a.document_id, &b.document_id),
        other => other,
    });
}
