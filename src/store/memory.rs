// MemoryStore — an in-process DocumentStore.
//
// Runs the registered pipelines locally and scores with plain tf-idf, so
// the whole flow (create index, bulk ingest, analyze, search, similarity)
// works without a search engine. Used by the test suite and by the
// walkthrough when TEXTLENS_STORE=memory.
//
// Indexes live behind a tokio RwLock. Locks are taken inside each trait
// method and never held across an await.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::models::{
    compare_ids, AnalyzedToken, BatchResult, Document, DocumentFailure, IndexSpec, MoreLikeThisQuery,
    QuerySpec, SearchHit,
};
use super::traits::DocumentStore;
use crate::analysis::local::{LocalAnalyzer, LocalNormalizer};
use crate::error::StoreError;

#[derive(Default)]
pub struct MemoryStore {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents stored in `index`.
    pub async fn doc_count(&self, index: &str) -> Result<usize, StoreError> {
        let indexes = self.indexes.read().await;
        Ok(lookup(&indexes, index)?.docs.len())
    }
}

struct MemoryIndex {
    analyzers: HashMap<String, LocalAnalyzer>,
    normalizers: HashMap<String, LocalNormalizer>,
    field_pipelines: BTreeMap<String, String>,
    default_analyzer: LocalAnalyzer,
    /// Insertion order; re-ingesting an id overwrites in place.
    docs: Vec<StoredDocument>,
    slots: HashMap<String, usize>,
}

struct StoredDocument {
    document: Document,
    fields: HashMap<String, FieldTerms>,
}

#[derive(Default)]
struct FieldTerms {
    freqs: HashMap<String, u32>,
    positions: HashMap<String, HashSet<usize>>,
}

impl FieldTerms {
    fn from_tokens(tokens: &[AnalyzedToken]) -> Self {
        let mut terms = FieldTerms::default();
        for token in tokens {
            *terms.freqs.entry(token.text.clone()).or_default() += 1;
            terms
                .positions
                .entry(token.text.clone())
                .or_default()
                .insert(token.position);
        }
        terms
    }

    fn freq(&self, term: &str) -> u32 {
        self.freqs.get(term).copied().unwrap_or(0)
    }
}

fn lookup<'a>(
    indexes: &'a HashMap<String, MemoryIndex>,
    index: &str,
) -> Result<&'a MemoryIndex, StoreError> {
    indexes
        .get(index)
        .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
}

fn bad_request(reason: impl Into<String>) -> StoreError {
    StoreError::Rejected {
        status: 400,
        reason: reason.into(),
    }
}

impl MemoryIndex {
    fn build(spec: &IndexSpec) -> Result<Self, StoreError> {
        let mut analyzers = HashMap::new();
        for pipeline in &spec.pipelines {
            let analyzer = LocalAnalyzer::compile(pipeline).map_err(|e| bad_request(e.to_string()))?;
            analyzers.insert(pipeline.name.clone(), analyzer);
        }
        let mut normalizers = HashMap::new();
        for normalizer in &spec.normalizers {
            let compiled =
                LocalNormalizer::compile(normalizer).map_err(|e| bad_request(e.to_string()))?;
            normalizers.insert(normalizer.name.clone(), compiled);
        }
        if let Some(missing) = spec
            .field_pipelines
            .values()
            .find(|p| !analyzers.contains_key(*p))
        {
            return Err(bad_request(format!("failed to find analyzer [{missing}]")));
        }
        Ok(Self {
            analyzers,
            normalizers,
            field_pipelines: spec.field_pipelines.clone(),
            default_analyzer: LocalAnalyzer::standard(),
            docs: Vec::new(),
            slots: HashMap::new(),
        })
    }

    fn field_analyzer(&self, field: &str) -> &LocalAnalyzer {
        self.field_pipelines
            .get(field)
            .and_then(|pipeline| self.analyzers.get(pipeline))
            .unwrap_or(&self.default_analyzer)
    }

    fn store(&mut self, document: Document) {
        let fields = document
            .fields
            .iter()
            .map(|(name, text)| {
                let tokens = self.field_analyzer(name).analyze(text);
                (name.clone(), FieldTerms::from_tokens(&tokens))
            })
            .collect();
        let stored = StoredDocument { document, fields };
        match self.slots.get(&stored.document.id).copied() {
            Some(slot) => self.docs[slot] = stored,
            None => {
                self.slots
                    .insert(stored.document.id.clone(), self.docs.len());
                self.docs.push(stored);
            }
        }
    }

    fn doc_freq(&self, field: &str, term: &str) -> usize {
        self.docs
            .iter()
            .filter(|d| d.fields.get(field).is_some_and(|f| f.freq(term) > 0))
            .count()
    }

    fn idf(&self, doc_freq: usize) -> f64 {
        let n = self.docs.len() as f64;
        let df = doc_freq as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn distinct_terms(&self, field: &str, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.field_analyzer(field)
            .analyze(text)
            .into_iter()
            .filter_map(|t| seen.insert(t.text.clone()).then_some(t.text))
            .collect()
    }

    fn match_query(&self, field: &str, query: &str) -> Vec<SearchHit> {
        let terms: Vec<(String, f64)> = self
            .distinct_terms(field, query)
            .into_iter()
            .map(|term| {
                let idf = self.idf(self.doc_freq(field, &term));
                (term, idf)
            })
            .collect();

        self.docs
            .iter()
            .filter_map(|doc| {
                let field_terms = doc.fields.get(field)?;
                let score: f64 = terms
                    .iter()
                    .map(|(term, idf)| idf * (field_terms.freq(term) as f64).sqrt())
                    .sum();
                (score > 0.0).then(|| hit(doc, score))
            })
            .collect()
    }

    fn match_phrase(&self, field: &str, phrase: &str) -> Vec<SearchHit> {
        let tokens = self.field_analyzer(field).analyze(phrase);
        let Some(first) = tokens.first() else {
            return Vec::new();
        };
        let base = first.position;
        let idf_sum: f64 = tokens
            .iter()
            .map(|t| self.idf(self.doc_freq(field, &t.text)))
            .sum();

        self.docs
            .iter()
            .filter_map(|doc| {
                let field_terms = doc.fields.get(field)?;
                let starts = field_terms.positions.get(&first.text)?;
                let occurrences = starts
                    .iter()
                    .filter(|&&start| {
                        tokens.iter().all(|t| {
                            field_terms
                                .positions
                                .get(&t.text)
                                .is_some_and(|p| p.contains(&(start + t.position - base)))
                        })
                    })
                    .count();
                (occurrences > 0).then(|| hit(doc, idf_sum * (occurrences as f64).sqrt()))
            })
            .collect()
    }

    fn more_like_this(&self, query: &MoreLikeThisQuery) -> Vec<SearchHit> {
        let params = &query.params;
        let like_text = query.like.join(" ");

        // (field, term) -> frequency in the reference text
        let mut like_freqs: HashMap<(String, String), u32> = HashMap::new();
        for field in &query.fields {
            for token in self.field_analyzer(field).analyze(&like_text) {
                *like_freqs.entry((field.clone(), token.text)).or_default() += 1;
            }
        }

        let min_doc_freq = params.min_doc_frequency.max(1) as usize;
        let mut candidates: Vec<((String, String), f64, f64)> = like_freqs
            .into_iter()
            .filter_map(|(key, like_tf)| {
                let df = self.doc_freq(&key.0, &key.1);
                if df < min_doc_freq {
                    return None;
                }
                let idf = self.idf(df);
                Some((key, idf, like_tf as f64 * idf))
            })
            .collect();
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
        candidates.truncate(params.max_query_terms);

        if candidates.is_empty() {
            return Vec::new();
        }
        let required = (candidates.len() * params.minimum_should_match as usize / 100).max(1);

        self.docs
            .iter()
            .filter_map(|doc| {
                let mut matched = 0;
                let mut score = 0.0;
                for ((field, term), idf, _) in &candidates {
                    let tf = doc.fields.get(field).map_or(0, |f| f.freq(term));
                    if tf > 0 && tf >= params.min_term_frequency {
                        matched += 1;
                        score += idf * (tf as f64).sqrt();
                    }
                }
                (matched >= required).then(|| hit(doc, score))
            })
            .collect()
    }
}

fn hit(doc: &StoredDocument, score: f64) -> SearchHit {
    SearchHit {
        document: doc.document.clone(),
        score,
    }
}

/// Highest score first; equal scores by id (numeric ids numerically).
fn rank(mut hits: Vec<SearchHit>, size: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| compare_ids(&a.document.id, &b.document.id))
    });
    hits.truncate(size);
    hits
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_index(&self, index: &str, spec: &IndexSpec) -> Result<(), StoreError> {
        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(index) {
            return Err(bad_request(format!(
                "resource_already_exists_exception: index [{index}] already exists"
            )));
        }
        indexes.insert(index.to_string(), MemoryIndex::build(spec)?);
        debug!(index = index, "Created in-memory index");
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), StoreError> {
        let mut indexes = self.indexes.write().await;
        indexes
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))
    }

    async fn index_batch(
        &self,
        index: &str,
        documents: Vec<Document>,
    ) -> Result<BatchResult, StoreError> {
        let mut indexes = self.indexes.write().await;
        let target = indexes
            .get_mut(index)
            .ok_or_else(|| StoreError::IndexNotFound(index.to_string()))?;

        let mut result = BatchResult::default();
        for document in documents {
            if document.id.trim().is_empty() {
                result.failures.push(DocumentFailure {
                    locator: "<empty id>".to_string(),
                    reason: "document id must not be empty".to_string(),
                });
                continue;
            }
            target.store(document);
            result.succeeded += 1;
        }
        Ok(result)
    }

    async fn analyze(
        &self,
        index: &str,
        pipeline: &str,
        text: &str,
    ) -> Result<Vec<AnalyzedToken>, StoreError> {
        let indexes = self.indexes.read().await;
        let analyzer = lookup(&indexes, index)?
            .analyzers
            .get(pipeline)
            .ok_or_else(|| bad_request(format!("failed to find analyzer [{pipeline}]")))?;
        Ok(analyzer.analyze(text))
    }

    async fn normalize(
        &self,
        index: &str,
        normalizer: &str,
        text: &str,
    ) -> Result<Vec<AnalyzedToken>, StoreError> {
        let indexes = self.indexes.read().await;
        let compiled = lookup(&indexes, index)?
            .normalizers
            .get(normalizer)
            .ok_or_else(|| bad_request(format!("failed to find normalizer [{normalizer}]")))?;
        Ok(compiled.normalize(text))
    }

    async fn search(&self, index: &str, query: &QuerySpec) -> Result<Vec<SearchHit>, StoreError> {
        let indexes = self.indexes.read().await;
        let target = lookup(&indexes, index)?;
        let hits = match query {
            // Insertion order, like an unscored engine scan.
            QuerySpec::MatchAll { size } => {
                return Ok(target
                    .docs
                    .iter()
                    .take(*size)
                    .map(|doc| hit(doc, 1.0))
                    .collect())
            }
            QuerySpec::Match { field, query, .. } => target.match_query(field, query),
            QuerySpec::MatchPhrase { field, phrase, .. } => target.match_phrase(field, phrase),
            QuerySpec::MoreLikeThis(mlt) => target.more_like_this(mlt),
        };
        Ok(rank(hits, query.size()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::definitions::AnalysisDefinitions;
    use crate::analysis::registry::PipelineRegistry;
    use crate::store::models::MoreLikeThisParams;

    async fn seeded() -> MemoryStore {
        let registry = PipelineRegistry::from_definitions(&AnalysisDefinitions::default()).unwrap();
        let store = MemoryStore::new();
        store
            .create_index("plays", &registry.index_spec(&BTreeMap::new()).unwrap())
            .await
            .unwrap();
        let docs = vec![
            Document::new("1").with_field("text_entry", "To be or not to be"),
            Document::new("2").with_field("text_entry", "shall daub her lips with blood"),
            Document::new("3").with_field("text_entry", "her lips are red"),
        ];
        store.index_batch("plays", docs).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_phrase_requires_adjacent_terms() {
        let store = seeded().await;
        let phrase = QuerySpec::MatchPhrase {
            field: "text_entry".to_string(),
            phrase: "daub her lips".to_string(),
            size: 10,
        };
        let hits = store.search("plays", &phrase).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.id, "2");

        let scattered = QuerySpec::MatchPhrase {
            field: "text_entry".to_string(),
            phrase: "lips her".to_string(),
            size: 10,
        };
        assert!(store.search("plays", &scattered).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reingesting_an_id_overwrites() {
        let store = seeded().await;
        store
            .index_batch(
                "plays",
                vec![Document::new("1").with_field("text_entry", "replaced")],
            )
            .await
            .unwrap();
        assert_eq!(store.doc_count("plays").await.unwrap(), 3);
        let all = store
            .search("plays", &QuerySpec::MatchAll { size: 10 })
            .await
            .unwrap();
        assert_eq!(all[0].document.field("text_entry"), Some("replaced"));
    }

    #[tokio::test]
    async fn test_minimum_should_match_filters_candidates() {
        let store = seeded().await;
        let query = |pct| {
            QuerySpec::MoreLikeThis(MoreLikeThisQuery {
                fields: vec!["text_entry".to_string()],
                like: vec!["her".to_string(), "lips".to_string(), "blood".to_string()],
                params: MoreLikeThisParams {
                    minimum_should_match: pct,
                    ..MoreLikeThisParams::default()
                },
                size: 10,
            })
        };
        let loose = store.search("plays", &query(1)).await.unwrap();
        assert_eq!(loose.len(), 2);
        assert_eq!(loose[0].document.id, "2");

        let strict = store.search("plays", &query(100)).await.unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].document.id, "2");
    }

    #[test]
    fn test_rank_ties_numeric_ids_numerically() {
        let hits = ["10", "9", "b", "100", "a"]
            .into_iter()
            .map(|id| SearchHit {
                document: Document::new(id),
                score: 1.0,
            })
            .collect();
        let ranked = rank(hits, 4);
        let ids: Vec<&str> = ranked.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["9", "10", "100", "a"]);
    }

    #[tokio::test]
    async fn test_unknown_index_is_not_found() {
        let store = MemoryStore::new();
        let err = store.analyze("nope", "trigram", "cat").await.unwrap_err();
        assert_eq!(err, StoreError::IndexNotFound("nope".to_string()));
    }
}
