// Data types exchanged with a document store adapter.

use std::collections::BTreeMap;
use std::ops::Range;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::pipeline::{ResolvedNormalizer, ResolvedPipeline};
use crate::error::StoreError;

/// A document as the store sees it: an id and named text fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: BTreeMap<String, String>,
}

/// Text form of a scalar JSON value. Nulls, arrays and objects have none.
pub fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.fields.insert(name.into(), text.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Tie-break order for document ids. Ids that are both unsigned integers
/// compare numerically ("9" before "10"); anything else compares as text,
/// and numeric ids sort before non-numeric ones.
pub fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// One token produced by an analyze call. Offsets are character offsets
/// into the analyzed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzedToken {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub position: usize,
}

/// Everything a store needs to create an index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexSpec {
    pub pipelines: Vec<ResolvedPipeline>,
    pub normalizers: Vec<ResolvedNormalizer>,
    /// Text fields analyzed with a named pipeline instead of the engine default.
    pub field_pipelines: BTreeMap<String, String>,
}

/// Thresholds for a more-like-this query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoreLikeThisParams {
    /// Occurrences of a term a candidate needs for the term to count.
    pub min_term_frequency: u32,
    /// Cap on how many of the reference's most representative terms are queried.
    pub max_query_terms: usize,
    /// Corpus-wide document frequency a term needs to be considered.
    pub min_doc_frequency: u32,
    /// Percentage (0..=100) of query terms a candidate must match.
    pub minimum_should_match: u8,
}

impl Default for MoreLikeThisParams {
    fn default() -> Self {
        Self {
            min_term_frequency: 1,
            max_query_terms: 12,
            min_doc_frequency: 1,
            minimum_should_match: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoreLikeThisQuery {
    pub fields: Vec<String>,
    pub like: Vec<String>,
    pub params: MoreLikeThisParams,
    pub size: usize,
}

/// The query shapes this crate issues.
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySpec {
    MatchAll { size: usize },
    Match { field: String, query: String, size: usize },
    MatchPhrase { field: String, phrase: String, size: usize },
    MoreLikeThis(MoreLikeThisQuery),
}

impl QuerySpec {
    pub fn size(&self) -> usize {
        match self {
            QuerySpec::MatchAll { size }
            | QuerySpec::Match { size, .. }
            | QuerySpec::MatchPhrase { size, .. } => *size,
            QuerySpec::MoreLikeThis(mlt) => mlt.size,
        }
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: Document,
    pub score: f64,
}

/// A document the store (or the corpus reader) refused.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFailure {
    /// Document id when known, otherwise a record locator like `line 12`.
    pub locator: String,
    pub reason: String,
}

/// One entry of an ingest input: a document, or a record that could not be
/// turned into one.
pub type IngestRecord = Result<Document, DocumentFailure>;

/// What a store reports back for one bulk request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failures: Vec<DocumentFailure>,
}

/// Knobs for a bulk ingest run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub batch_size: usize,
    /// Number of batches in flight at once.
    pub concurrency: usize,
    /// Stop issuing new batches after the first failed one.
    pub fail_fast: bool,
    pub batch_timeout: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            concurrency: 4,
            fail_fast: false,
            batch_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of one batch in a bulk ingest run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub batch_index: usize,
    /// Record offsets (into the input sequence) covered by this batch.
    pub records: Range<usize>,
    /// Documents actually sent to the store.
    pub submitted: usize,
    pub succeeded: usize,
    pub error: Option<StoreError>,
    pub document_failures: Vec<DocumentFailure>,
}

impl BatchOutcome {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate result of a bulk ingest run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IngestReport {
    /// One entry per batch issued, ordered by batch index.
    pub batches: Vec<BatchOutcome>,
    /// Records that never reached the store because they could not be parsed.
    pub malformed: Vec<DocumentFailure>,
    /// Set when fail-fast mode stopped the run early.
    pub aborted: bool,
    /// Records never sent because the run stopped early.
    pub unprocessed: Option<Range<usize>>,
}

impl IngestReport {
    pub fn total_succeeded(&self) -> usize {
        self.batches.iter().map(|b| b.succeeded).sum()
    }

    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.batches.iter().filter(|b| b.is_failed())
    }

    /// Record ranges to resubmit: failed batches, then anything never sent.
    pub fn failed_ranges(&self) -> Vec<Range<usize>> {
        self.failed_batches()
            .map(|b| b.records.clone())
            .chain(self.unprocessed.clone())
            .collect()
    }

    pub fn document_failure_count(&self) -> usize {
        self.malformed.len()
            + self
                .batches
                .iter()
                .map(|b| b.document_failures.len())
                .sum::<usize>()
    }

    /// True when every batch and every document went through.
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.failed_batches().next().is_none() && self.document_failure_count() == 0
    }
}
