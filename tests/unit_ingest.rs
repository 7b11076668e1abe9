// Unit tests for the bulk ingest driver.
//
// A scripted store stands in for the search engine: it records every batch
// it receives and fails the ones it is told to.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use textlens::error::StoreError;
use textlens::store::ingest::bulk_ingest;
use textlens::store::models::{
    AnalyzedToken, BatchResult, Document, DocumentFailure, IndexSpec, IngestOptions,
    IngestRecord, QuerySpec, SearchHit,
};
use textlens::store::DocumentStore;

#[derive(Default)]
struct ScriptedStore {
    /// Any batch containing one of these ids fails as a whole.
    failing_ids: HashSet<String>,
    /// Documents with these ids are rejected individually.
    rejected_ids: HashSet<String>,
    /// Batches never answer.
    hang: bool,
    /// How long a successful batch takes to answer.
    ok_delay: Duration,
    /// How long a failing batch takes to answer.
    fail_delay: Duration,
    received: Mutex<Vec<Vec<String>>>,
}

impl ScriptedStore {
    fn batch_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.received.lock().unwrap().iter().map(Vec::len).collect();
        sizes.sort_unstable();
        sizes
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn create_index(&self, _index: &str, _spec: &IndexSpec) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete_index(&self, _index: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn index_batch(
        &self,
        _index: &str,
        documents: Vec<Document>,
    ) -> Result<BatchResult, StoreError> {
        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        self.received.lock().unwrap().push(ids.clone());

        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let failing = ids.iter().any(|id| self.failing_ids.contains(id));
        let delay = if failing { self.fail_delay } else { self.ok_delay };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(StoreError::Rejected {
                status: 503,
                reason: "unavailable".to_string(),
            });
        }

        let mut result = BatchResult::default();
        for id in ids {
            if self.rejected_ids.contains(&id) {
                result.failures.push(DocumentFailure {
                    locator: id,
                    reason: "mapper_parsing_exception".to_string(),
                });
            } else {
                result.succeeded += 1;
            }
        }
        Ok(result)
    }

    async fn analyze(
        &self,
        _index: &str,
        _pipeline: &str,
        _text: &str,
    ) -> Result<Vec<AnalyzedToken>, StoreError> {
        Ok(Vec::new())
    }

    async fn normalize(
        &self,
        _index: &str,
        _normalizer: &str,
        _text: &str,
    ) -> Result<Vec<AnalyzedToken>, StoreError> {
        Ok(Vec::new())
    }

    async fn search(&self, _index: &str, _query: &QuerySpec) -> Result<Vec<SearchHit>, StoreError> {
        Ok(Vec::new())
    }
}

fn documents(n: usize) -> Vec<IngestRecord> {
    (0..n)
        .map(|i| Ok(Document::new(i.to_string()).with_field("text_entry", format!("line {i}"))))
        .collect()
}

fn options(batch_size: usize, concurrency: usize) -> IngestOptions {
    IngestOptions {
        batch_size,
        concurrency,
        ..IngestOptions::default()
    }
}

#[tokio::test]
async fn batches_are_ceil_n_over_b() {
    let store = ScriptedStore::default();
    let report = bulk_ingest(&store, "plays", documents(25), &options(10, 3), |_| {}).await;

    assert_eq!(report.batches.len(), 3);
    assert_eq!(store.batch_sizes(), vec![5, 10, 10]);
    assert_eq!(report.total_succeeded(), 25);
    assert!(report.is_clean());

    let ranges: Vec<_> = report.batches.iter().map(|b| b.records.clone()).collect();
    assert_eq!(ranges, vec![0..10, 10..20, 20..25]);
}

#[tokio::test]
async fn exact_multiple_has_no_partial_batch() {
    let store = ScriptedStore::default();
    let report = bulk_ingest(&store, "plays", documents(20), &options(10, 1), |_| {}).await;
    assert_eq!(report.batches.len(), 2);
    assert_eq!(report.total_succeeded(), 20);
}

#[tokio::test]
async fn empty_input_issues_no_batches() {
    let store = ScriptedStore::default();
    let report = bulk_ingest(&store, "plays", documents(0), &options(10, 2), |_| {}).await;
    assert!(report.batches.is_empty());
    assert!(store.batch_sizes().is_empty());
    assert!(report.is_clean());
}

#[tokio::test]
async fn failed_batch_is_reported_and_others_continue() {
    let store = ScriptedStore {
        failing_ids: HashSet::from(["12".to_string()]),
        ..Default::default()
    };
    let report = bulk_ingest(&store, "plays", documents(30), &options(10, 2), |_| {}).await;

    assert_eq!(report.batches.len(), 3);
    assert_eq!(report.failed_ranges(), vec![10..20]);
    assert_eq!(report.total_succeeded(), 20);
    assert!(!report.aborted);
    assert!(!report.is_clean());

    let failed = report.failed_batches().next().unwrap();
    assert!(failed.error.as_ref().unwrap().is_retryable());
}

#[tokio::test]
async fn fail_fast_stops_issuing_batches() {
    let store = ScriptedStore {
        failing_ids: HashSet::from(["0".to_string()]),
        ..Default::default()
    };
    let opts = IngestOptions {
        fail_fast: true,
        ..options(10, 1)
    };
    let report = bulk_ingest(&store, "plays", documents(50), &opts, |_| {}).await;

    assert!(report.aborted);
    // Sequential run: the first batch failed, nothing after it was sent.
    assert_eq!(store.batch_sizes(), vec![10]);
    assert_eq!(report.unprocessed, Some(10..50));
    assert_eq!(report.failed_ranges(), vec![0..10, 10..50]);
}

#[tokio::test]
async fn fail_fast_accounts_for_in_flight_and_unsent_records() {
    // The failing batch answers first while three others are still running.
    let store = ScriptedStore {
        failing_ids: HashSet::from(["0".to_string()]),
        ok_delay: Duration::from_millis(30),
        fail_delay: Duration::from_millis(5),
        ..Default::default()
    };
    let opts = IngestOptions {
        fail_fast: true,
        ..options(10, 4)
    };
    let report = bulk_ingest(&store, "plays", documents(50), &opts, |_| {}).await;

    assert!(report.aborted);
    assert_eq!(store.batch_sizes(), vec![10, 10, 10, 10]);
    assert_eq!(report.batches.len(), 4);
    assert_eq!(report.total_succeeded(), 30);
    assert_eq!(report.unprocessed, Some(40..50));
    assert_eq!(report.failed_ranges(), vec![0..10, 40..50]);

    // Every record is either confirmed by a batch outcome or listed for retry.
    let sent: usize = store.received.lock().unwrap().iter().map(Vec::len).sum();
    let reported: usize = report.batches.iter().map(|b| b.records.len()).sum();
    assert_eq!(sent, reported);
    let unsent = report.unprocessed.as_ref().map_or(0, |r| r.len());
    assert_eq!(reported + unsent, 50);
}

#[tokio::test]
async fn fail_fast_without_failures_leaves_nothing_unprocessed() {
    let store = ScriptedStore::default();
    let opts = IngestOptions {
        fail_fast: true,
        ..options(10, 3)
    };
    let report = bulk_ingest(&store, "plays", documents(25), &opts, |_| {}).await;
    assert!(!report.aborted);
    assert_eq!(report.unprocessed, None);
    assert!(report.is_clean());
}

#[tokio::test]
async fn per_document_rejections_are_counted() {
    let store = ScriptedStore {
        rejected_ids: HashSet::from(["3".to_string(), "7".to_string()]),
        ..Default::default()
    };
    let report = bulk_ingest(&store, "plays", documents(10), &options(4, 2), |_| {}).await;

    assert_eq!(report.total_succeeded(), 8);
    assert_eq!(report.document_failure_count(), 2);
    assert!(report.failed_ranges().is_empty());
    assert!(!report.is_clean());
}

#[tokio::test]
async fn malformed_records_are_counted_not_sent() {
    let store = ScriptedStore::default();
    let mut records = documents(4);
    records.insert(
        2,
        Err(DocumentFailure {
            locator: "line 3".to_string(),
            reason: "invalid JSON".to_string(),
        }),
    );

    let report = bulk_ingest(&store, "plays", records, &options(5, 1), |_| {}).await;

    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.batches[0].submitted, 4);
    assert_eq!(report.total_succeeded(), 4);
    assert_eq!(report.malformed.len(), 1);
    assert_eq!(report.document_failure_count(), 1);
}

#[tokio::test]
async fn batch_of_only_malformed_records_skips_the_store() {
    let store = ScriptedStore::default();
    let records: Vec<IngestRecord> = (0..3)
        .map(|i| {
            Err(DocumentFailure {
                locator: format!("line {i}"),
                reason: "bad".to_string(),
            })
        })
        .collect();
    let report = bulk_ingest(&store, "plays", records, &options(10, 1), |_| {}).await;
    assert_eq!(report.batches.len(), 1);
    assert_eq!(report.batches[0].submitted, 0);
    assert!(store.batch_sizes().is_empty());
}

#[tokio::test]
async fn slow_batches_time_out() {
    let store = ScriptedStore {
        hang: true,
        ..Default::default()
    };
    let opts = IngestOptions {
        batch_timeout: Duration::from_millis(50),
        ..options(10, 2)
    };
    let report = bulk_ingest(&store, "plays", documents(15), &opts, |_| {}).await;

    assert_eq!(report.failed_ranges(), vec![0..10, 10..15]);
    for batch in &report.batches {
        assert_eq!(batch.error, Some(StoreError::Timeout(Duration::from_millis(50))));
    }
}

#[tokio::test]
async fn progress_callback_sees_every_batch() {
    let store = ScriptedStore::default();
    let mut seen = 0;
    let mut records_seen = 0;
    bulk_ingest(&store, "plays", documents(23), &options(5, 4), |outcome| {
        seen += 1;
        records_seen += outcome.records.len();
    })
    .await;
    assert_eq!(seen, 5);
    assert_eq!(records_seen, 23);
}
