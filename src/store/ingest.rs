// Bulk ingest — chunk a lazy record sequence into batches and send them.
//
// Works over any DocumentStore. Batches are independent: up to
// `concurrency` run at once, each bounded by `batch_timeout`. A failed batch
// is recorded with its record range and the run carries on. In fail-fast
// mode no new batches are issued after the first failure; batches already
// in flight are still awaited and reported, and the records never sent are
// reported as `unprocessed`.

use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};

use super::models::{BatchOutcome, DocumentFailure, IngestOptions, IngestRecord, IngestReport};
use super::traits::DocumentStore;
use crate::error::StoreError;

/// Ingest `records` into `index`, calling `on_batch` as each batch finishes.
pub async fn bulk_ingest<S, I, F>(
    store: &S,
    index: &str,
    records: I,
    options: &IngestOptions,
    mut on_batch: F,
) -> IngestReport
where
    S: DocumentStore + ?Sized,
    I: IntoIterator<Item = IngestRecord>,
    F: FnMut(&BatchOutcome),
{
    let batch_size = options.batch_size.max(1);
    let concurrency = options.concurrency.max(1);
    let timeout = options.batch_timeout;

    let mut records = records.into_iter().fuse();
    let mut in_flight = FuturesUnordered::new();
    let mut next_batch = 0;
    let mut next_record = 0;
    let mut report = IngestReport::default();

    loop {
        while !report.aborted && in_flight.len() < concurrency {
            let chunk: Vec<IngestRecord> = records.by_ref().take(batch_size).collect();
            if chunk.is_empty() {
                break;
            }
            let range = next_record..next_record + chunk.len();
            next_record = range.end;
            in_flight.push(run_batch(store, index, next_batch, range, chunk, timeout));
            next_batch += 1;
        }

        let Some((outcome, malformed)) = in_flight.next().await else {
            break;
        };
        report.malformed.extend(malformed);
        on_batch(&outcome);

        if let Some(error) = &outcome.error {
            warn!(
                batch = outcome.batch_index,
                records = ?outcome.records,
                retryable = error.is_retryable(),
                error = %error,
                "Batch failed"
            );
            if options.fail_fast {
                report.aborted = true;
            }
        }
        report.batches.push(outcome);
    }

    if report.aborted {
        let remaining = records.count();
        if remaining > 0 {
            report.unprocessed = Some(next_record..next_record + remaining);
        }
    }

    report.batches.sort_by_key(|b| b.batch_index);
    info!(
        index = index,
        batches = report.batches.len(),
        succeeded = report.total_succeeded(),
        failed_batches = report.failed_batches().count(),
        unprocessed = ?report.unprocessed,
        document_failures = report.document_failure_count(),
        aborted = report.aborted,
        "Bulk ingest finished"
    );
    report
}

async fn run_batch<S>(
    store: &S,
    index: &str,
    batch_index: usize,
    records: std::ops::Range<usize>,
    chunk: Vec<IngestRecord>,
    timeout: Duration,
) -> (BatchOutcome, Vec<DocumentFailure>)
where
    S: DocumentStore + ?Sized,
{
    let mut documents = Vec::with_capacity(chunk.len());
    let mut malformed = Vec::new();
    for record in chunk {
        match record {
            Ok(document) => documents.push(document),
            Err(failure) => malformed.push(failure),
        }
    }

    let mut outcome = BatchOutcome {
        batch_index,
        records,
        submitted: documents.len(),
        succeeded: 0,
        error: None,
        document_failures: Vec::new(),
    };
    if documents.is_empty() {
        return (outcome, malformed);
    }

    match tokio::time::timeout(timeout, store.index_batch(index, documents)).await {
        Ok(Ok(result)) => {
            outcome.succeeded = result.succeeded;
            outcome.document_failures = result.failures;
        }
        Ok(Err(error)) => outcome.error = Some(error),
        Err(_) => outcome.error = Some(StoreError::Timeout(timeout)),
    }
    (outcome, malformed)
}
