// Document store trait — the swap-ready boundary to the search engine.
//
// ElasticStore talks to a real engine over HTTP; MemoryStore runs the same
// operations in-process. Everything above this trait takes an
// `Arc<dyn DocumentStore>` so the backend is chosen once, at startup.

use async_trait::async_trait;

use super::models::{AnalyzedToken, BatchResult, Document, IndexSpec, QuerySpec, SearchHit};
use crate::error::StoreError;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create an index with the given analysis settings.
    async fn create_index(&self, index: &str, spec: &IndexSpec) -> Result<(), StoreError>;

    /// Drop an index. Missing indexes report `IndexNotFound`.
    async fn delete_index(&self, index: &str) -> Result<(), StoreError>;

    /// Send one bulk request. Individual documents may fail without failing
    /// the whole batch; those come back in `BatchResult::failures`.
    async fn index_batch(&self, index: &str, documents: Vec<Document>)
        -> Result<BatchResult, StoreError>;

    /// Run `text` through a registered pipeline.
    async fn analyze(
        &self,
        index: &str,
        pipeline: &str,
        text: &str,
    ) -> Result<Vec<AnalyzedToken>, StoreError>;

    /// Run `text` through a registered normalizer.
    async fn normalize(
        &self,
        index: &str,
        normalizer: &str,
        text: &str,
    ) -> Result<Vec<AnalyzedToken>, StoreError>;

    async fn search(&self, index: &str, query: &QuerySpec) -> Result<Vec<SearchHit>, StoreError>;
}
