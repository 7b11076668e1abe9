// HTTP adapter for an Elasticsearch-compatible search engine.
//
// A thin reqwest wrapper in the same shape as the other API clients: one
// shared Client, a base URL, and a helper that turns transport failures and
// non-2xx responses into typed StoreErrors. Request bodies come from
// `settings`; response bodies are decoded into the private wire types below.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::models::{
    scalar_text, AnalyzedToken, BatchResult, Document, DocumentFailure, IndexSpec, QuerySpec,
    SearchHit,
};
use super::settings;
use super::traits::DocumentStore;
use crate::error::StoreError;

/// Default engine endpoint.
pub const DEFAULT_URL: &str = "http://localhost:9200";

pub struct ElasticStore {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ElasticStore {
    /// Create a client for the engine at `base_url`. Every request is bounded
    /// by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent("textlens/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::ConnectionFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, index: &str, endpoint: &str) -> String {
        if endpoint.is_empty() {
            format!("{}/{}", self.base_url, index)
        } else {
            format!("{}/{}/{}", self.base_url, index, endpoint)
        }
    }

    /// Send a request and reject non-2xx answers.
    async fn send(&self, index: &str, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_rejection(index, status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        index: &str,
        request: RequestBuilder,
    ) -> Result<T, StoreError> {
        self.send(index, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout(self.timeout)
                } else {
                    StoreError::MalformedResponse(e.to_string())
                }
            })
    }

    fn transport_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout)
        } else if e.is_decode() {
            StoreError::MalformedResponse(e.to_string())
        } else {
            StoreError::ConnectionFailed(e.to_string())
        }
    }

    async fn analyze_with(
        &self,
        index: &str,
        body: Value,
    ) -> Result<Vec<AnalyzedToken>, StoreError> {
        let request = self.client.post(self.url(index, "_analyze")).json(&body);
        let response: AnalyzeResponse = self.send_json(index, request).await?;
        Ok(response
            .tokens
            .into_iter()
            .map(|t| AnalyzedToken {
                text: t.token,
                start_offset: t.start_offset,
                end_offset: t.end_offset,
                position: t.position,
            })
            .collect())
    }
}

/// Map an error response to a StoreError.
fn classify_rejection(index: &str, status: u16, body: &str) -> StoreError {
    let parsed: Option<ErrorResponse> = serde_json::from_str(body).ok();
    let (kind, reason) = match parsed.and_then(|r| r.error) {
        Some(ErrorBody::Detailed { kind, reason }) => (kind, reason),
        Some(ErrorBody::Plain(reason)) => (None, Some(reason)),
        None => (None, None),
    };

    if kind.as_deref() == Some("index_not_found_exception") || (status == 404 && kind.is_none()) {
        return StoreError::IndexNotFound(index.to_string());
    }

    StoreError::Rejected {
        status,
        reason: reason
            .or(kind)
            .unwrap_or_else(|| body.chars().take(200).collect()),
    }
}

#[async_trait]
impl DocumentStore for ElasticStore {
    async fn create_index(&self, index: &str, spec: &IndexSpec) -> Result<(), StoreError> {
        let body = settings::index_body(spec);
        let request = self.client.put(self.url(index, "")).json(&body);
        self.send(index, request).await?;
        info!(
            index = index,
            pipelines = spec.pipelines.len(),
            normalizers = spec.normalizers.len(),
            "Created index"
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), StoreError> {
        let request = self.client.delete(self.url(index, ""));
        self.send(index, request).await?;
        info!(index = index, "Deleted index");
        Ok(())
    }

    async fn index_batch(
        &self,
        index: &str,
        documents: Vec<Document>,
    ) -> Result<BatchResult, StoreError> {
        if documents.is_empty() {
            return Ok(BatchResult::default());
        }

        let body = settings::bulk_body(&documents)
            .map_err(|e| StoreError::MalformedResponse(format!("failed to encode bulk body: {e}")))?;
        let request = self
            .client
            .post(self.url(index, "_bulk"))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let response: BulkResponse = self.send_json(index, request).await?;

        let mut result = BatchResult::default();
        for (position, item) in response.items.into_iter().enumerate() {
            // Each item is a single-key object keyed by the action name.
            let Some(outcome) = item.into_values().next() else {
                continue;
            };
            let failed = outcome.error.is_some() || outcome.status >= 300;
            if failed {
                let locator = outcome
                    .id
                    .or_else(|| documents.get(position).map(|d| d.id.clone()))
                    .unwrap_or_else(|| format!("item {position}"));
                result.failures.push(DocumentFailure {
                    locator,
                    reason: outcome
                        .error
                        .map(|e| e.reason.or(e.kind).unwrap_or_default())
                        .unwrap_or_else(|| format!("status {}", outcome.status)),
                });
            } else {
                result.succeeded += 1;
            }
        }

        if response.errors && result.failures.is_empty() {
            warn!(index = index, "Bulk response flagged errors but no item failed");
        }
        debug!(
            index = index,
            sent = documents.len(),
            succeeded = result.succeeded,
            failed = result.failures.len(),
            "Bulk request complete"
        );
        Ok(result)
    }

    async fn analyze(
        &self,
        index: &str,
        pipeline: &str,
        text: &str,
    ) -> Result<Vec<AnalyzedToken>, StoreError> {
        self.analyze_with(index, json!({ "analyzer": pipeline, "text": text }))
            .await
    }

    async fn normalize(
        &self,
        index: &str,
        normalizer: &str,
        text: &str,
    ) -> Result<Vec<AnalyzedToken>, StoreError> {
        self.analyze_with(index, json!({ "normalizer": normalizer, "text": text }))
            .await
    }

    async fn search(&self, index: &str, query: &QuerySpec) -> Result<Vec<SearchHit>, StoreError> {
        let body = settings::search_body(query);
        debug!(index = index, query = %body, "Search request");
        let request = self.client.post(self.url(index, "_search")).json(&body);
        let response: SearchResponse = self.send_json(index, request).await?;

        Ok(response
            .hits
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                document: Document {
                    id: hit.id,
                    fields: hit
                        .source
                        .unwrap_or_default()
                        .iter()
                        .filter_map(|(k, v)| scalar_text(v).map(|text| (k.clone(), text)))
                        .collect(),
                },
                score: hit.score.unwrap_or(0.0),
            })
            .collect())
    }
}

// --- Search engine response types ---

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        #[serde(rename = "type")]
        kind: Option<String>,
        reason: Option<String>,
    },
    Plain(String),
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    tokens: Vec<WireToken>,
}

#[derive(Deserialize)]
struct WireToken {
    token: String,
    start_offset: usize,
    end_offset: usize,
    position: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: WireHits,
}

#[derive(Deserialize)]
struct WireHits {
    hits: Vec<WireHit>,
}

#[derive(Deserialize)]
struct WireHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source")]
    source: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Deserialize)]
struct BulkItem {
    #[serde(rename = "_id")]
    id: Option<String>,
    status: u16,
    error: Option<BulkItemError>,
}

#[derive(Deserialize)]
struct BulkItemError {
    #[serde(rename = "type")]
    kind: Option<String>,
    reason: Option<String>,
}
