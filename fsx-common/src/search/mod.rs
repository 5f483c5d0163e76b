//! Client for the OpenSearch-compatible REST API
//!
//! A thin wrapper over the cluster's HTTP endpoints: existence checks, counts,
//! searches, bulk indexing, delete-by-query, index deletion, and scrolled
//! export. No query planning or retry logic lives here; callers own their
//! request bodies.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::record::doc_id_of;

mod types;
pub use types::{
    BulkError, BulkItem, BulkItemStatus, BulkResponse, BulkSummary, CountResponse,
    DeleteByQueryResponse, Hit, Hits, HitsTotal, SearchResponse,
};

/// Keep-alive window for scroll cursors.
const SCROLL_KEEP_ALIVE: &str = "2m";

/// Page size used by scrolled exports.
pub const SCROLL_PAGE_SIZE: usize = 1000;

/// Documents per `_bulk` request.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Failure reasons kept per bulk upload for log output.
const MAX_ERROR_SAMPLES: usize = 5;

pub struct SearchClient {
    http: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }
        request
    }

    /// Map non-success responses to [`Error::Search`] with the body attached.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Search {
            status: status.as_u16(),
            body,
        })
    }

    /// Whether the index exists (`HEAD /{index}`).
    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.request(Method::HEAD, &format!("/{index}")).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Search {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Number of documents in the index.
    pub async fn count(&self, index: &str) -> Result<u64> {
        let response = self
            .request(Method::GET, &format!("/{index}/_count"))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<CountResponse>().await?.count)
    }

    /// Execute a search body against the index.
    pub async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse> {
        debug!(index, "search request");
        let response = self
            .request(Method::POST, &format!("/{index}/_search"))
            .json(body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Bulk-index documents in batches.
    ///
    /// Documents carrying an `id` field are indexed under that id, so
    /// re-running an upload overwrites instead of duplicating. Item failures
    /// are collected into the summary rather than aborting the upload.
    pub async fn bulk_index(
        &self,
        index: &str,
        docs: &[Value],
        batch_size: usize,
    ) -> Result<BulkSummary> {
        let mut summary = BulkSummary::default();
        let batch_size = batch_size.max(1);
        for batch in docs.chunks(batch_size) {
            let body = bulk_body(index, batch)?;
            let response = self
                .request(Method::POST, "/_bulk")
                .header(header::CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .send()
                .await?;
            let response = Self::check(response).await?;
            let parsed: BulkResponse = response.json().await?;
            for item in parsed.items {
                if item.index.status < 300 {
                    summary.indexed += 1;
                } else {
                    summary.failed += 1;
                    if summary.errors.len() < MAX_ERROR_SAMPLES {
                        let reason = match item.index.error {
                            Some(error) => format!("{}: {}", error.kind, error.reason),
                            None => format!("HTTP {}", item.index.status),
                        };
                        summary.errors.push(reason);
                    }
                }
            }
            debug!(
                indexed = summary.indexed,
                failed = summary.failed,
                "bulk batch complete"
            );
        }
        Ok(summary)
    }

    /// Delete every document in the index, returning how many were removed.
    pub async fn delete_all_docs(&self, index: &str) -> Result<u64> {
        let body = json!({"query": {"match_all": {}}});
        let response = self
            .request(Method::POST, &format!("/{index}/_delete_by_query"))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<DeleteByQueryResponse>().await?.deleted)
    }

    /// Delete the index itself.
    pub async fn delete_index(&self, index: &str) -> Result<()> {
        let response = self.request(Method::DELETE, &format!("/{index}")).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Page through every document with the scroll API, invoking `visit` once
    /// per page of hits. Returns the number of documents visited. The scroll
    /// cursor is cleared afterwards on a best-effort basis.
    pub async fn scroll_all<F>(&self, index: &str, page_size: usize, mut visit: F) -> Result<u64>
    where
        F: FnMut(&[Hit]),
    {
        let body = json!({"query": {"match_all": {}}, "size": page_size});
        let response = self
            .request(
                Method::POST,
                &format!("/{index}/_search?scroll={SCROLL_KEEP_ALIVE}"),
            )
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let mut page: SearchResponse = response.json().await?;

        let mut fetched = 0u64;
        let mut scroll_id = page.scroll_id.clone();
        while !page.hits.hits.is_empty() {
            fetched += page.hits.hits.len() as u64;
            visit(&page.hits.hits);

            let Some(cursor) = scroll_id.clone() else {
                warn!(index, "scroll response carried no cursor, stopping early");
                break;
            };
            let body = json!({"scroll": SCROLL_KEEP_ALIVE, "scroll_id": cursor});
            let response = self
                .request(Method::POST, "/_search/scroll")
                .json(&body)
                .send()
                .await?;
            let response = Self::check(response).await?;
            page = response.json().await?;
            if page.scroll_id.is_some() {
                scroll_id = page.scroll_id.clone();
            }
        }

        if let Some(cursor) = scroll_id {
            let body = json!({"scroll_id": cursor});
            let _ = self
                .request(Method::DELETE, "/_search/scroll")
                .json(&body)
                .send()
                .await;
        }
        Ok(fetched)
    }
}

/// Assemble the NDJSON body for one bulk batch. The trailing newline is
/// required by the API.
pub fn bulk_body(index: &str, docs: &[Value]) -> Result<String> {
    let mut body = String::new();
    for doc in docs {
        let action = match doc_id_of(doc) {
            Some(id) => json!({"index": {"_index": index, "_id": id}}),
            None => json!({"index": {"_index": index}}),
        };
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bulk_body_pairs_action_and_source_lines() {
        let docs = vec![
            json!({"id": "a_1", "plant_name": "a"}),
            json!({"mean_tgi": 0.4}),
        ];
        let body = bulk_body("fieldscan", &docs).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_index"], json!("fieldscan"));
        assert_eq!(action["index"]["_id"], json!("a_1"));

        // No id field means the cluster assigns one
        let action: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(action["index"].get("_id"), None);
        assert!(body.ends_with('\n'));
    }

    #[test]
    fn bulk_response_parses_item_errors() {
        let raw = json!({
            "took": 11,
            "errors": true,
            "items": [
                {"index": {"_id": "a_1", "status": 201}},
                {"index": {"status": 400, "error": {"type": "mapper_parsing_exception", "reason": "failed to parse"}}}
            ]
        });
        let parsed: BulkResponse = serde_json::from_value(raw).unwrap();
        assert!(parsed.errors);
        assert_eq!(parsed.items[0].index.status, 201);
        let error = parsed.items[1].index.error.as_ref().unwrap();
        assert_eq!(error.kind, "mapper_parsing_exception");
    }

    #[test]
    fn search_response_parses_hits_and_aggregations() {
        let raw = json!({
            "took": 3,
            "hits": {
                "total": {"value": 2, "relation": "eq"},
                "hits": [
                    {"_id": "x", "_source": {"plant_name": "a"}},
                    {"_id": "y", "_source": {"plant_name": "b"}}
                ]
            },
            "aggregations": {"by_instrument": {"buckets": []}}
        });
        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.hits.total.value, 2);
        assert_eq!(parsed.hits.hits[0].source["plant_name"], json!("a"));
        assert!(parsed.aggregations.is_some());
        assert!(parsed.scroll_id.is_none());
    }
}
