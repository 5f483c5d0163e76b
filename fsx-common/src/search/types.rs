//! Response shapes of the search REST API
//!
//! Only the parts of the responses the tools consume are modeled; everything
//! else is ignored on deserialization.

use serde::Deserialize;
use serde_json::{Map, Value};

/// `_search` response envelope.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: u64,
    pub hits: Hits,
    /// Aggregation results, shape depends on the request body.
    #[serde(default)]
    pub aggregations: Option<Value>,
    #[serde(rename = "_scroll_id", default)]
    pub scroll_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Hits {
    pub total: HitsTotal,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
pub struct HitsTotal {
    pub value: u64,
    #[serde(default)]
    pub relation: String,
}

#[derive(Debug, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct DeleteByQueryResponse {
    pub deleted: u64,
}

/// `_bulk` response envelope.
#[derive(Debug, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    pub errors: bool,
    pub items: Vec<BulkItem>,
}

/// One item result. The tools only issue `index` actions.
#[derive(Debug, Deserialize)]
pub struct BulkItem {
    pub index: BulkItemStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkItemStatus {
    pub status: u16,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<BulkError>,
}

#[derive(Debug, Deserialize)]
pub struct BulkError {
    #[serde(rename = "type")]
    pub kind: String,
    pub reason: String,
}

/// Outcome of a bulk upload across all batches.
#[derive(Debug, Default, Clone)]
pub struct BulkSummary {
    pub indexed: u64,
    pub failed: u64,
    /// First few failure reasons, for log output.
    pub errors: Vec<String>,
}
