//! Integration tests for the search cluster client
//!
//! Tests cover:
//! - Index existence checks
//! - Document counts
//! - Bulk indexing with per-item failures
//! - Delete-by-query
//! - Scrolled export paging
//! - Error mapping for non-success responses
//!
//! A stub cluster is stood up on a local port with axum; the client is pointed
//! at it over plain HTTP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use fsx_common::config::SearchConfig;
use fsx_common::search::SearchClient;

#[derive(Clone, Default)]
struct StubState {
    /// Number of scroll continuation requests served so far.
    scroll_calls: Arc<AtomicUsize>,
}

async fn head_index() -> StatusCode {
    StatusCode::OK
}

async fn count() -> Json<Value> {
    Json(json!({"count": 42}))
}

async fn search(Json(body): Json<Value>) -> impl IntoResponse {
    if body.get("boom").is_some() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"type": "parsing_exception"}})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "took": 1,
            "_scroll_id": "cursor-0",
            "hits": {
                "total": {"value": 3, "relation": "eq"},
                "hits": [
                    {"_id": "a", "_source": {"plant_name": "a"}},
                    {"_id": "b", "_source": {"plant_name": "b"}}
                ]
            }
        })),
    )
}

async fn scroll(State(state): State<StubState>) -> Json<Value> {
    let call = state.scroll_calls.fetch_add(1, Ordering::SeqCst);
    if call == 0 {
        Json(json!({
            "took": 1,
            "_scroll_id": "cursor-1",
            "hits": {
                "total": {"value": 3, "relation": "eq"},
                "hits": [{"_id": "c", "_source": {"plant_name": "c"}}]
            }
        }))
    } else {
        Json(json!({
            "took": 1,
            "_scroll_id": "cursor-1",
            "hits": {"total": {"value": 3, "relation": "eq"}, "hits": []}
        }))
    }
}

async fn clear_scroll() -> Json<Value> {
    Json(json!({"succeeded": true, "num_freed": 1}))
}

/// Serve one bulk item per action/source line pair. Documents with
/// `"bad": true` fail with a mapper error, everything else indexes.
async fn bulk(body: String) -> Json<Value> {
    let mut items = Vec::new();
    let lines: Vec<&str> = body.lines().collect();
    for pair in lines.chunks(2) {
        if pair.len() != 2 {
            continue;
        }
        let doc: Value = serde_json::from_str(pair[1]).unwrap();
        if doc.get("bad").and_then(Value::as_bool).unwrap_or(false) {
            items.push(json!({"index": {
                "status": 400,
                "error": {"type": "mapper_parsing_exception", "reason": "failed to parse"}
            }}));
        } else {
            items.push(json!({"index": {"_id": "assigned", "status": 201}}));
        }
    }
    let errors = items.iter().any(|i| i["index"]["status"] != json!(201));
    Json(json!({"took": 2, "errors": errors, "items": items}))
}

async fn delete_by_query() -> Json<Value> {
    Json(json!({"deleted": 7}))
}

async fn delete_index() -> Json<Value> {
    Json(json!({"acknowledged": true}))
}

/// Start the stub cluster, returning a config pointed at it.
async fn start_stub() -> SearchConfig {
    let state = StubState::default();
    let app = Router::new()
        .route("/fieldscan", get(head_index).delete(delete_index))
        .route("/missing-index", get(|| async { StatusCode::NOT_FOUND }))
        .route("/fieldscan/_count", get(count))
        .route("/fieldscan/_search", post(search))
        .route("/fieldscan/_delete_by_query", post(delete_by_query))
        .route("/_search/scroll", post(scroll).delete(clear_scroll))
        .route("/_bulk", post(bulk))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    SearchConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        scheme: "http".to_string(),
        ..SearchConfig::default()
    }
}

#[tokio::test]
async fn test_index_exists() {
    let config = start_stub().await;
    let client = SearchClient::new(&config).unwrap();

    assert!(client.index_exists("fieldscan").await.unwrap());
    assert!(!client.index_exists("missing-index").await.unwrap());
}

#[tokio::test]
async fn test_count_documents() {
    let config = start_stub().await;
    let client = SearchClient::new(&config).unwrap();

    assert_eq!(client.count("fieldscan").await.unwrap(), 42);
}

#[tokio::test]
async fn test_search_returns_hits() {
    let config = start_stub().await;
    let client = SearchClient::new(&config).unwrap();

    let body = json!({"query": {"match_all": {}}, "size": 2});
    let response = client.search("fieldscan", &body).await.unwrap();
    assert_eq!(response.hits.total.value, 3);
    assert_eq!(response.hits.hits.len(), 2);
    assert_eq!(response.hits.hits[0].id, "a");
}

#[tokio::test]
async fn test_search_error_carries_status_and_body() {
    let config = start_stub().await;
    let client = SearchClient::new(&config).unwrap();

    let err = client
        .search("fieldscan", &json!({"boom": true}))
        .await
        .unwrap_err();
    match err {
        fsx_common::Error::Search { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("parsing_exception"));
        }
        other => panic!("expected search error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bulk_index_reports_item_failures() {
    let config = start_stub().await;
    let client = SearchClient::new(&config).unwrap();

    let docs = vec![
        json!({"id": "a_1", "plant_name": "a"}),
        json!({"bad": true}),
        json!({"plant_name": "c"}),
    ];
    let summary = client.bulk_index("fieldscan", &docs, 2).await.unwrap();
    assert_eq!(summary.indexed, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].contains("mapper_parsing_exception"));
}

#[tokio::test]
async fn test_delete_all_docs() {
    let config = start_stub().await;
    let client = SearchClient::new(&config).unwrap();

    assert_eq!(client.delete_all_docs("fieldscan").await.unwrap(), 7);
}

#[tokio::test]
async fn test_scroll_all_pages_through_index() {
    let config = start_stub().await;
    let client = SearchClient::new(&config).unwrap();

    let mut seen = Vec::new();
    let fetched = client
        .scroll_all("fieldscan", 2, |hits| {
            seen.extend(hits.iter().map(|h| h.id.clone()));
        })
        .await
        .unwrap();

    assert_eq!(fetched, 3);
    assert_eq!(seen, vec!["a", "b", "c"]);
}
