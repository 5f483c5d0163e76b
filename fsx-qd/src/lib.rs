//! fsx-qd library - Query Dashboard backend
//!
//! Read-only JSON API over the scan index: the aggregation queries behind the
//! dashboard's charts, without the chart rendering. All data endpoints live
//! under `/api`; `/health` is public.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use fsx_common::search::SearchClient;

pub mod api;
pub mod error;
pub mod query;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Search cluster client (read-only use)
    pub client: Arc<SearchClient>,
    /// Index the dashboard reads from
    pub index: String,
}

impl AppState {
    pub fn new(client: SearchClient, index: String) -> Self {
        Self {
            client: Arc::new(client),
            index,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/columns", get(api::columns))
        .route("/api/overview", get(api::overview))
        .route("/api/scan-counts", get(api::scan_counts))
        .route("/api/date-histogram", get(api::date_histogram))
        .route("/api/series", get(api::series))
        .route("/api/season-comparison", get(api::season_comparison))
        .route("/api/plot-boxes", get(api::plot_boxes))
        .with_state(state)
}
