//! HTTP handlers for the query API

use std::collections::BTreeSet;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::query::{
    columns_body, date_histogram_body, plot_boxes_body, scan_counts_body, series_body,
    shape_date_histogram, shape_scan_counts, shape_season_comparison, shape_series, FilterParams,
    ScanFilter, INSTRUMENTS,
};
use crate::AppState;

/// Overview sample size shown by the dashboard.
const OVERVIEW_SAMPLE_SIZE: usize = 5;

fn parse_filter(params: FilterParams) -> ApiResult<ScanFilter> {
    ScanFilter::from_params(params).map_err(ApiError::BadRequest)
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "module": "fsx-qd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/columns - union of document fields across sensor types.
pub async fn columns(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut columns: BTreeSet<String> = BTreeSet::new();
    for instrument in INSTRUMENTS {
        let response = state
            .client
            .search(&state.index, &columns_body(instrument))
            .await?;
        for hit in &response.hits.hits {
            columns.extend(hit.source.keys().cloned());
        }
    }
    Ok(Json(json!({"columns": columns})))
}

/// GET /api/overview - filtered total plus a few sample documents.
pub async fn overview(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> ApiResult<Json<Value>> {
    let filter = parse_filter(params)?;
    let mut body = filter.query();
    body["size"] = json!(OVERVIEW_SAMPLE_SIZE);
    let response = state.client.search(&state.index, &body).await?;
    let sample: Vec<Value> = response
        .hits
        .hits
        .iter()
        .map(|hit| Value::Object(hit.source.clone()))
        .collect();
    Ok(Json(json!({
        "total": response.hits.total.value,
        "sample": sample,
    })))
}

/// GET /api/scan-counts - scans and file sizes per instrument.
pub async fn scan_counts(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> ApiResult<Json<Value>> {
    let filter = parse_filter(params)?;
    let response = state
        .client
        .search(&state.index, &scan_counts_body(&filter))
        .await?;
    let aggs = response.aggregations.unwrap_or(Value::Null);
    Ok(Json(json!({"rows": shape_scan_counts(&aggs)})))
}

/// GET /api/date-histogram - per-day counts per instrument.
pub async fn date_histogram(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> ApiResult<Json<Value>> {
    let filter = parse_filter(params)?;
    let response = state
        .client
        .search(&state.index, &date_histogram_body(&filter))
        .await?;
    let aggs = response.aggregations.unwrap_or(Value::Null);
    Ok(Json(json!({"rows": shape_date_histogram(&aggs)})))
}

#[derive(Debug, Deserialize)]
pub struct SeriesParams {
    /// Comma-separated column names.
    pub columns: String,
    #[serde(flatten)]
    pub filter: FilterParams,
}

/// GET /api/series - per-day statistics for one or more columns.
pub async fn series(
    State(state): State<AppState>,
    Query(params): Query<SeriesParams>,
) -> ApiResult<Json<Value>> {
    let columns: Vec<String> = params
        .columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if columns.is_empty() {
        return Err(ApiError::BadRequest("no columns requested".to_string()));
    }
    let filter = parse_filter(params.filter)?;

    // One query per column so a sparse column does not drop the others' days
    let mut shaped = serde_json::Map::new();
    for column in &columns {
        debug!(column, "series query");
        let response = state
            .client
            .search(&state.index, &series_body(&filter, column))
            .await?;
        let aggs = response.aggregations.unwrap_or(Value::Null);
        shaped.insert(column.clone(), json!(shape_series(column, &aggs)));
    }
    Ok(Json(Value::Object(shaped)))
}

/// GET /api/season-comparison - per-day counts aligned on month-day across
/// years.
pub async fn season_comparison(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> ApiResult<Json<Value>> {
    let filter = parse_filter(params)?;
    let response = state
        .client
        .search(&state.index, &date_histogram_body(&filter))
        .await?;
    let aggs = response.aggregations.unwrap_or(Value::Null);
    let rows = shape_date_histogram(&aggs);
    Ok(Json(shape_season_comparison(
        &rows,
        &filter.sensors,
        &filter.years,
    )))
}

#[derive(Debug, Deserialize)]
pub struct PlotBoxesParams {
    pub date: NaiveDate,
}

/// GET /api/plot-boxes - plot corner coordinates for one calendar day.
pub async fn plot_boxes(
    State(state): State<AppState>,
    Query(params): Query<PlotBoxesParams>,
) -> ApiResult<Json<Value>> {
    let response = state
        .client
        .search(&state.index, &plot_boxes_body(params.date))
        .await?;
    let boxes: Vec<Value> = response
        .hits
        .hits
        .iter()
        .map(|hit| {
            let mut doc = hit.source.clone();
            doc.insert("id".to_string(), json!(hit.id));
            Value::Object(doc)
        })
        .collect();
    Ok(Json(json!({"boxes": boxes})))
}
