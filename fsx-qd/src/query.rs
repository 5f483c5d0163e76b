//! Search query assembly and aggregation shaping
//!
//! The dashboard's charts all reduce to a handful of aggregation shapes over
//! the scan index: terms-by-instrument with file-size sums, per-day date
//! histograms, and per-column statistics. This module builds the request
//! bodies and flattens the bucketed responses into the row shapes the API
//! returns. Aggregation responses arrive as loose JSON; the shaping functions
//! tolerate missing pieces by emitting nulls rather than failing the request.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use fsx_common::scan_date::format_scan_day;

/// Instrument names as indexed, one per sensor platform.
pub const INSTRUMENTS: &[&str] = &["flirIrCamera", "scanner3DTop", "drone", "stereoTop"];

/// Raw filter query parameters; list-valued filters arrive comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub crop_type: Option<String>,
    pub sensors: Option<String>,
    pub years: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Parsed dashboard filter.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanFilter {
    pub crop_type: Vec<String>,
    pub sensors: Vec<String>,
    pub years: Vec<i64>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

fn split_list(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl ScanFilter {
    /// Parse raw query parameters. Unknown sensors pass through to the index
    /// (they simply match nothing); non-numeric years are a caller error.
    pub fn from_params(params: FilterParams) -> Result<Self, String> {
        let years = split_list(&params.years)
            .iter()
            .map(|y| y.parse::<i64>().map_err(|_| format!("invalid year: {y}")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            crop_type: split_list(&params.crop_type),
            sensors: split_list(&params.sensors),
            years,
            from_date: params.from_date,
            to_date: params.to_date,
        })
    }

    /// The filter as a bool/must query body. Empty filters produce an empty
    /// must list, which matches everything.
    pub fn query(&self) -> Value {
        let mut must: Vec<Value> = Vec::new();
        if !self.crop_type.is_empty() {
            must.push(json!({"terms": {"crop_type": self.crop_type}}));
        }
        let mut range = Map::new();
        if let Some(from) = self.from_date {
            range.insert("gte".to_string(), json!(format_scan_day(from)));
        }
        if let Some(to) = self.to_date {
            range.insert("lte".to_string(), json!(format_scan_day(to)));
        }
        if !range.is_empty() {
            must.push(json!({"range": {"scan_date": range}}));
        }
        if !self.sensors.is_empty() {
            must.push(json!({"terms": {"instrument": self.sensors}}));
        }
        if !self.years.is_empty() {
            must.push(json!({"terms": {"year": self.years}}));
        }
        json!({"query": {"bool": {"must": must}}})
    }
}

/// Per-instrument scan counts with deduplicated file-size sums. Unique-file
/// sub-aggregations keep repeated provenance paths from inflating the totals.
pub fn scan_counts_body(filter: &ScanFilter) -> Value {
    let mut body = filter.query();
    body["aggs"] = json!({
        "by_instrument": {
            "terms": {"field": "instrument"},
            "aggs": {
                "unique_files": {
                    "terms": {"field": "file_path", "size": 10000},
                    "aggs": {"total_file_size": {"sum": {"field": "file_size"}}}
                },
                "unique_fieldbook_files": {
                    "terms": {"field": "fieldbook_file_path", "size": 10000},
                    "aggs": {"total_fieldbook_file_size": {"sum": {"field": "fieldbook_file_size"}}}
                },
                "unique_entropy_files": {
                    "terms": {"field": "entropy_file_name.keyword", "size": 10000},
                    "aggs": {"total_entropy_file_size": {"sum": {"field": "entropy_file_size"}}}
                }
            }
        }
    });
    body["size"] = json!(0);
    body
}

/// Per-day date histogram with per-instrument counts.
pub fn date_histogram_body(filter: &ScanFilter) -> Value {
    let mut body = filter.query();
    body["aggs"] = json!({
        "by_scan_date": {
            "date_histogram": {
                "field": "scan_date",
                "calendar_interval": "day",
                "format": "yyyy-MM-dd"
            },
            "aggs": {
                "by_instrument": {"terms": {"field": "instrument"}}
            }
        }
    });
    body["size"] = json!(0);
    body
}

/// Per-day series for one column. Numeric sensor columns aggregate with
/// mean/median/max/min; `azmet_*` columns are constant per day (one weather
/// report), so a single top hit carries the value.
pub fn series_body(filter: &ScanFilter, column: &str) -> Value {
    let per_day = if column.starts_with("azmet_") {
        json!({
            "value": {
                "top_hits": {"_source": {"includes": [column]}, "size": 1}
            }
        })
    } else {
        json!({
            "mean": {"avg": {"field": column}},
            "median": {"percentiles": {"field": column, "percents": [50]}},
            "max": {"max": {"field": column}},
            "min": {"min": {"field": column}}
        })
    };
    let mut body = filter.query();
    body["aggs"] = json!({
        "by_scan_date": {
            "date_histogram": {
                "field": "scan_date",
                "calendar_interval": "day",
                "format": "yyyy-MM-dd"
            },
            "aggs": per_day
        }
    });
    body["size"] = json!(0);
    body
}

/// Documents of one calendar day carrying all four plot corner fields.
pub fn plot_boxes_body(date: NaiveDate) -> Value {
    json!({
        "query": {
            "bool": {
                "must": [
                    {"exists": {"field": "nw_lat"}},
                    {"exists": {"field": "nw_lon"}},
                    {"exists": {"field": "se_lat"}},
                    {"exists": {"field": "se_lon"}},
                    {"term": {"scan_date": format_scan_day(date)}}
                ]
            }
        },
        "_source": ["nw_lat", "nw_lon", "se_lat", "se_lon"],
        "size": 10000
    })
}

/// One sample document per instrument, for column discovery.
pub fn columns_body(instrument: &str) -> Value {
    json!({
        "query": {"bool": {"must": [{"term": {"instrument": instrument}}]}},
        "size": 1
    })
}

fn buckets<'a>(aggs: &'a Value, name: &str) -> &'a [Value] {
    aggs.get(name)
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Sum of a nested sum-aggregation across a unique-terms bucket list.
fn sum_over_buckets(bucket: &Value, terms_name: &str, sum_name: &str) -> f64 {
    buckets(bucket, terms_name)
        .iter()
        .filter_map(|b| b.get(sum_name)?.get("value")?.as_f64())
        .sum()
}

/// Shape a scan-counts response into rows plus a `Total` row.
pub fn shape_scan_counts(aggs: &Value) -> Vec<Value> {
    let mut rows = Vec::new();
    let mut total_scans = 0u64;
    let mut total_size = 0f64;
    for bucket in buckets(aggs, "by_instrument") {
        let scans = bucket.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
        let size = sum_over_buckets(bucket, "unique_files", "total_file_size")
            + sum_over_buckets(bucket, "unique_fieldbook_files", "total_fieldbook_file_size")
            + sum_over_buckets(bucket, "unique_entropy_files", "total_entropy_file_size");
        rows.push(json!({
            "instrument": bucket.get("key"),
            "scans": scans,
            "total_file_size": size
        }));
        total_scans += scans;
        total_size += size;
    }
    rows.push(json!({
        "instrument": "Total",
        "scans": total_scans,
        "total_file_size": total_size
    }));
    rows
}

/// Flatten a date histogram with nested instrument terms into
/// `{scan_date, instrument, count}` rows.
pub fn shape_date_histogram(aggs: &Value) -> Vec<Value> {
    let mut rows = Vec::new();
    for day in buckets(aggs, "by_scan_date") {
        let scan_date = day.get("key_as_string").cloned().unwrap_or(Value::Null);
        for instrument in buckets(day, "by_instrument") {
            rows.push(json!({
                "scan_date": scan_date,
                "instrument": instrument.get("key"),
                "count": instrument.get("doc_count")
            }));
        }
    }
    rows
}

/// Shape one column's series response into per-day points.
pub fn shape_series(column: &str, aggs: &Value) -> Vec<Value> {
    let mut points = Vec::new();
    for day in buckets(aggs, "by_scan_date") {
        let scan_date = day.get("key_as_string").cloned().unwrap_or(Value::Null);
        if column.starts_with("azmet_") {
            let value = day
                .pointer("/value/hits/hits/0/_source")
                .and_then(|source| source.get(column))
                .cloned()
                .unwrap_or(Value::Null);
            if value.is_null() {
                continue;
            }
            points.push(json!({"scan_date": scan_date, "value": value}));
        } else {
            let mean = day.pointer("/mean/value").cloned().unwrap_or(Value::Null);
            if mean.is_null() {
                continue;
            }
            points.push(json!({
                "scan_date": scan_date,
                "mean": mean,
                "median": day.pointer("/median/values/50.0"),
                "max": day.pointer("/max/value"),
                "min": day.pointer("/min/value")
            }));
        }
    }
    points
}

/// Regroup date-histogram rows for season comparison: per sensor, per year,
/// points keyed by month-day so different seasons align on one axis. Empty
/// sensor/year selections include everything present in the rows.
pub fn shape_season_comparison(rows: &[Value], sensors: &[String], years: &[i64]) -> Value {
    use std::collections::BTreeMap;

    let mut shaped: BTreeMap<String, BTreeMap<String, Vec<Value>>> = BTreeMap::new();
    for row in rows {
        let Some(scan_date) = row.get("scan_date").and_then(Value::as_str) else {
            continue;
        };
        let Ok(day) = NaiveDate::parse_from_str(scan_date, "%Y-%m-%d") else {
            continue;
        };
        let Some(instrument) = row.get("instrument").and_then(Value::as_str) else {
            continue;
        };
        let year = chrono::Datelike::year(&day) as i64;
        if !sensors.is_empty() && !sensors.iter().any(|s| s == instrument) {
            continue;
        }
        if !years.is_empty() && !years.contains(&year) {
            continue;
        }

        shaped
            .entry(instrument.to_string())
            .or_default()
            .entry(year.to_string())
            .or_default()
            .push(json!({
                "month_day": day.format("%m-%d").to_string(),
                "count": row.get("count")
            }));
    }
    json!(shaped)
}
