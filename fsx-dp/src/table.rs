//! Loose-typed CSV row handling shared by the camera, drone, and weather
//! pipelines. Cells are typed by shape: integer, then float, then string;
//! empty cells become JSON null.

use std::collections::HashSet;
use std::io::Read;

use serde_json::{Map, Value};

use fsx_common::error::Result;

pub(crate) fn cell_value(raw: &str) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(raw.to_string())
}

/// Read CSV rows into JSON maps. Pandas artifact columns (`Unnamed: 0` index
/// dumps) are dropped.
pub(crate) fn read_rows<R: Read>(reader: R) -> Result<Vec<Map<String, Value>>> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let mut row = Map::new();
        for (i, header) in headers.iter().enumerate() {
            if header.starts_with("Unnamed") {
                continue;
            }
            let raw = record.get(i).unwrap_or("");
            row.insert(header.clone(), cell_value(raw));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Replace nulls with `"NA"` in columns that hold strings anywhere, the way
/// object-dtype columns are published. Numeric columns keep their nulls.
pub(crate) fn fill_object_nulls(rows: &mut [Map<String, Value>]) {
    let mut object_columns: Vec<String> = Vec::new();
    for row in rows.iter() {
        for (column, value) in row.iter() {
            if value.is_string() && !object_columns.contains(column) {
                object_columns.push(column.clone());
            }
        }
    }
    for row in rows.iter_mut() {
        for column in &object_columns {
            if let Some(value) = row.get_mut(column) {
                if value.is_null() {
                    *value = Value::String("NA".to_string());
                }
            }
        }
    }
}

/// Give every row an `id` of `{plant_name}_{scan_date}`, falling back to
/// `fallback` (the sensor name) for rows with no usable plant name. Repeated
/// ids within a batch get the row index appended so re-uploading the same
/// file replaces documents instead of duplicating them.
pub(crate) fn assign_row_ids(rows: &mut [Map<String, Value>], fallback: &str) {
    let mut seen = HashSet::new();
    for (index, row) in rows.iter_mut().enumerate() {
        let name = match row.get("plant_name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() && name != "NA" => name,
            _ => fallback,
        };
        let scan_date = row
            .get("scan_date")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let base = format!("{name}_{scan_date}");
        let id = if seen.insert(base.clone()) {
            base
        } else {
            format!("{base}_{index}")
        };
        row.insert("id".to_string(), Value::String(id));
    }
}
