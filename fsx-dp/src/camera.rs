//! stereoTop / FLIR IR camera CSV normalization
//!
//! Camera exports are clustering CSVs with one row per detected plant. Every
//! source column survives into the output document; normalization renames
//! `date` to `scan_date`, canonicalizes the timestamp, applies the per-sensor
//! null fills the published seasons carry, and stamps provenance plus the
//! season context parsed from the file's path.

use std::io::Read;

use serde_json::{json, Map, Value};
use tracing::debug;

use fsx_common::error::{Error, Result};
use fsx_common::record::SensorKind;
use fsx_common::scan_date::normalize_sensor_timestamp;

use crate::scan_path::CameraCsvPath;
use crate::table::{assign_row_ids, read_rows};

/// Parse a camera clustering CSV into index-ready documents.
///
/// `info` is the season context from [`crate::scan_path::parse_camera_csv_path`];
/// `file_path` is the logical data-grid path stamped onto every row.
pub fn parse_camera_csv<R: Read>(
    reader: R,
    sensor: SensorKind,
    file_path: &str,
    file_size: u64,
    info: &CameraCsvPath,
) -> Result<Vec<Map<String, Value>>> {
    let mut rows = read_rows(reader)?;
    if rows
        .first()
        .is_some_and(|row| !row.contains_key("date") && !row.contains_key("scan_date"))
    {
        return Err(Error::InvalidInput(format!(
            "{file_path}: no date column in camera CSV"
        )));
    }

    for row in &mut rows {
        // Pandas index dump columns carry no data
        row.retain(|key, _| key != "index" && !key.starts_with("index"));

        if let Some(date) = row.remove("date") {
            row.insert("scan_date".to_string(), date);
        }
        let raw = row
            .get("scan_date")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Timestamp(format!("{file_path}: empty scan_date cell")))?;
        let canonical = normalize_sensor_timestamp(raw)?;
        row.insert("scan_date".to_string(), Value::String(canonical));

        row.insert("sensor".to_string(), json!(sensor.as_str()));

        if sensor == SensorKind::FlirIrCamera {
            fill_flir_nulls(row);
        }

        // Geo point object for map queries, when the row has coordinates
        if let (Some(lat), Some(lon)) = (row.get("lat").cloned(), row.get("lon").cloned()) {
            if !lat.is_null() && !lon.is_null() {
                row.insert("loc".to_string(), json!({"lat": lat, "lon": lon}));
            }
        }

        row.insert("file_path".to_string(), json!(file_path));
        row.insert("file_size".to_string(), json!(file_size));
        row.insert("season".to_string(), json!(info.season.season));
        row.insert("crop_type".to_string(), json!(info.season.crop_type));
        row.insert("year".to_string(), json!(info.year));
        row.insert("level".to_string(), json!(info.season.level));
        row.insert("instrument".to_string(), json!(info.season.instrument));
    }
    assign_row_ids(&mut rows, sensor.as_str());

    debug!(rows = rows.len(), sensor = %sensor, "camera CSV normalized");
    Ok(rows)
}

/// FLIR rows carry sparse plant assignments; the published convention fills
/// `plant_name` and genotype columns with `"NA"` and missing temperatures
/// with 0.
fn fill_flir_nulls(row: &mut Map<String, Value>) {
    for column in ["plant_name", "genotype_x", "genotype_y"] {
        if let Some(value) = row.get_mut(column) {
            if value.is_null() {
                *value = Value::String("NA".to_string());
            }
        }
    }
    if let Some(value) = row.get_mut("roi_temp") {
        if value.is_null() {
            *value = json!(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_path::SeasonPath;

    fn stereo_info() -> CameraCsvPath {
        CameraCsvPath {
            season: SeasonPath {
                season: 11,
                crop_type: "sorghum".to_string(),
                level: 3,
                instrument: "stereoTop".to_string(),
            },
            year: 2020,
        }
    }

    fn flir_info() -> CameraCsvPath {
        CameraCsvPath {
            season: SeasonPath {
                season: 11,
                crop_type: "sorghum".to_string(),
                level: 3,
                instrument: "flirIrCamera".to_string(),
            },
            year: 2020,
        }
    }

    #[test]
    fn stereo_rows_keep_columns_and_gain_context() {
        let csv = "Unnamed: 0,index,date,plant_name,lat,lon,bounding_area_m2\n\
                   0,0,2020-06-01__10-12-13-456,Iceberg_205,33.07,-111.97,0.25\n";
        let rows = parse_camera_csv(
            csv.as_bytes(),
            SensorKind::StereoTop,
            "/staged/season_11_sorghum_yr_2020/level_3/stereoTop/season_11_clustering.csv",
            1234,
            &stereo_info(),
        )
        .unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert!(row.get("Unnamed: 0").is_none());
        assert!(row.get("index").is_none());
        assert!(row.get("date").is_none());
        assert_eq!(row["scan_date"], json!("20200601T101213.456-0700"));
        assert_eq!(row["id"], json!("Iceberg_205_20200601T101213.456-0700"));
        assert_eq!(row["sensor"], json!("stereoTop"));
        assert_eq!(row["plant_name"], json!("Iceberg_205"));
        assert_eq!(row["bounding_area_m2"], json!(0.25));
        assert_eq!(row["loc"], json!({"lat": 33.07, "lon": -111.97}));
        assert_eq!(row["season"], json!(11));
        assert_eq!(row["year"], json!(2020));
        assert_eq!(row["instrument"], json!("stereoTop"));
        assert_eq!(row["file_size"], json!(1234));
    }

    #[test]
    fn flir_fills_are_applied() {
        let csv = "date,plant_name,roi_temp,genotype_x,lat,lon\n\
                   2020-06-01,,,PI_329311,33.07,-111.97\n";
        let rows = parse_camera_csv(
            csv.as_bytes(),
            SensorKind::FlirIrCamera,
            "/staged/season_11_sorghum_yr_2020/level_3/flirIrCamera/season_11_clustering.csv",
            99,
            &flir_info(),
        )
        .unwrap();

        let row = &rows[0];
        assert_eq!(row["plant_name"], json!("NA"));
        assert_eq!(row["roi_temp"], json!(0));
        assert_eq!(row["genotype_x"], json!("PI_329311"));
        assert!(row.get("genotype_y").is_none());
        // Bare date resolves to midnight
        assert_eq!(row["scan_date"], json!("20200601T000000.000-0700"));
        assert_eq!(row["sensor"], json!("flir_ir_camera"));
    }

    #[test]
    fn stereo_rows_keep_nulls_unfilled() {
        let csv = "date,plant_name,bounding_area_m2\n2020-06-01,,\n";
        let rows = parse_camera_csv(
            csv.as_bytes(),
            SensorKind::StereoTop,
            "/staged/path.csv",
            0,
            &stereo_info(),
        )
        .unwrap();
        assert!(rows[0]["plant_name"].is_null());
        assert!(rows[0]["bounding_area_m2"].is_null());
        // No coordinates, no loc object
        assert!(rows[0].get("loc").is_none());
    }

    #[test]
    fn unassigned_rows_get_sensor_ids_unique_within_the_file() {
        let csv = "date,plant_name,roi_temp\n\
                   2020-06-01__10-12-13-456,,24.1\n\
                   2020-06-01__10-12-13-456,,25.3\n";
        let rows = parse_camera_csv(
            csv.as_bytes(),
            SensorKind::FlirIrCamera,
            "/staged/path.csv",
            0,
            &flir_info(),
        )
        .unwrap();
        // "NA" plant names do not make an id; the sensor name stands in
        assert_eq!(rows[0]["id"], json!("flir_ir_camera_20200601T101213.456-0700"));
        assert_eq!(rows[1]["id"], json!("flir_ir_camera_20200601T101213.456-0700_1"));

        let doc = Value::Object(rows[0].clone());
        assert_eq!(
            fsx_common::doc_id_of(&doc),
            Some("flir_ir_camera_20200601T101213.456-0700")
        );
    }

    #[test]
    fn missing_date_column_is_an_error() {
        let csv = "plant_name,lat,lon\nIceberg_205,33.07,-111.97\n";
        let err = parse_camera_csv(
            csv.as_bytes(),
            SensorKind::StereoTop,
            "/staged/path.csv",
            0,
            &stereo_info(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn unparseable_timestamp_fails_the_file() {
        let csv = "date,plant_name\nnot-a-date,Iceberg_205\n";
        let err = parse_camera_csv(
            csv.as_bytes(),
            SensorKind::StereoTop,
            "/staged/path.csv",
            0,
            &stereo_info(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Timestamp(_)));
    }
}
