//! Drone TGI tar processing
//!
//! Each drone flight publishes a tar with a single TGI extraction CSV inside
//! (`tgi_extraction_out/<name>.csv`). Rows are plot summaries rather than
//! individual plants; the genotype is derived from the accession and plot
//! rather than joined through a fieldbook, and the flight metadata comes from
//! the tar's data-grid path.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use walkdir::WalkDir;

use fsx_common::error::{Error, Result};
use fsx_common::record::SensorKind;
use fsx_common::scan_date::format_scan_day;

use crate::scan_path::DroneTarPath;
use crate::table::{assign_row_ids, fill_object_nulls, read_rows};

/// The CSV member of a TGI tar: contents, member name, member size.
#[derive(Debug)]
pub struct TgiCsv {
    pub data: Vec<u8>,
    pub member_name: String,
    pub member_size: u64,
}

/// Pull the first CSV member out of a TGI tar.
pub fn extract_tgi_csv(tar_path: &Path) -> Result<TgiCsv> {
    let file = File::open(tar_path)?;
    let mut archive = tar::Archive::new(file);
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        if !name.ends_with(".csv") {
            continue;
        }
        let size = entry.header().size()?;
        let mut data = Vec::with_capacity(size as usize);
        entry.read_to_end(&mut data)?;
        debug!(tar = %tar_path.display(), member = %name, size, "TGI CSV extracted");
        return Ok(TgiCsv {
            data,
            member_name: name,
            member_size: size,
        });
    }
    Err(Error::Archive(format!(
        "{} has no CSV member",
        tar_path.display()
    )))
}

/// Normalize TGI rows into index-ready documents.
pub fn build_records(csv: &TgiCsv, parsed: &DroneTarPath) -> Result<Vec<Map<String, Value>>> {
    let mut rows = read_rows(csv.data.as_slice())?;
    fill_object_nulls(&mut rows);
    let scan_date = format_scan_day(parsed.scan_day);

    for row in rows.iter_mut() {
        // Replicate cells are blank for unreplicated plots
        match row.get_mut("rep") {
            Some(value) if value.is_null() => *value = json!(0),
            _ => {}
        }

        // Drone rows have no plant names; the genotype key is accession_plot,
        // the same shape accession-keyed fieldbooks use
        let accession = row.get("accession").and_then(Value::as_str).unwrap_or("NA");
        let plot = row.get("plot").cloned().unwrap_or(Value::Null);
        let genotype = format!(
            "{}_{}",
            accession.trim().split_whitespace().collect::<Vec<_>>().join("_"),
            plot_token(&plot)
        );
        row.insert("genotype".to_string(), Value::String(genotype));

        row.insert("sensor".to_string(), json!(SensorKind::Drone.as_str()));
        row.insert("season".to_string(), json!(parsed.season.season));
        row.insert("crop_type".to_string(), json!(parsed.season.crop_type));
        row.insert("year".to_string(), json!(parsed.year));
        row.insert("level".to_string(), json!(parsed.season.level));
        row.insert("instrument".to_string(), json!(parsed.season.instrument));
        row.insert("scan_date".to_string(), json!(scan_date));
        row.insert("gantry_location".to_string(), json!(parsed.gantry_location));
        row.insert("drone_type".to_string(), json!(parsed.drone_type));
        row.insert("altitude_m".to_string(), json!(parsed.altitude_m));
        row.insert("camera_type".to_string(), json!(parsed.camera_type));
        row.insert("file_path".to_string(), json!(csv.member_name));
        row.insert("file_size".to_string(), json!(csv.member_size));
    }
    assign_row_ids(&mut rows, SensorKind::Drone.as_str());
    Ok(rows)
}

fn plot_token(plot: &Value) -> String {
    match plot {
        Value::Null => "NA".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collect TGI tars under a flight directory tree.
pub fn find_tgi_tars(parent_dir: &Path) -> Result<Vec<PathBuf>> {
    if !parent_dir.is_dir() {
        return Err(Error::NotFound(format!(
            "flight directory {}",
            parent_dir.display()
        )));
    }
    let mut tars = Vec::new();
    for entry in WalkDir::new(parent_dir) {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                if name.ends_with(".tar") && name.contains("tgi") {
                    tars.push(entry.path().to_path_buf());
                }
            }
            Err(e) => {
                warn!("error walking flight directory: {e}");
            }
        }
    }
    tars.sort();
    if tars.is_empty() {
        warn!(dir = %parent_dir.display(), "no TGI tars found");
    }
    Ok(tars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::scan_path::SeasonPath;

    fn parsed_path() -> DroneTarPath {
        DroneTarPath {
            season: SeasonPath {
                season: 14,
                crop_type: "sorghum".to_string(),
                level: 2,
                instrument: "drone".to_string(),
            },
            year: 2022,
            scan_day: NaiveDate::from_ymd_opt(2022, 6, 2).unwrap(),
            gantry_location: "North".to_string(),
            drone_type: "P4".to_string(),
            altitude_m: 30,
            camera_type: "RGB".to_string(),
        }
    }

    fn tgi_csv(content: &str) -> TgiCsv {
        TgiCsv {
            data: content.as_bytes().to_vec(),
            member_name: "tgi_extraction_out/2022-06-02_sorghum_tgi.csv".to_string(),
            member_size: content.len() as u64,
        }
    }

    #[test]
    fn builds_documents_with_flight_metadata() {
        let csv = tgi_csv(
            "Unnamed: 0,accession,plot,rep,mean_tgi,q1_tgi,q3_tgi\n\
             0,Big Kahuna,112,1,0.41,0.30,0.52\n",
        );
        let rows = build_records(&csv, &parsed_path()).unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row["genotype"], json!("Big_Kahuna_112"));
        assert_eq!(row["id"], json!("drone_20220602T000000.000-0700"));
        assert_eq!(row["sensor"], json!("drone"));
        assert_eq!(row["season"], json!(14));
        assert_eq!(row["year"], json!(2022));
        assert_eq!(row["scan_date"], json!("20220602T000000.000-0700"));
        assert_eq!(row["gantry_location"], json!("North"));
        assert_eq!(row["drone_type"], json!("P4"));
        assert_eq!(row["altitude_m"], json!(30));
        assert_eq!(row["camera_type"], json!("RGB"));
        assert_eq!(row["file_path"], json!("tgi_extraction_out/2022-06-02_sorghum_tgi.csv"));
        assert_eq!(row["mean_tgi"], json!(0.41));
        assert!(row.get("Unnamed: 0").is_none());
    }

    #[test]
    fn fills_rep_and_string_nulls() {
        let csv = tgi_csv("accession,plot,rep,mean_tgi\nBig Kahuna,112,,\n,113,2,0.5\n");
        let rows = build_records(&csv, &parsed_path()).unwrap();
        assert_eq!(rows[0]["rep"], json!(0));
        // mean_tgi is numeric everywhere it appears, so its null survives
        assert!(rows[0]["mean_tgi"].is_null());
        assert_eq!(rows[1]["accession"], json!("NA"));
        assert_eq!(rows[1]["genotype"], json!("NA_113"));
        // Plot summaries share the flight timestamp; later rows get an
        // index suffix so every document keeps a distinct id
        assert_eq!(rows[0]["id"], json!("drone_20220602T000000.000-0700"));
        assert_eq!(rows[1]["id"], json!("drone_20220602T000000.000-0700_1"));
    }

    #[test]
    fn extracts_first_csv_member() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("2022-06-02_sorghum_tgi.tar");
        let content = b"accession,plot\nBig Kahuna,112\n";
        {
            let file = File::create(&tar_path).unwrap();
            let mut builder = tar::Builder::new(file);
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(
                    &mut header,
                    "tgi_extraction_out/2022-06-02_sorghum_tgi.csv",
                    content.as_slice(),
                )
                .unwrap();
            builder.finish().unwrap();
        }
        let csv = extract_tgi_csv(&tar_path).unwrap();
        assert_eq!(csv.member_name, "tgi_extraction_out/2022-06-02_sorghum_tgi.csv");
        assert_eq!(csv.member_size, content.len() as u64);
        assert_eq!(csv.data, content);
    }

    #[test]
    fn tar_without_csv_member_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tar_path = dir.path().join("empty_tgi.tar");
        {
            let file = File::create(&tar_path).unwrap();
            let mut builder = tar::Builder::new(file);
            let mut header = tar::Header::new_gnu();
            header.set_size(4);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "readme.txt", b"ok\n\n".as_slice())
                .unwrap();
            builder.finish().unwrap();
        }
        assert!(matches!(
            extract_tgi_csv(&tar_path).unwrap_err(),
            Error::Archive(_)
        ));
    }

    #[test]
    fn finds_tgi_tars_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let flight = dir.path().join("2022-06-02_Gantry_North_P4_30m_RGB");
        std::fs::create_dir_all(&flight).unwrap();
        let tgi = flight.join("2022-06-02_sorghum_tgi.tar");
        std::fs::write(&tgi, b"").unwrap();
        std::fs::write(flight.join("2022-06-02_sorghum_ortho.tar"), b"").unwrap();

        let tars = find_tgi_tars(dir.path()).unwrap();
        assert_eq!(tars, vec![tgi]);
    }
}
