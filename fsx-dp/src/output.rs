//! JSON output files
//!
//! Each pipeline run writes one pretty-printed JSON array per input file,
//! ready for `fsx-ix upload`. File stems follow the published layout:
//! `combined_plants_info_<scan_date>` for scanner tars,
//! `<sensor>_<season>_<crop>_<level>` for camera CSVs, the tar basename for
//! drone flights, and `azmet_output/<year>` for standalone weather
//! conversions.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::info;

use fsx_common::error::Result;

/// Write documents as a pretty-printed JSON array at
/// `<out_dir>/<file_stem>.json`, creating directories as needed.
pub fn write_docs(docs: &[Map<String, Value>], out_dir: &Path, file_stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{file_stem}.json"));
    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, docs)?;
    info!(docs = docs.len(), path = %path.display(), "documents written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_json_array_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("output").join("drone");
        let docs = vec![Map::from_iter([
            ("id".to_string(), json!("a_1")),
            ("mean_tgi".to_string(), json!(0.41)),
        ])];

        let path = write_docs(&docs, &out_dir, "2022-06-02_sorghum_tgi.tar").unwrap();
        assert_eq!(path, out_dir.join("2022-06-02_sorghum_tgi.tar.json"));

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["mean_tgi"], json!(0.41));
        // Pretty printed, one key per line
        assert!(content.contains('\n'));
    }

    #[test]
    fn empty_document_set_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_docs(&[], dir.path(), "empty").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap().trim(), "[]");
    }
}
