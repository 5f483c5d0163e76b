//! Canonical per-scan record schema
//!
//! The 3D scanner pipeline joins fieldbook metadata onto every plant scan and
//! emits one [`ScanRecord`] per plant. The camera and drone pipelines carry
//! whatever columns their source CSVs have, so those flow through the tools as
//! open `serde_json::Value` documents instead; [`doc_id_of`] is the shared way
//! to find a document id in either shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Sensor platforms whose exports feed the index.
///
/// Serialized values match the `sensor` tag stamped on index documents. Note
/// that this is distinct from the `instrument` field, which carries the raw
/// directory name from the staged season layout (`flirIrCamera` vs
/// `flir_ir_camera`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    #[serde(rename = "scanner3DTop")]
    Scanner3dTop,
    #[serde(rename = "stereoTop")]
    StereoTop,
    #[serde(rename = "flir_ir_camera")]
    FlirIrCamera,
    #[serde(rename = "drone")]
    Drone,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Scanner3dTop => "scanner3DTop",
            SensorKind::StereoTop => "stereoTop",
            SensorKind::FlirIrCamera => "flir_ir_camera",
            SensorKind::Drone => "drone",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scanner3DTop" => Ok(SensorKind::Scanner3dTop),
            "stereoTop" => Ok(SensorKind::StereoTop),
            "flir_ir_camera" => Ok(SensorKind::FlirIrCamera),
            "drone" => Ok(SensorKind::Drone),
            other => Err(Error::InvalidInput(format!("unknown sensor: {other}"))),
        }
    }
}

/// One plant scan joined with its fieldbook entry.
///
/// The schema is the union of the columns both fieldbook generations provide.
/// Fields the generation in use has no column for serialize as explicit
/// `null`, so every document carries the same keys and the index mapping stays
/// stable across seasons. Season-specific fieldbook columns (for example
/// `replicated_in_2020`) and weather enrichment land in `extra` and flatten
/// into the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Deterministic document id, `{plant_name}_{scan_date}`.
    pub id: String,
    pub sensor: SensorKind,
    pub plant_name: String,
    /// Genotype stem of the plant name (trailing replicate index stripped).
    pub genotype: String,
    pub season: i64,
    pub crop_type: String,
    pub year_of_planting: Option<i64>,
    pub level: i64,
    /// Instrument directory name from the season layout, e.g. `scanner3DTop`.
    pub instrument: String,
    /// Canonical scan timestamp, `YYYYMMDDThhmmss.SSS-0700`.
    pub scan_date: String,
    pub field: Option<String>,
    pub experiment: Option<String>,
    pub species: Option<String>,
    pub accession: Option<String>,
    pub fb_entry_id: Option<String>,
    pub seed_src_id: Option<String>,
    pub treat: Option<String>,
    pub rep: i64,
    pub range: Option<i64>,
    pub row: Option<i64>,
    pub column: Option<i64>,
    pub plot: Option<i64>,
    pub fb_type: Option<String>,
    pub fieldbook_file_path: String,
    pub fieldbook_file_size: u64,
    pub entropy_file_name: String,
    pub entropy_file_size: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScanRecord {
    pub fn doc_id(&self) -> &str {
        &self.id
    }

    /// Names of the canonical fields this record has no value for. The
    /// pipeline logs these per scan so missing fieldbook columns are visible.
    pub fn null_fields(&self) -> Vec<&'static str> {
        let mut nulls = Vec::new();
        if self.year_of_planting.is_none() {
            nulls.push("year_of_planting");
        }
        if self.field.is_none() {
            nulls.push("field");
        }
        if self.experiment.is_none() {
            nulls.push("experiment");
        }
        if self.species.is_none() {
            nulls.push("species");
        }
        if self.accession.is_none() {
            nulls.push("accession");
        }
        if self.fb_entry_id.is_none() {
            nulls.push("fb_entry_id");
        }
        if self.seed_src_id.is_none() {
            nulls.push("seed_src_id");
        }
        if self.treat.is_none() {
            nulls.push("treat");
        }
        if self.range.is_none() {
            nulls.push("range");
        }
        if self.row.is_none() {
            nulls.push("row");
        }
        if self.column.is_none() {
            nulls.push("column");
        }
        if self.plot.is_none() {
            nulls.push("plot");
        }
        if self.fb_type.is_none() {
            nulls.push("fb_type");
        }
        nulls
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Document id of an index-ready JSON document, when it carries one.
///
/// Scanner records always do; camera and drone rows do not, and index without
/// an explicit id.
pub fn doc_id_of(doc: &Value) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}
