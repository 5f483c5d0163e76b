//! Fieldbook parsing
//!
//! A fieldbook is the per-season CSV of planting metadata that scans are
//! joined against. Two generations exist in the staged data:
//!
//! - older books carry a `plant_name` column and are keyed by the full plant
//!   name;
//! - newer books have no plant names and are keyed by `{accession}_{plot}`,
//!   which matches the plant name with its trailing replicate index removed.
//!
//! The generation is detected from the header row unless the caller forces
//! one. Duplicate keys keep the first row. In accession-keyed books missing
//! string cells are recorded as `"NA"`, which is how those seasons were
//! published; plant-name books leave them unset.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::warn;

use fsx_common::error::{Error, Result};

/// How fieldbook rows are keyed for plant lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldbookKeying {
    PlantName,
    AccessionPlot,
}

/// One fieldbook row, normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldbookEntry {
    pub year: Option<i64>,
    pub experiment: Option<String>,
    pub field: Option<String>,
    pub treatment: Option<String>,
    /// Replicate number; empty cells count as replicate 0.
    pub rep: i64,
    pub range: Option<i64>,
    pub row: Option<i64>,
    pub column: Option<i64>,
    pub plot: Option<i64>,
    /// The fieldbook `type` column (entry, border, filler, ...).
    pub entry_type: Option<String>,
    pub genotype: Option<String>,
    pub species: Option<String>,
    pub accession: Option<String>,
    pub entry_id: Option<String>,
    pub seed_source_id: Option<String>,
    /// Season-specific columns with no canonical slot, e.g.
    /// `replicated_in_2020`.
    pub extra: BTreeMap<String, String>,
}

/// A parsed fieldbook: the key table plus file metadata stamped onto every
/// record built from it.
#[derive(Debug, Clone)]
pub struct Fieldbook {
    pub keying: FieldbookKeying,
    pub file_path: String,
    pub file_size: u64,
    entries: HashMap<String, FieldbookEntry>,
}

/// Columns with a typed slot on [`FieldbookEntry`]; everything else goes to
/// `extra`.
const KNOWN_COLUMNS: &[&str] = &[
    "year",
    "experiment",
    "field",
    "treatment",
    "rep",
    "range",
    "row",
    "column",
    "plot",
    "type",
    "genotype",
    "species",
    "accession",
    "entry_id",
    "seed-sourceid",
    "plant_name",
];

impl Fieldbook {
    /// Parse a fieldbook CSV. When `keying` is `None` the generation is
    /// detected from the header row.
    pub fn from_csv_path(path: &Path, keying: Option<FieldbookKeying>) -> Result<Self> {
        let file_size = std::fs::metadata(path)?.len();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let index_of: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), i))
            .collect();

        let keying = match keying {
            Some(keying) => keying,
            None => detect_keying(&index_of, path)?,
        };

        let mut entries: HashMap<String, FieldbookEntry> = HashMap::new();
        for (row_number, result) in reader.records().enumerate() {
            let record = result?;
            let cell = |name: &str| -> Option<&str> {
                index_of
                    .get(name)
                    .and_then(|&i| record.get(i))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };

            let Some(key) = row_key(keying, &cell)? else {
                warn!(row = row_number + 2, path = %path.display(), "fieldbook row has no usable key, skipping");
                continue;
            };

            let mut entry = FieldbookEntry {
                year: parse_int("year", cell("year"))?,
                experiment: string_cell(keying, cell("experiment")),
                field: string_cell(keying, cell("field")),
                treatment: string_cell(keying, cell("treatment")),
                rep: parse_int("rep", cell("rep"))?.unwrap_or(0),
                range: parse_int("range", cell("range"))?,
                row: parse_int("row", cell("row"))?,
                column: parse_int("column", cell("column"))?,
                plot: parse_int("plot", cell("plot"))?,
                entry_type: string_cell(keying, cell("type")),
                genotype: string_cell(keying, cell("genotype")),
                species: string_cell(keying, cell("species")),
                accession: string_cell(keying, cell("accession")),
                entry_id: string_cell(keying, cell("entry_id")),
                seed_source_id: string_cell(keying, cell("seed-sourceid")),
                extra: BTreeMap::new(),
            };
            for (i, header) in headers.iter().enumerate() {
                if KNOWN_COLUMNS.contains(&header.as_str()) {
                    continue;
                }
                let value = record.get(i).map(str::trim).filter(|s| !s.is_empty());
                match (value, keying) {
                    (Some(value), _) => {
                        entry.extra.insert(header.clone(), value.to_string());
                    }
                    (None, FieldbookKeying::AccessionPlot) => {
                        entry.extra.insert(header.clone(), "NA".to_string());
                    }
                    (None, FieldbookKeying::PlantName) => {}
                }
            }

            if entries.contains_key(&key) {
                warn!(key = %key, "duplicate fieldbook key, keeping first occurrence");
                continue;
            }
            entries.insert(key, entry);
        }

        if entries.is_empty() {
            return Err(Error::Fieldbook(format!(
                "no usable rows in {}",
                path.display()
            )));
        }

        Ok(Self {
            keying,
            file_path: path.to_string_lossy().into_owned(),
            file_size,
            entries,
        })
    }

    pub fn lookup(&self, key: &str) -> Option<&FieldbookEntry> {
        self.entries.get(key)
    }

    /// Lookup key for a scanned plant name. Plant-name books join on the
    /// name as-is; accession books join on the name with its trailing
    /// replicate index removed.
    pub fn scan_key(&self, plant_name: &str) -> String {
        match self.keying {
            FieldbookKeying::PlantName => plant_name.to_string(),
            FieldbookKeying::AccessionPlot => plant_name
                .rsplit_once('_')
                .map(|(head, _)| head.to_string())
                .unwrap_or_else(|| plant_name.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn detect_keying(index_of: &HashMap<&str, usize>, path: &Path) -> Result<FieldbookKeying> {
    if index_of.contains_key("plant_name") {
        Ok(FieldbookKeying::PlantName)
    } else if index_of.contains_key("accession") && index_of.contains_key("plot") {
        Ok(FieldbookKeying::AccessionPlot)
    } else {
        Err(Error::Fieldbook(format!(
            "{}: found neither a plant_name column nor accession/plot columns",
            path.display()
        )))
    }
}

fn row_key<'a, F>(keying: FieldbookKeying, cell: &F) -> Result<Option<String>>
where
    F: Fn(&str) -> Option<&'a str>,
{
    match keying {
        FieldbookKeying::PlantName => Ok(cell("plant_name").map(str::to_string)),
        FieldbookKeying::AccessionPlot => {
            let Some(accession) = cell("accession") else {
                return Ok(None);
            };
            let Some(plot) = parse_int("plot", cell("plot"))? else {
                return Ok(None);
            };
            Ok(Some(format!("{accession}_{plot}").trim().replace(' ', "_")))
        }
    }
}

/// Missing string cells become `"NA"` in accession-keyed books, matching how
/// those seasons were published; plant-name books leave them unset.
fn string_cell(keying: FieldbookKeying, value: Option<&str>) -> Option<String> {
    match (value, keying) {
        (Some(value), _) => Some(value.to_string()),
        (None, FieldbookKeying::AccessionPlot) => Some("NA".to_string()),
        (None, FieldbookKeying::PlantName) => None,
    }
}

/// Integer cells occasionally surface as floats (`"2020.0"`) after pandas
/// round trips; accept both. Anything else is a corrupted book and fails
/// the load, naming the offending column and cell.
fn parse_int(column: &str, value: Option<&str>) -> Result<Option<i64>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if let Ok(n) = value.parse::<i64>() {
        return Ok(Some(n));
    }
    if let Ok(f) = value.parse::<f64>() {
        return Ok(Some(f as i64));
    }
    Err(Error::Fieldbook(format!(
        "non-numeric {column} cell: {value:?}"
    )))
}
