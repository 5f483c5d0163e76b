//! AZMET weather extracts and calendar-day enrichment
//!
//! AZMET publishes daily station reports as `.ext` files: comma-separated
//! lines of 28 values in a fixed column order, surrounded by preamble and the
//! occasional truncated line. Data lines start with a 4-digit year. Parsed
//! reports form a `(year, day_of_year)` table that scan documents join
//! against by their local calendar day; matched observations land on the
//! document as `azmet_`-prefixed fields.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use fsx_common::error::{Error, Result};
use fsx_common::scan_date::calendar_day;

/// Observation columns of a daily report, in file order, after the
/// `year,day_of_year,station_number` prefix.
pub const OBSERVATION_COLUMNS: &[&str] = &[
    "air_temp_max",
    "air_temp_min",
    "air_temp_mean",
    "rh_max",
    "rh_min",
    "rh_mean",
    "vpd_mean",
    "solar_radiation_total",
    "precipitation_total",
    "soil_temp_4in_max",
    "soil_temp_4in_min",
    "soil_temp_4in_mean",
    "soil_temp_20in_max",
    "soil_temp_20in_min",
    "soil_temp_20in_mean",
    "wind_speed_mean",
    "wind_vector_magnitude",
    "wind_vector_direction",
    "wind_direction_std_dev",
    "max_wind_speed",
    "heat_units",
    "eto_reference",
    "etos_reference",
    "actual_vapor_pressure_mean",
    "dewpoint_mean",
];

const COLUMN_COUNT: usize = 3 + 25;

/// One station-day of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct AzmetDaily {
    pub year: i32,
    pub day_of_year: u32,
    pub station_number: i64,
    /// Values in [`OBSERVATION_COLUMNS`] order.
    pub observations: Vec<f64>,
}

impl AzmetDaily {
    /// The report as a JSON object, column names included.
    pub fn to_doc(&self) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert("year".to_string(), json!(self.year));
        doc.insert("day_of_year".to_string(), json!(self.day_of_year));
        doc.insert("station_number".to_string(), json!(self.station_number));
        for (name, value) in OBSERVATION_COLUMNS.iter().zip(&self.observations) {
            doc.insert((*name).to_string(), json!(value));
        }
        doc
    }
}

/// Daily reports keyed by `(year, day_of_year)`.
#[derive(Debug, Default)]
pub struct AzmetTable {
    days: HashMap<(i32, u32), AzmetDaily>,
}

impl AzmetTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a raw extract. Non-data lines are skipped silently; data lines
    /// that are short or carry non-numeric cells are skipped with a warning,
    /// since raw exports routinely truncate.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut days = HashMap::new();
        for (line_number, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if !is_data_line(line) {
                continue;
            }
            let values: Vec<&str> = line.split(',').map(str::trim).collect();
            if values.len() < COLUMN_COUNT {
                warn!(
                    line = line_number + 1,
                    cells = values.len(),
                    "short AZMET data line, skipping"
                );
                continue;
            }
            match parse_daily(&values) {
                Ok(daily) => {
                    days.insert((daily.year, daily.day_of_year), daily);
                }
                Err(e) => {
                    warn!(line = line_number + 1, "unusable AZMET data line ({e}), skipping");
                }
            }
        }
        if days.is_empty() {
            return Err(Error::InvalidInput(
                "no AZMET data lines in extract".to_string(),
            ));
        }
        Ok(Self { days })
    }

    pub fn get(&self, year: i32, day_of_year: u32) -> Option<&AzmetDaily> {
        self.days.get(&(year, day_of_year))
    }

    pub fn for_date(&self, date: NaiveDate) -> Option<&AzmetDaily> {
        self.get(date.year(), date.ordinal())
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// All reports as JSON objects, ordered by day.
    pub fn to_docs(&self) -> Vec<Map<String, Value>> {
        let mut keys: Vec<&(i32, u32)> = self.days.keys().collect();
        keys.sort();
        keys.iter().map(|key| self.days[key].to_doc()).collect()
    }

    /// Join weather onto scan documents by local calendar day. Documents
    /// whose day has no report are left untouched. Returns `(enriched,
    /// missed)` counts.
    pub fn enrich(&self, docs: &mut [Map<String, Value>]) -> (usize, usize) {
        let mut enriched = 0usize;
        let mut missed = 0usize;
        for doc in docs.iter_mut() {
            let day = doc
                .get("scan_date")
                .and_then(Value::as_str)
                .and_then(|s| calendar_day(s).ok());
            let Some(daily) = day.and_then(|day| self.for_date(day)) else {
                missed += 1;
                continue;
            };
            doc.insert("azmet_station_number".to_string(), json!(daily.station_number));
            for (name, value) in OBSERVATION_COLUMNS.iter().zip(&daily.observations) {
                doc.insert(format!("azmet_{name}"), json!(value));
            }
            enriched += 1;
        }
        if missed > 0 {
            warn!(missed, "scan documents had no AZMET report for their day");
        }
        info!(enriched, "scan documents enriched with AZMET observations");
        (enriched, missed)
    }
}

/// Data lines start with a 4-digit year followed by a comma.
fn is_data_line(line: &str) -> bool {
    let mut chars = line.chars();
    for _ in 0..4 {
        if !chars.next().is_some_and(|c| c.is_ascii_digit()) {
            return false;
        }
    }
    chars.next() == Some(',')
}

fn parse_daily(values: &[&str]) -> Result<AzmetDaily> {
    let number = |i: usize| -> Result<f64> {
        values[i]
            .parse()
            .map_err(|_| Error::InvalidInput(format!("column {}: {:?}", i + 1, values[i])))
    };
    let year = number(0)? as i32;
    let day_of_year = number(1)? as u32;
    let station_number = number(2)? as i64;
    let mut observations = Vec::with_capacity(OBSERVATION_COLUMNS.len());
    for i in 3..COLUMN_COUNT {
        observations.push(number(i)?);
    }
    Ok(AzmetDaily {
        year,
        day_of_year,
        station_number,
        observations,
    })
}
