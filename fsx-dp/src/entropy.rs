//! 3D scanner entropy tar processing
//!
//! A scan produces one tar of per-plant volume entropy CSVs, named like
//! `scan_dir/Big_Kahuna_112_3_volumes_entropy.csv`. The CSV contents are not
//! read; what matters is the plant name encoded in the member name, plus the
//! member size for storage accounting. Each plant CSV joins against the
//! fieldbook to produce one canonical [`ScanRecord`].

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use fsx_common::error::{Error, Result};
use fsx_common::record::{ScanRecord, SensorKind};
use fsx_common::scan_date::format_scan_date;

use crate::fieldbook::Fieldbook;
use crate::scan_path::{parse_scan_tar_path, ScanTarPath};

/// Genotype stem of a plant member name: the path component before the
/// trailing replicate digits.
static GENOTYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(.+?)_+[0-9]+$").expect("valid regex"));

/// Canonical record keys. Fieldbook extras that would collide with one of
/// these are dropped instead of flattened into the document.
const RESERVED_KEYS: &[&str] = &[
    "id",
    "sensor",
    "plant_name",
    "genotype",
    "season",
    "crop_type",
    "year_of_planting",
    "level",
    "instrument",
    "scan_date",
    "field",
    "experiment",
    "species",
    "accession",
    "fb_entry_id",
    "seed_src_id",
    "treat",
    "rep",
    "range",
    "row",
    "column",
    "plot",
    "fb_type",
    "fieldbook_file_path",
    "fieldbook_file_size",
    "entropy_file_name",
    "entropy_file_size",
];

/// List `(member name, size)` pairs of an entropy tar.
pub fn list_tar_members(tar_path: &Path) -> Result<Vec<(String, u64)>> {
    let file = File::open(tar_path)?;
    let mut archive = tar::Archive::new(file);
    let mut members = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        members.push((name, entry.header().size()?));
    }
    if members.is_empty() {
        return Err(Error::Archive(format!(
            "{} has no members",
            tar_path.display()
        )));
    }
    Ok(members)
}

/// Process one entropy tar: parse its path for season context, list its
/// members, and join each plant CSV against the fieldbook.
pub fn process_scan_tar(tar_path: &Path, fieldbook: &Fieldbook) -> Result<Vec<ScanRecord>> {
    let parsed = parse_scan_tar_path(&tar_path.to_string_lossy())?;
    let members = list_tar_members(tar_path)?;
    debug!(tar = %tar_path.display(), members = members.len(), "entropy tar read");
    Ok(build_records(&parsed, &members, fieldbook))
}

/// Join tar members against the fieldbook. Non-CSV members are ignored and
/// plants without a fieldbook entry are skipped with a warning, mirroring how
/// partial scans are handled in the field.
pub fn build_records(
    parsed: &ScanTarPath,
    members: &[(String, u64)],
    fieldbook: &Fieldbook,
) -> Vec<ScanRecord> {
    let scan_date = format_scan_date(parsed.timestamp);
    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut null_fields: BTreeSet<&'static str> = BTreeSet::new();

    for (name, size) in members {
        if !name.ends_with(".csv") {
            continue;
        }
        let stem = match name.strip_suffix("_volumes_entropy.csv") {
            Some(stem) => stem,
            None => name.strip_suffix(".csv").unwrap_or(name),
        };
        let plant_name = stem.split('/').nth(1).unwrap_or(stem);
        let genotype = GENOTYPE
            .captures(stem)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| plant_name.to_string());

        let key = fieldbook.scan_key(plant_name);
        let Some(entry) = fieldbook.lookup(&key) else {
            warn!(plant = plant_name, key = %key, "not found in fieldbook, ignoring plant");
            skipped += 1;
            continue;
        };

        let mut extra = Map::new();
        for (column, value) in &entry.extra {
            if RESERVED_KEYS.contains(&column.as_str()) {
                warn!(column = %column, "fieldbook column collides with a canonical key, dropped");
                continue;
            }
            extra.insert(column.clone(), Value::String(value.clone()));
        }

        let record = ScanRecord {
            id: format!("{plant_name}_{scan_date}"),
            sensor: SensorKind::Scanner3dTop,
            plant_name: plant_name.to_string(),
            genotype,
            season: parsed.season.season,
            crop_type: parsed.season.crop_type.clone(),
            year_of_planting: entry.year,
            level: parsed.season.level,
            instrument: parsed.season.instrument.clone(),
            scan_date: scan_date.clone(),
            field: entry.field.clone(),
            experiment: entry.experiment.clone(),
            species: entry.species.clone(),
            accession: entry.accession.clone(),
            fb_entry_id: entry.entry_id.clone(),
            seed_src_id: entry.seed_source_id.clone(),
            treat: entry.treatment.clone(),
            rep: entry.rep,
            range: entry.range,
            row: entry.row,
            column: entry.column,
            plot: entry.plot,
            fb_type: entry.entry_type.clone(),
            fieldbook_file_path: fieldbook.file_path.clone(),
            fieldbook_file_size: fieldbook.file_size,
            entropy_file_name: name.clone(),
            entropy_file_size: *size,
            extra,
        };
        null_fields.extend(record.null_fields());
        records.push(record);
    }

    if skipped > 0 {
        warn!(skipped, "plants had no fieldbook entry");
    }
    if !null_fields.is_empty() {
        info!(fields = ?null_fields, "canonical fields without a fieldbook column this season");
    }
    records
}

/// Locate entropy tars under a season scan directory. Each scan date is a
/// subdirectory holding `individual_plants_out/<dir>_3d_volumes_entropy_v009.tar`;
/// other export versions keep the `volumes_entropy` stem, so matching is by
/// name rather than by exact version.
pub fn find_scan_tars(scan_dir: &Path) -> Result<Vec<PathBuf>> {
    if !scan_dir.is_dir() {
        return Err(Error::NotFound(format!(
            "scan directory {}",
            scan_dir.display()
        )));
    }
    let mut tars = Vec::new();
    for entry in WalkDir::new(scan_dir).max_depth(3) {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                let in_plants_out = entry
                    .path()
                    .parent()
                    .and_then(Path::file_name)
                    .is_some_and(|d| d == "individual_plants_out");
                if in_plants_out && name.ends_with(".tar") && name.contains("volumes_entropy") {
                    tars.push(entry.path().to_path_buf());
                }
            }
            Err(e) => {
                warn!("error walking scan directory: {e}");
            }
        }
    }
    tars.sort();
    if tars.is_empty() {
        warn!(dir = %scan_dir.display(), "no entropy tars found");
    }
    Ok(tars)
}
