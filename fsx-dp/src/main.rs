//! fsx-dp - Data preparation pipeline driver
//!
//! One subcommand per sensor export format. Each run normalizes staged input
//! files into index-ready JSON arrays under the output directory, optionally
//! enriched with AZMET weather observations, for `fsx-ix upload`.
//!
//! Staged files do not always keep their data-grid layout; `--grid-path`
//! supplies the logical remote path when the local one lacks the
//! `season_*/level_*` segments.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing::info;

use fsx_common::record::SensorKind;
use fsx_common::scan_date::format_scan_date;

use fsx_dp::azmet::AzmetTable;
use fsx_dp::camera::parse_camera_csv;
use fsx_dp::drone::{build_records as build_drone_records, extract_tgi_csv, find_tgi_tars};
use fsx_dp::entropy::{build_records as build_scan_records, find_scan_tars, list_tar_members};
use fsx_dp::fieldbook::{Fieldbook, FieldbookKeying};
use fsx_dp::output::write_docs;
use fsx_dp::scan_path::{parse_camera_csv_path, parse_drone_tar_path, parse_scan_tar_path};

#[derive(Parser, Debug)]
#[command(name = "fsx-dp")]
#[command(about = "Normalize staged sensor exports into index-ready JSON")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KeyingArg {
    PlantName,
    AccessionPlot,
}

impl From<KeyingArg> for FieldbookKeying {
    fn from(arg: KeyingArg) -> Self {
        match arg {
            KeyingArg::PlantName => FieldbookKeying::PlantName,
            KeyingArg::AccessionPlot => FieldbookKeying::AccessionPlot,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process 3D scanner entropy tars against a fieldbook
    Scanner3d {
        /// Fieldbook CSV for the season
        #[arg(long)]
        fieldbook: PathBuf,
        /// A single entropy tar
        #[arg(long, conflicts_with = "scan_dir")]
        archive: Option<PathBuf>,
        /// Season directory to walk for entropy tars
        #[arg(long)]
        scan_dir: Option<PathBuf>,
        /// Force the fieldbook keying generation instead of detecting it
        #[arg(long, value_enum)]
        keying: Option<KeyingArg>,
        /// AZMET extract to join by calendar day
        #[arg(long)]
        azmet: Option<PathBuf>,
        /// Logical data-grid path of the archive (single-archive runs only)
        #[arg(long)]
        grid_path: Option<String>,
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
    /// Process a stereoTop clustering CSV
    StereoTop {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        azmet: Option<PathBuf>,
        /// Logical data-grid path of the CSV
        #[arg(long)]
        grid_path: Option<String>,
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
    /// Process a FLIR IR camera clustering CSV
    Flir {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        azmet: Option<PathBuf>,
        /// Logical data-grid path of the CSV
        #[arg(long)]
        grid_path: Option<String>,
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
    /// Process drone TGI tars
    Drone {
        /// A single TGI tar
        #[arg(long, conflicts_with = "scan_dir")]
        tar: Option<PathBuf>,
        /// Flight directory to walk for TGI tars
        #[arg(long)]
        scan_dir: Option<PathBuf>,
        #[arg(long)]
        azmet: Option<PathBuf>,
        /// Logical data-grid path of the tar (single-tar runs only)
        #[arg(long)]
        grid_path: Option<String>,
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
    /// Convert an AZMET extract to JSON without joining scans
    Azmet {
        /// Raw .ext station extract
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "azmet_output")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Scanner3d {
            fieldbook,
            archive,
            scan_dir,
            keying,
            azmet,
            grid_path,
            out,
        } => run_scanner3d(
            &fieldbook,
            archive,
            scan_dir,
            keying.map(Into::into),
            azmet,
            grid_path,
            &out,
        ),
        Command::StereoTop {
            csv,
            azmet,
            grid_path,
            out,
        } => run_camera(SensorKind::StereoTop, &csv, azmet, grid_path, &out),
        Command::Flir {
            csv,
            azmet,
            grid_path,
            out,
        } => run_camera(SensorKind::FlirIrCamera, &csv, azmet, grid_path, &out),
        Command::Drone {
            tar,
            scan_dir,
            azmet,
            grid_path,
            out,
        } => run_drone(tar, scan_dir, azmet, grid_path, &out),
        Command::Azmet { input, out } => run_azmet(&input, &out),
    }
}

fn load_azmet(path: Option<PathBuf>) -> Result<Option<AzmetTable>> {
    match path {
        Some(path) => {
            let table = AzmetTable::from_path(&path)
                .with_context(|| format!("reading AZMET extract {}", path.display()))?;
            info!(days = table.len(), "AZMET table loaded");
            Ok(Some(table))
        }
        None => Ok(None),
    }
}

/// Resolve the path used for layout parsing: the logical grid path when
/// given, the local path otherwise.
fn logical_path(local: &Path, grid_path: Option<&str>) -> String {
    match grid_path {
        Some(grid) => grid.to_string(),
        None => local.to_string_lossy().into_owned(),
    }
}

fn run_scanner3d(
    fieldbook_path: &Path,
    archive: Option<PathBuf>,
    scan_dir: Option<PathBuf>,
    keying: Option<FieldbookKeying>,
    azmet: Option<PathBuf>,
    grid_path: Option<String>,
    out: &Path,
) -> Result<()> {
    let fieldbook = Fieldbook::from_csv_path(fieldbook_path, keying)
        .with_context(|| format!("reading fieldbook {}", fieldbook_path.display()))?;
    info!(entries = fieldbook.len(), "fieldbook loaded");
    let azmet = load_azmet(azmet)?;

    let tars = match (archive, scan_dir) {
        (Some(archive), _) => vec![archive],
        (None, Some(scan_dir)) => find_scan_tars(&scan_dir)?,
        (None, None) => bail!("either --archive or --scan-dir is required"),
    };
    if grid_path.is_some() && tars.len() > 1 {
        bail!("--grid-path applies to single-archive runs only");
    }

    for tar in &tars {
        let logical = logical_path(tar, grid_path.as_deref());
        let parsed = parse_scan_tar_path(&logical)?;
        let members =
            list_tar_members(tar).with_context(|| format!("reading {}", tar.display()))?;
        let records = build_scan_records(&parsed, &members, &fieldbook);
        info!(tar = %tar.display(), records = records.len(), "entropy tar processed");

        let values = records
            .iter()
            .map(|r| r.to_value())
            .collect::<fsx_common::Result<Vec<_>>>()?;
        let mut docs = to_docs(values);
        if let Some(table) = &azmet {
            table.enrich(&mut docs);
        }
        let scan_date = format_scan_date(parsed.timestamp);
        write_docs(
            &docs,
            &out.join("scanner3DTop"),
            &format!("combined_plants_info_{scan_date}"),
        )?;
    }
    Ok(())
}

fn run_camera(
    sensor: SensorKind,
    csv: &Path,
    azmet: Option<PathBuf>,
    grid_path: Option<String>,
    out: &Path,
) -> Result<()> {
    let azmet = load_azmet(azmet)?;
    let logical = logical_path(csv, grid_path.as_deref());
    let info = parse_camera_csv_path(&logical)?;
    let file_size = std::fs::metadata(csv)?.len();
    let file = std::fs::File::open(csv)
        .with_context(|| format!("opening camera CSV {}", csv.display()))?;

    let mut docs = parse_camera_csv(file, sensor, &logical, file_size, &info)?;
    info!(rows = docs.len(), sensor = %sensor, "camera CSV processed");
    if let Some(table) = &azmet {
        table.enrich(&mut docs);
    }
    write_docs(
        &docs,
        &out.join(sensor.as_str()),
        &format!(
            "{}_{}_{}_{}",
            sensor, info.season.season, info.season.crop_type, info.season.level
        ),
    )?;
    Ok(())
}

fn run_drone(
    tar: Option<PathBuf>,
    scan_dir: Option<PathBuf>,
    azmet: Option<PathBuf>,
    grid_path: Option<String>,
    out: &Path,
) -> Result<()> {
    let azmet = load_azmet(azmet)?;
    let tars = match (tar, scan_dir) {
        (Some(tar), _) => vec![tar],
        (None, Some(scan_dir)) => find_tgi_tars(&scan_dir)?,
        (None, None) => bail!("either --tar or --scan-dir is required"),
    };
    if grid_path.is_some() && tars.len() > 1 {
        bail!("--grid-path applies to single-tar runs only");
    }

    for tar in &tars {
        let logical = logical_path(tar, grid_path.as_deref());
        let parsed = parse_drone_tar_path(&logical)?;
        let csv = extract_tgi_csv(tar).with_context(|| format!("reading {}", tar.display()))?;
        let mut docs = build_drone_records(&csv, &parsed)?;
        info!(tar = %tar.display(), rows = docs.len(), "TGI tar processed");
        if let Some(table) = &azmet {
            table.enrich(&mut docs);
        }
        let stem = tar
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "drone".to_string());
        write_docs(&docs, &out.join("drone"), &stem)?;
    }
    Ok(())
}

fn run_azmet(input: &Path, out: &Path) -> Result<()> {
    let table = AzmetTable::from_path(input)
        .with_context(|| format!("reading AZMET extract {}", input.display()))?;
    let docs = table.to_docs();
    let year = docs
        .first()
        .and_then(|doc| doc.get("year"))
        .and_then(Value::as_i64)
        .context("AZMET table has no rows")?;
    write_docs(&docs, out, &year.to_string())?;
    Ok(())
}

/// Unwrap serialized records into JSON objects for enrichment and output.
fn to_docs(values: Vec<Value>) -> Vec<Map<String, Value>> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}
