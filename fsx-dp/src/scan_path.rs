//! Season layout path parsing
//!
//! Staged sensor exports live under a fixed directory scheme:
//!
//! ```text
//! .../season_14_sorghum_yr_2022/level_2/scanner3DTop/sorghum/
//!     2022-05-05__19-55-41-328_sorghum/individual_plants_out/
//!     2022-05-05__19-55-41-328_sorghum_3d_volumes_entropy_v009.tar
//! ```
//!
//! Season number, crop, processing level, and instrument come out of the
//! path; scanner tars also carry the scan timestamp (or just a date, which
//! resolves to midnight), and drone tars carry flight metadata.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use fsx_common::error::{Error, Result};

static SCAN_TAR_TIMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/season_([0-9]+)_([a-zA-Z]+)_yr_[0-9]+/level_([0-9]+)/([^/]+)/[^w]+?/([0-9]{4})-([0-9]{2})-([0-9]{2})__([0-9]{2})-([0-9]{2})-([0-9]{2})-([0-9]{3})",
    )
    .expect("valid regex")
});

static SCAN_TAR_DATELESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/season_([0-9]+)_([a-zA-Z]+)_yr_[0-9]+/level_([0-9]+)/([^/]+)/[^w]+?/([0-9]{4})-([0-9]{2})-([0-9]{2})",
    )
    .expect("valid regex")
});

static CAMERA_CSV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/season_([0-9]+)_([a-zA-Z]+)_yr_([0-9]+)/level_([0-9]+)/([^/]+)/[^w]+?")
        .expect("valid regex")
});

static DRONE_TAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"season_([0-9]+)_(\w+)_yr_([0-9]+)/level_([0-9]+)/(\w+)/\w+/([0-9]{4})-([0-9]{2})-([0-9]{2})_Gantry_(North|South)_(P[0-9])_([0-9]+m)_(\w+)",
    )
    .expect("valid regex")
});

/// Season context common to every layout match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonPath {
    pub season: i64,
    pub crop_type: String,
    pub level: i64,
    pub instrument: String,
}

/// Parsed scanner tar path.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanTarPath {
    pub season: SeasonPath,
    /// Scan timestamp from the path; midnight when the layout only carries a
    /// date.
    pub timestamp: NaiveDateTime,
}

/// Parsed camera clustering CSV path.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraCsvPath {
    pub season: SeasonPath,
    /// Planting year from the season directory name.
    pub year: i64,
}

/// Parsed drone TGI tar path.
#[derive(Debug, Clone, PartialEq)]
pub struct DroneTarPath {
    pub season: SeasonPath,
    pub year: i64,
    pub scan_day: NaiveDate,
    pub gantry_location: String,
    pub drone_type: String,
    pub altitude_m: i64,
    pub camera_type: String,
}

fn cap_str(caps: &Captures<'_>, index: usize) -> String {
    caps.get(index).map_or(String::new(), |m| m.as_str().to_string())
}

fn cap_i64(caps: &Captures<'_>, index: usize, path: &str) -> Result<i64> {
    caps.get(index)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| Error::PathPattern(path.to_string()))
}

fn cap_u32(caps: &Captures<'_>, index: usize, path: &str) -> Result<u32> {
    caps.get(index)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| Error::PathPattern(path.to_string()))
}

fn cap_date(caps: &Captures<'_>, first: usize, path: &str) -> Result<NaiveDate> {
    let year = cap_i64(caps, first, path)? as i32;
    let month = cap_u32(caps, first + 1, path)?;
    let day = cap_u32(caps, first + 2, path)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| Error::PathPattern(path.to_string()))
}

fn season_from(caps: &Captures<'_>, path: &str) -> Result<SeasonPath> {
    Ok(SeasonPath {
        season: cap_i64(caps, 1, path)?,
        crop_type: cap_str(caps, 2),
        level: cap_i64(caps, 3, path)?,
        instrument: cap_str(caps, 4),
    })
}

/// Parse a scanner tar path. The timed form is tried first, then the
/// date-only form.
pub fn parse_scan_tar_path(path: &str) -> Result<ScanTarPath> {
    if let Some(caps) = SCAN_TAR_TIMED.captures(path) {
        let date = cap_date(&caps, 5, path)?;
        let time = NaiveTime::from_hms_milli_opt(
            cap_u32(&caps, 8, path)?,
            cap_u32(&caps, 9, path)?,
            cap_u32(&caps, 10, path)?,
            cap_u32(&caps, 11, path)?,
        )
        .ok_or_else(|| Error::PathPattern(path.to_string()))?;
        return Ok(ScanTarPath {
            season: season_from(&caps, path)?,
            timestamp: date.and_time(time),
        });
    }
    if let Some(caps) = SCAN_TAR_DATELESS.captures(path) {
        let date = cap_date(&caps, 5, path)?;
        return Ok(ScanTarPath {
            season: season_from(&caps, path)?,
            timestamp: date.and_time(NaiveTime::MIN),
        });
    }
    Err(Error::PathPattern(path.to_string()))
}

/// Parse a camera clustering CSV path. Unlike the scanner form this carries
/// the planting year but no timestamp; timestamps come from the CSV rows.
pub fn parse_camera_csv_path(path: &str) -> Result<CameraCsvPath> {
    let caps = CAMERA_CSV
        .captures(path)
        .ok_or_else(|| Error::PathPattern(path.to_string()))?;
    Ok(CameraCsvPath {
        season: SeasonPath {
            season: cap_i64(&caps, 1, path)?,
            crop_type: cap_str(&caps, 2),
            level: cap_i64(&caps, 4, path)?,
            instrument: cap_str(&caps, 5),
        },
        year: cap_i64(&caps, 3, path)?,
    })
}

/// Parse a drone TGI tar path, including the flight metadata suffix.
pub fn parse_drone_tar_path(path: &str) -> Result<DroneTarPath> {
    let caps = DRONE_TAR
        .captures(path)
        .ok_or_else(|| Error::PathPattern(path.to_string()))?;
    let altitude = caps
        .get(11)
        .and_then(|m| m.as_str().trim_end_matches('m').parse().ok())
        .ok_or_else(|| Error::PathPattern(path.to_string()))?;
    Ok(DroneTarPath {
        season: SeasonPath {
            season: cap_i64(&caps, 1, path)?,
            crop_type: cap_str(&caps, 2),
            level: cap_i64(&caps, 4, path)?,
            instrument: cap_str(&caps, 5),
        },
        year: cap_i64(&caps, 3, path)?,
        scan_day: cap_date(&caps, 6, path)?,
        gantry_location: cap_str(&caps, 9),
        drone_type: cap_str(&caps, 10),
        altitude_m: altitude,
        camera_type: cap_str(&caps, 12),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsx_common::scan_date::format_scan_date;

    #[test]
    fn parses_timed_scanner_tar_path() {
        let path = "/staged/season_14_sorghum_yr_2022/level_2/scanner3DTop/sorghum/2022-05-05__19-55-41-328_sorghum/individual_plants_out/2022-05-05__19-55-41-328_sorghum_3d_volumes_entropy_v009.tar";
        let parsed = parse_scan_tar_path(path).unwrap();
        assert_eq!(parsed.season.season, 14);
        assert_eq!(parsed.season.crop_type, "sorghum");
        assert_eq!(parsed.season.level, 2);
        assert_eq!(parsed.season.instrument, "scanner3DTop");
        assert_eq!(format_scan_date(parsed.timestamp), "20220505T195541.328-0700");
    }

    #[test]
    fn parses_dateless_scanner_tar_path_as_midnight() {
        let path = "/staged/season_10_lettuce_yr_2020/level_3/scanner3DTop/2020-01-23/individual_plants_out/2020-01-23_3d_volumes_entropy_v009.tar";
        let parsed = parse_scan_tar_path(path).unwrap();
        assert_eq!(parsed.season.season, 10);
        assert_eq!(parsed.season.crop_type, "lettuce");
        assert_eq!(parsed.season.level, 3);
        assert_eq!(format_scan_date(parsed.timestamp), "20200123T000000.000-0700");
    }

    #[test]
    fn parses_camera_csv_path_with_year() {
        let path = "/staged/season_11_sorghum_yr_2020/level_3/stereoTop/season_11_clustering.csv";
        let parsed = parse_camera_csv_path(path).unwrap();
        assert_eq!(parsed.season.season, 11);
        assert_eq!(parsed.season.crop_type, "sorghum");
        assert_eq!(parsed.year, 2020);
        assert_eq!(parsed.season.level, 3);
        assert_eq!(parsed.season.instrument, "stereoTop");
    }

    #[test]
    fn parses_drone_tar_path_with_flight_metadata() {
        let path = "/staged/season_14_sorghum_yr_2022/level_2/drone/sorghum/2022-06-02_Gantry_North_P4_30m_RGB/2022-06-02_sorghum_tgi.tar";
        let parsed = parse_drone_tar_path(path).unwrap();
        assert_eq!(parsed.season.season, 14);
        assert_eq!(parsed.season.instrument, "drone");
        assert_eq!(parsed.year, 2022);
        assert_eq!(parsed.scan_day, NaiveDate::from_ymd_opt(2022, 6, 2).unwrap());
        assert_eq!(parsed.gantry_location, "North");
        assert_eq!(parsed.drone_type, "P4");
        assert_eq!(parsed.altitude_m, 30);
        assert_eq!(parsed.camera_type, "RGB");
    }

    #[test]
    fn rejects_path_outside_season_layout() {
        let err = parse_scan_tar_path("/tmp/some_random.tar").unwrap_err();
        assert!(matches!(err, Error::PathPattern(_)));
    }
}
