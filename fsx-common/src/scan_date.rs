//! Canonical scan timestamp handling
//!
//! Each sensor export writes timestamps in its own shape. The index stores a
//! single canonical form, `YYYYMMDDThhmmss.SSS-0700` (for example
//! `20220505T195541.328-0700`). The field site runs on fixed UTC-7 all year
//! (Arizona observes no daylight saving), so the offset is a constant rather
//! than a zone lookup.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Fixed UTC-7 suffix carried by every canonical scan_date.
pub const UTC_OFFSET_SUFFIX: &str = "-0700";

const CANONICAL_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";
const GANTRY_FORMAT: &str = "%Y-%m-%d__%H-%M-%S-%3f";

/// Gantry timestamp embedded in a larger token, e.g.
/// `west-2022-05-05__19-55-41-328_sorghum`.
static GANTRY_EMBEDDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}__\d{2}-\d{2}-\d{2}-\d{3}").expect("valid regex")
});

/// Format a naive local timestamp in the canonical index form.
pub fn format_scan_date(ts: NaiveDateTime) -> String {
    format!("{}{}", ts.format(CANONICAL_FORMAT), UTC_OFFSET_SUFFIX)
}

/// Canonical midnight timestamp for a bare calendar date.
pub fn format_scan_day(day: NaiveDate) -> String {
    format_scan_date(day.and_time(NaiveTime::MIN))
}

/// Parse a canonical scan_date back into its local timestamp.
pub fn parse_scan_date(s: &str) -> Result<NaiveDateTime> {
    DateTime::<FixedOffset>::parse_from_str(s, "%Y%m%dT%H%M%S%.3f%z")
        .map(|dt| dt.naive_local())
        .map_err(|_| Error::Timestamp(s.to_string()))
}

/// Local calendar day of a canonical scan_date. Weather alignment joins on
/// this value.
pub fn calendar_day(s: &str) -> Result<NaiveDate> {
    parse_scan_date(s).map(|ts| ts.date())
}

/// Normalize the timestamp cell of a sensor CSV to a local timestamp.
///
/// Gantry exports write `2022-05-05__19-55-41-328`, sometimes wrapped in
/// direction or crop tokens. Clustering extracts write plain dates or
/// `YYYY-MM-DD HH:MM:SS`. Bare dates resolve to midnight.
pub fn parse_sensor_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();

    if let Some(m) = GANTRY_EMBEDDED.find(raw) {
        if let Ok(ts) = NaiveDateTime::parse_from_str(m.as_str(), GANTRY_FORMAT) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(ts);
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day.and_time(NaiveTime::MIN));
    }
    Err(Error::Timestamp(raw.to_string()))
}

/// Normalize a sensor timestamp straight to the canonical index form.
pub fn normalize_sensor_timestamp(raw: &str) -> Result<String> {
    parse_sensor_timestamp(raw).map(format_scan_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_canonical_scan_date() {
        let ts = NaiveDate::from_ymd_opt(2022, 5, 5)
            .unwrap()
            .and_hms_milli_opt(19, 55, 41, 328)
            .unwrap();
        assert_eq!(format_scan_date(ts), "20220505T195541.328-0700");
    }

    #[test]
    fn bare_date_formats_as_midnight() {
        let day = NaiveDate::from_ymd_opt(2020, 1, 29).unwrap();
        assert_eq!(format_scan_day(day), "20200129T000000.000-0700");
    }

    #[test]
    fn parses_canonical_scan_date() {
        let ts = parse_scan_date("20220505T195541.328-0700").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2022, 5, 5).unwrap());
        assert_eq!(format_scan_date(ts), "20220505T195541.328-0700");
    }

    #[test]
    fn calendar_day_strips_time() {
        let day = calendar_day("20220505T195541.328-0700").unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2022, 5, 5).unwrap());
    }

    #[test]
    fn parses_plain_gantry_timestamp() {
        let ts = parse_sensor_timestamp("2022-05-05__19-55-41-328").unwrap();
        assert_eq!(format_scan_date(ts), "20220505T195541.328-0700");
    }

    #[test]
    fn parses_gantry_timestamp_with_crop_suffix() {
        let ts = parse_sensor_timestamp("2022-05-05__19-55-41-328_sorghum").unwrap();
        assert_eq!(format_scan_date(ts), "20220505T195541.328-0700");
    }

    #[test]
    fn parses_gantry_timestamp_with_direction_prefix() {
        let ts = parse_sensor_timestamp("west-2022-05-05__19-55-41-328").unwrap();
        assert_eq!(format_scan_date(ts), "20220505T195541.328-0700");
    }

    #[test]
    fn parses_space_separated_datetime() {
        let ts = parse_sensor_timestamp("2022-05-05 19:55:41").unwrap();
        assert_eq!(format_scan_date(ts), "20220505T195541.000-0700");
    }

    #[test]
    fn parses_bare_date_to_midnight() {
        let ts = parse_sensor_timestamp("2022-05-05").unwrap();
        assert_eq!(format_scan_date(ts), "20220505T000000.000-0700");
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(parse_sensor_timestamp("not a date").is_err());
    }
}
