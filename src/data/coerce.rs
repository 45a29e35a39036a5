use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::model::CellValue;

/// The typed interpretations a raw cell can be coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Number,
    Date,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Number => write!(f, "number"),
            ValueKind::Date => write!(f, "date"),
        }
    }
}

// Month-first before day-first, the same preference spreadsheet exports use.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// Best-effort numeric reading of a cell. NaN counts as unparseable.
pub fn to_number(value: &CellValue) -> Option<f64> {
    let n = match value {
        CellValue::Number(n) => *n,
        CellValue::String(s) => s.trim().parse::<f64>().ok()?,
        CellValue::Date(_) | CellValue::Missing => return None,
    };
    (!n.is_nan()).then_some(n)
}

/// Best-effort calendar-date reading of a cell. Any time of day is dropped.
pub fn to_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Date(d) => Some(*d),
        CellValue::String(s) => parse_date(s),
        CellValue::Number(_) | CellValue::Missing => None,
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(d) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(d);
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.date());
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

/// Guess the type of a raw text cell (CSV fields, CLI arguments).
pub fn guess(s: &str) -> CellValue {
    if s.trim().is_empty() {
        return CellValue::Missing;
    }
    match s.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::String(s.to_string()),
    }
}

/// Serials beyond this many days from the epoch are not calendar dates.
const MAX_EXCEL_SERIAL: f64 = 3_000_000.0;

/// Convert an Excel serial day number (1900 date system) to a date.
/// Serials with no representable date give `None`.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial.abs() >= MAX_EXCEL_SERIAL {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(chrono::TimeDelta::try_days(serial.floor() as i64)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn numbers_from_text_and_cells() {
        assert_eq!(to_number(&CellValue::Number(2.5)), Some(2.5));
        assert_eq!(to_number(&CellValue::from(" 100 ")), Some(100.0));
        assert_eq!(to_number(&CellValue::from("1e3")), Some(1000.0));
        assert_eq!(to_number(&CellValue::from("bad")), None);
        assert_eq!(to_number(&CellValue::from("NaN")), None);
        assert_eq!(to_number(&CellValue::from("")), None);
        assert_eq!(to_number(&CellValue::Date(date(2024, 1, 1))), None);
        assert_eq!(to_number(&CellValue::Missing), None);
    }

    #[test]
    fn dates_in_common_sheet_formats() {
        assert_eq!(parse_date("2024-03-05"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024/03/05"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("03/05/2024"), Some(date(2024, 3, 5)));
        // day-first only when month-first is impossible
        assert_eq!(parse_date("25/03/2024"), Some(date(2024, 3, 25)));
        assert_eq!(parse_date("2024-03-05 17:45:00"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T23:10:00+02:00"), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("pending"), None);
        assert_eq!(parse_date("  "), None);
    }

    #[test]
    fn numbers_never_read_as_dates() {
        assert_eq!(to_date(&CellValue::Number(45000.0)), None);
    }

    #[test]
    fn guess_prefers_numbers() {
        assert_eq!(guess("12"), CellValue::Number(12.0));
        assert_eq!(guess("RESUELTO"), CellValue::from("RESUELTO"));
        assert_eq!(guess(""), CellValue::Missing);
        assert_eq!(guess("inf"), CellValue::from("inf"));
    }

    #[test]
    fn excel_serials() {
        assert_eq!(excel_serial_to_date(45352.0), Some(date(2024, 3, 1)));
        assert_eq!(excel_serial_to_date(45352.75), Some(date(2024, 3, 1)));
        assert_eq!(excel_serial_to_date(f64::NAN), None);
        assert_eq!(excel_serial_to_date(1e300), None);
        assert_eq!(excel_serial_to_date(-1e300), None);
        assert!(excel_serial_to_date(2_999_999.0).is_some());
        assert_eq!(excel_serial_to_date(3_000_000.0), None);
    }
}
