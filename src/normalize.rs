//! Result normalization
//!
//! Engine values are turned into plain cells in two pure stages:
//! literal normalization per cell, then row assembly against the header.
//! Decimals become numbers, dates become `YYYY-MM-DD` and timestamps become
//! `YYYY-MM-DD HH:MM:SS` in UTC. Rows are never added or dropped and column
//! order is kept.

use crate::database::{RawResult, RawValue};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// A plain, presentation-ready value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Number(f64),
    Text(String),
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// Row-oriented result table with named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when there are no rows to show
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}

/// Normalize a raw result into a table.
///
/// A missing result, or one without columns and rows, is an empty table.
pub fn normalize(raw: Option<&RawResult>) -> Result<Table> {
    let Some(raw) = raw else {
        return Ok(Table::empty());
    };
    if raw.columns.is_empty() && raw.rows.iter().all(Vec::is_empty) {
        return Ok(Table::empty());
    }

    let width = raw.columns.len();
    let mut rows = Vec::with_capacity(raw.rows.len());
    for (i, row) in raw.rows.iter().enumerate() {
        if row.len() != width {
            return Err(Error::Normalization(format!(
                "row {} has {} values but the result has {} columns",
                i + 1,
                row.len(),
                width
            )));
        }
        rows.push(row.iter().map(normalize_value).collect::<Result<Vec<_>>>()?);
    }

    Ok(Table {
        columns: raw.columns.clone(),
        rows,
    })
}

/// Literal normalization of a single engine value
pub fn normalize_value(value: &RawValue) -> Result<Cell> {
    Ok(match value {
        RawValue::Null => Cell::Null,
        RawValue::Integer(i) => Cell::Integer(*i),
        RawValue::Real(f) => Cell::Number(*f),
        RawValue::Text(s) => normalize_text(s),
        RawValue::Blob(bytes) => Cell::Text(format!(
            "x'{}'",
            bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()
        )),
        RawValue::Decimal(s) => Cell::Number(parse_decimal(s)?),
        RawValue::Date(s) => Cell::Text(canonical_date(s)?),
        RawValue::Timestamp(s) => Cell::Text(canonical_timestamp(s)?),
    })
}

fn decimal_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Decimal\('([-+]?\d+(?:\.\d+)?)'\)$").unwrap())
}

fn date_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^datetime\.date\((\d{4}),\s*(\d{1,2}),\s*(\d{1,2})\)$").unwrap())
}

fn datetime_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^datetime\.datetime\((\d{4}),\s*(\d{1,2}),\s*(\d{1,2}),\s*(\d{1,2}),\s*(\d{1,2})(?:,\s*(\d{1,2}))?(?:,\s*\d{1,6})?(?:,\s*tzinfo=datetime\.timezone\.utc)?\)$",
        )
        .unwrap()
    })
}

fn iso_date_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})").unwrap())
}

/// Recognise constructor-style literal encodings inside text; anything else
/// is kept verbatim.
pub fn normalize_text(text: &str) -> Cell {
    let trimmed = text.trim();

    if let Some(caps) = decimal_literal().captures(trimmed) {
        if let Ok(n) = caps[1].parse::<f64>() {
            return Cell::Number(n);
        }
    }

    if let Some(caps) = date_literal().captures(trimmed) {
        if let Some(date) = ymd(&caps[1], &caps[2], &caps[3]) {
            return Cell::Text(date.format("%Y-%m-%d").to_string());
        }
    }

    if let Some(caps) = datetime_literal().captures(trimmed) {
        let second = caps.get(6).map(|m| m.as_str()).unwrap_or("0");
        let parsed = ymd(&caps[1], &caps[2], &caps[3]).and_then(|date| {
            date.and_hms_opt(
                caps[4].parse().ok()?,
                caps[5].parse().ok()?,
                second.parse().ok()?,
            )
        });
        if let Some(ts) = parsed {
            return Cell::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }

    Cell::Text(text.to_string())
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn parse_decimal(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    let inner = decimal_literal()
        .captures(trimmed)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| trimmed.to_string());
    inner
        .parse::<f64>()
        .map_err(|_| Error::Normalization(format!("not a decimal value: {:?}", text)))
}

/// `YYYY-MM-DD` for a date literal (a trailing time part is ignored)
pub fn canonical_date(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if let Cell::Text(s) = normalize_text(trimmed) {
        if s != trimmed {
            return Ok(s[..10].to_string());
        }
    }

    iso_date_prefix()
        .captures(trimmed)
        .and_then(|caps| ymd(&caps[1], &caps[2], &caps[3]))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .ok_or_else(|| Error::Normalization(format!("not a date value: {:?}", text)))
}

/// `YYYY-MM-DD HH:MM:SS` in UTC for a timestamp literal.
///
/// Values with an offset are converted; values without one are taken as UTC.
pub fn canonical_timestamp(text: &str) -> Result<String> {
    const OUT: &str = "%Y-%m-%d %H:%M:%S";
    let trimmed = text.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc).format(OUT).to_string());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%#z"] {
        if let Ok(ts) = DateTime::parse_from_str(trimmed, fmt) {
            return Ok(ts.with_timezone(&Utc).format(OUT).to_string());
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(ts.and_utc().format(OUT).to_string());
        }
    }
    if let Cell::Text(s) = normalize_text(trimmed) {
        if s != trimmed {
            return Ok(if s.len() == 10 { format!("{} 00:00:00", s) } else { s });
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(format!("{} 00:00:00", date.format("%Y-%m-%d")));
    }

    Err(Error::Normalization(format!("not a timestamp value: {:?}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(columns: &[&str], rows: Vec<Vec<RawValue>>) -> RawResult {
        RawResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn test_missing_result_is_empty_table() {
        let table = normalize(None).unwrap();
        assert!(table.is_empty());
        assert!(table.columns.is_empty());

        let table = normalize(Some(&RawResult::default())).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_decimal_literal_becomes_number() {
        assert_eq!(normalize_text("Decimal('12.50')"), Cell::Number(12.50));
        assert_eq!(normalize_value(&RawValue::Decimal("12.50".into())).unwrap(), Cell::Number(12.5));
        assert_eq!(normalize_value(&RawValue::Decimal("Decimal('-3')".into())).unwrap(), Cell::Number(-3.0));
        assert!(normalize_value(&RawValue::Decimal("abc".into())).is_err());
    }

    #[test]
    fn test_date_literals() {
        assert_eq!(normalize_text("datetime.date(2024, 3, 1)"), Cell::Text("2024-03-01".into()));
        assert_eq!(canonical_date("2024-3-1").unwrap(), "2024-03-01");
        assert_eq!(canonical_date("2024/03/01").unwrap(), "2024-03-01");
        assert_eq!(canonical_date("2024-03-01 12:00:00").unwrap(), "2024-03-01");
        assert_eq!(canonical_date("datetime.date(2024, 3, 1)").unwrap(), "2024-03-01");
        assert!(canonical_date("yesterday").is_err());
        assert!(canonical_date("2024-02-30").is_err());
    }

    #[test]
    fn test_datetime_literals() {
        assert_eq!(
            normalize_text("datetime.datetime(2024, 3, 1, 9, 5, 7, tzinfo=datetime.timezone.utc)"),
            Cell::Text("2024-03-01 09:05:07".into())
        );
        assert_eq!(
            normalize_text("datetime.datetime(2024, 3, 1, 9, 5, tzinfo=datetime.timezone.utc)"),
            Cell::Text("2024-03-01 09:05:00".into())
        );
    }

    #[test]
    fn test_timestamps_are_utc() {
        assert_eq!(canonical_timestamp("2024-03-01T09:05:07+08:00").unwrap(), "2024-03-01 01:05:07");
        assert_eq!(canonical_timestamp("2024-03-01 09:05:07+08:00").unwrap(), "2024-03-01 01:05:07");
        assert_eq!(canonical_timestamp("2024-03-01T09:05:07Z").unwrap(), "2024-03-01 09:05:07");
        assert_eq!(canonical_timestamp("2024-03-01 09:05").unwrap(), "2024-03-01 09:05:00");
        assert_eq!(canonical_timestamp("2024-03-01 09:05:07.250").unwrap(), "2024-03-01 09:05:07");
        assert_eq!(canonical_timestamp("2024-03-01").unwrap(), "2024-03-01 00:00:00");
        assert!(canonical_timestamp("noon").is_err());
    }

    #[test]
    fn test_plain_text_is_untouched() {
        assert_eq!(normalize_text("Decimal"), Cell::Text("Decimal".into()));
        assert_eq!(normalize_text("2024-03-01"), Cell::Text("2024-03-01".into()));
        assert_eq!(normalize_text(" 飲料 "), Cell::Text(" 飲料 ".into()));
    }

    #[test]
    fn test_normalize_keeps_rows_and_column_order() {
        let result = raw(
            &["類別", "平均銷售額", "日期"],
            vec![
                vec![RawValue::Text("飲料".into()), RawValue::Decimal("12.50".into()), RawValue::Date("2024-3-1".into())],
                vec![RawValue::Text("零食".into()), RawValue::Real(18.625), RawValue::Null],
                vec![RawValue::Text("零食".into()), RawValue::Real(18.625), RawValue::Null],
            ],
        );

        let table = normalize(Some(&result)).unwrap();
        assert_eq!(table.columns, vec!["類別", "平均銷售額", "日期"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows[0], vec![Cell::Text("飲料".into()), Cell::Number(12.5), Cell::Text("2024-03-01".into())]);
        assert_eq!(table.rows[1], table.rows[2]);
        assert_eq!(
            table.column("平均銷售額").unwrap(),
            vec![&Cell::Number(12.5), &Cell::Number(18.625), &Cell::Number(18.625)]
        );
    }

    #[test]
    fn test_columns_without_rows() {
        let table = normalize(Some(&raw(&["a"], vec![]))).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns, vec!["a"]);
    }

    #[test]
    fn test_ragged_row_is_error() {
        let result = raw(&["a", "b"], vec![vec![RawValue::Integer(1)]]);
        assert!(matches!(normalize(Some(&result)), Err(Error::Normalization(_))));
    }

    #[test]
    fn test_blob_rendered_as_hex() {
        assert_eq!(normalize_value(&RawValue::Blob(vec![0xde, 0xad])).unwrap(), Cell::Text("x'dead'".into()));
    }

    #[test]
    fn test_cells_serialize_plainly() {
        let row = vec![Cell::Null, Cell::Integer(2), Cell::Number(1.5), Cell::Text("x".into())];
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"[null,2,1.5,"x"]"#);
    }
}
