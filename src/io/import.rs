//! CSV import of the historical series.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;
use tracing::debug;

use crate::error::Error;
use crate::series::{Observation, ObservedSeries};

/// Errors raised while loading an observed series.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("input has no column named \"{0}\"")]
    MissingColumn(String),

    #[error("line {line}: cannot parse \"{value}\" as a date")]
    InvalidDate { line: u64, value: String },

    #[error("line {line}: cannot parse \"{value}\" as a number")]
    InvalidValue { line: u64, value: String },

    #[error(transparent)]
    Series(#[from] Error),
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Cells treated as missing and dropped.
const MISSING: &[&str] = &["", "NA", "NaN", "nan", "null"];

/// Parses a date or date-time cell.
pub fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(cell, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(cell, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Loads a series from a CSV file.
///
/// # Errors
///
/// See [`read_series`].
pub fn load_series(path: &Path, date_column: &str, value_column: &str) -> Result<ObservedSeries, ImportError> {
    let file = File::open(path)?;
    read_series(file, date_column, value_column)
}

/// Reads a series from CSV with a header row, selecting columns by name.
///
/// Rows with a missing value are dropped; the rest are sorted by timestamp.
///
/// # Errors
///
/// * `MissingColumn` when a named column is absent
/// * `InvalidDate` / `InvalidValue` for unparseable cells
/// * `Series` when the rows do not form a valid series (e.g. duplicates)
pub fn read_series(reader: impl Read, date_column: &str, value_column: &str) -> Result<ObservedSeries, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ImportError::MissingColumn(name.to_string()))
    };
    let date_idx = position(date_column)?;
    let value_idx = position(value_column)?;

    let mut observations = Vec::new();
    let mut dropped = 0_usize;
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);
        let date_cell = record.get(date_idx).unwrap_or("");
        let value_cell = record.get(value_idx).unwrap_or("");

        if MISSING.contains(&value_cell) {
            dropped += 1;
            continue;
        }
        let timestamp = parse_timestamp(date_cell).ok_or_else(|| ImportError::InvalidDate {
            line,
            value: date_cell.to_string(),
        })?;
        let value: f64 = value_cell.parse().map_err(|_| ImportError::InvalidValue {
            line,
            value: value_cell.to_string(),
        })?;
        observations.push(Observation { timestamp, value });
    }

    observations.sort_by_key(|o| o.timestamp);
    debug!(rows = observations.len(), dropped, "loaded observed series");
    Ok(ObservedSeries::new(observations)?)
}
