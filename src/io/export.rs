//! CSV export of simulated replicates.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use chrono::NaiveTime;

use crate::sim::types::SimulatedSeries;

/// Column header of the simulated-series CSV.
const HEADER: &str = "date,value,id";

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exports replicates to a CSV file at the given path.
///
/// Writes a header row followed by one row per simulated value, replicate
/// by replicate. Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(replicates: &[SimulatedSeries], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(replicates, buf)
}

/// Writes replicates as CSV to any writer.
///
/// Timestamps are written as plain dates when every record falls on
/// midnight, and as full date-times otherwise.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(replicates: &[SimulatedSeries], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(','))?;

    let daily = replicates
        .iter()
        .flat_map(|s| &s.records)
        .all(|r| r.timestamp.time() == NaiveTime::MIN);
    let format = if daily { DATE_FORMAT } else { DATETIME_FORMAT };

    for series in replicates {
        for r in &series.records {
            wtr.write_record(&[
                r.timestamp.format(format).to_string(),
                format!("{:.6}", r.value),
                r.id.to_string(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::SimulatedRecord;
    use chrono::{NaiveDate, TimeDelta};

    fn make_series(id: usize, n: usize, step: TimeDelta) -> SimulatedSeries {
        let start = NaiveDate::from_ymd_opt(2031, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SimulatedSeries {
            id,
            records: (0..n)
                .map(|i| SimulatedRecord {
                    timestamp: start + step * i as i32,
                    value: 100.0 + i as f64,
                    id,
                })
                .collect(),
        }
    }

    fn render(replicates: &[SimulatedSeries]) -> String {
        let mut buf = Vec::new();
        write_csv(replicates, &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }

    #[test]
    fn header_matches_schema() {
        let output = render(&[make_series(0, 1, TimeDelta::days(1))]);
        assert_eq!(output.lines().next(), Some("date,value,id"));
    }

    #[test]
    fn row_count_matches_record_count() {
        let output = render(&[
            make_series(0, 10, TimeDelta::days(1)),
            make_series(1, 10, TimeDelta::days(1)),
        ]);
        // 1 header + 20 data rows
        assert_eq!(output.lines().count(), 21);
    }

    #[test]
    fn daily_records_use_plain_dates() {
        let output = render(&[make_series(3, 2, TimeDelta::days(1))]);
        let rows: Vec<&str> = output.lines().skip(1).collect();
        assert_eq!(rows, vec!["2031-03-01,100.000000,3", "2031-03-02,101.000000,3"]);
    }

    #[test]
    fn hourly_records_keep_time() {
        let output = render(&[make_series(0, 2, TimeDelta::hours(1))]);
        assert!(output.contains("2031-03-01 01:00:00,101.000000,0"));
    }

    #[test]
    fn deterministic_output() {
        let replicates = vec![make_series(0, 5, TimeDelta::days(1))];
        assert_eq!(render(&replicates), render(&replicates));
    }

    #[test]
    fn round_trip_parseable() {
        let output = render(&[make_series(0, 3, TimeDelta::days(1))]);
        let mut rdr = csv::ReaderBuilder::new().from_reader(output.as_bytes());
        let mut row_count = 0;
        for record in rdr.records() {
            let rec = record.unwrap();
            assert!(rec[1].parse::<f64>().is_ok());
            assert!(rec[2].parse::<usize>().is_ok());
            row_count += 1;
        }
        assert_eq!(row_count, 3);
    }
}
