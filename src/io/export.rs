//! CSV export for per-pole marching traces.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::PoleRecord;

/// Column header for the pole trace CSV.
const HEADER: &str = "pole,distance_m,line_voltage,service_voltage,active_w,reactive_var,\
                       segment_loss_w,transformer_loss_w,cumulative_loss_w,stations";

/// Exports a pole trace to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[PoleRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(records, buf)
}

/// Writes a pole trace as CSV to any writer.
///
/// Writes a header row followed by one row per pole. Output is deterministic
/// for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(records: &[PoleRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in records {
        wtr.write_record(&[
            r.pole.to_string(),
            format!("{:.2}", r.distance_m),
            format!("{:.6}", r.line_voltage),
            format!("{:.6}", r.service_voltage),
            format!("{:.6}", r.flow.active),
            format!("{:.6}", r.flow.reactive),
            format!("{:.6}", r.segment_loss_w),
            format!("{:.6}", r.transformer_loss_w),
            format!("{:.6}", r.cumulative_loss_w),
            r.stations.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::PhaseQuantity;

    fn make_record(pole: usize) -> PoleRecord {
        PoleRecord {
            pole,
            distance_m: pole as f64 * 40.0,
            line_voltage: 400.0 - pole as f64,
            service_voltage: 400.0 - pole as f64,
            flow: PhaseQuantity::new(10_000.0 - 150.0 * pole as f64, 3_000.0),
            segment_loss_w: 0.05,
            transformer_loss_w: 0.0,
            cumulative_loss_w: 0.05 * pole as f64,
            stations: 0,
        }
    }

    #[test]
    fn header_matches_columns() {
        let mut buf = Vec::new();
        write_csv(&[make_record(1)], &mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert_eq!(
            output.lines().next(),
            Some(
                "pole,distance_m,line_voltage,service_voltage,active_w,reactive_var,\
                 segment_loss_w,transformer_loss_w,cumulative_loss_w,stations"
            )
        );
    }

    #[test]
    fn row_count_matches_pole_count() {
        let records: Vec<PoleRecord> = (1..=25).map(make_record).collect();
        let mut buf = Vec::new();
        write_csv(&records, &mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert_eq!(output.lines().count(), 26);
    }

    #[test]
    fn rows_are_parseable() {
        let records: Vec<PoleRecord> = (1..=3).map(make_record).collect();
        let mut buf = Vec::new();
        write_csv(&records, &mut buf).unwrap();

        let mut rdr = csv::ReaderBuilder::new().from_reader(buf.as_slice());
        assert_eq!(rdr.headers().map(csv::StringRecord::len).ok(), Some(10));

        let mut rows = 0;
        for record in rdr.records() {
            let rec = record.expect("every row should parse");
            for i in 1..9 {
                assert!(rec[i].parse::<f64>().is_ok(), "column {i} should parse as f64");
            }
            assert!(rec[9].parse::<usize>().is_ok());
            rows += 1;
        }
        assert_eq!(rows, 3);
    }
}
