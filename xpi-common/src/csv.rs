//! CSV codec for question uploads and project exports
//!
//! Reading honors double-quote enclosure with `""` as an escaped quote; a
//! quote inside an unquoted field is plain data. Rows may have varying
//! widths, cells are trimmed and blank lines are skipped.
//!
//! Writing quotes only the fields that need it.

use csv::{ReaderBuilder, Trim, WriterBuilder};

use crate::{Error, Result};

/// Parse CSV text into rows of trimmed cells
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::InvalidInput(format!("Malformed CSV: {}", e)))?;
        let blank = record.iter().all(str::is_empty);
        if !blank {
            rows.push(record.iter().map(str::to_string).collect());
        }
    }
    Ok(rows)
}

/// Serialize a header and rows into CSV text
pub fn write_csv<S: AsRef<str>>(header: &[&str], rows: &[Vec<S>]) -> Result<String> {
    let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());

    writer.write_record(header).map_err(write_error)?;
    for row in rows {
        writer
            .write_record(row.iter().map(|cell| cell.as_ref()))
            .map_err(write_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("CSV output is not UTF-8: {}", e)))
}

fn write_error(err: csv::Error) -> Error {
    Error::Internal(format!("CSV write failed: {}", err))
}
