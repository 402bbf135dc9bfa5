//! CSV layout shared by the recorder export and the emailed report.

use std::io::Write;

use csv::{ReaderBuilder, Writer};

use crate::{errors::Error, Result};

pub const HEADER: [&str; 5] = ["ID", "Start", "End", "Duration(s)", "KeyCount"];

/// `End` column value for a session that has not been stopped.
pub const IN_PROGRESS: &str = "In progress";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsvSessionRow {
    pub id: String,
    pub start: String,
    pub end: Option<String>,
    pub duration_secs: u64,
    pub key_count: u64,
}

pub fn write_csv<W: Write>(out: W, rows: &[CsvSessionRow]) -> Result<()> {
    let mut wtr = Writer::from_writer(out);
    wtr.write_record(HEADER)?;

    for row in rows {
        wtr.write_record([
            row.id.as_str(),
            row.start.as_str(),
            row.end.as_deref().unwrap_or(IN_PROGRESS),
            &row.duration_secs.to_string(),
            &row.key_count.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn to_csv_string(rows: &[CsvSessionRow]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, rows)?;
    String::from_utf8(buf).map_err(|e| Error::Validation(format!("csv is not utf-8: {e}")))
}

/// Parse a document produced by [`write_csv`].
pub fn parse_csv(data: &str) -> Result<Vec<CsvSessionRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(data.as_bytes());

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        let number = |i: usize| -> Result<u64> {
            let raw = field(i);
            raw.trim()
                .parse::<u64>()
                .map_err(|_| Error::Validation(format!("invalid number in csv: {raw:?}")))
        };
        let end = field(2);
        rows.push(CsvSessionRow {
            id: field(0),
            start: field(1),
            end: (end != IN_PROGRESS && !end.is_empty()).then_some(end),
            duration_secs: number(3)?,
            key_count: number(4)?,
        });
    }
    Ok(rows)
}
