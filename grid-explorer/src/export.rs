//! Record export to CSV and JSON, and reading CSV snapshots back.
//!
//! CSV columns, by header name:
//! - id
//! - name
//! - state (region code)
//! - source (SOLAR, WIND, HYDRO or OTHER)
//! - technology
//! - capacity_mw
//! - lat
//! - lon
//! - operating_year (optional)

use std::io::{Read, Write};

use eia_client::domain::{Record, SourceCategory};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportRow {
    id: String,
    name: String,
    state: String,
    source: SourceCategory,
    technology: String,
    capacity_mw: f64,
    lat: f64,
    lon: f64,
    operating_year: Option<i32>,
}

impl From<&Record> for ExportRow {
    fn from(r: &Record) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            state: r.region.clone(),
            source: r.source,
            technology: r.technology.clone(),
            capacity_mw: r.capacity_mw,
            lat: r.lat,
            lon: r.lon,
            operating_year: r.operating_year,
        }
    }
}

impl From<ExportRow> for Record {
    fn from(row: ExportRow) -> Self {
        Record {
            id: row.id,
            name: row.name,
            lat: row.lat,
            lon: row.lon,
            source: row.source,
            technology: row.technology,
            capacity_mw: row.capacity_mw,
            region: row.state,
            operating_year: row.operating_year,
        }
    }
}

/// Write `records` as CSV with a header row. Returns the number of rows written.
pub fn write_csv<W: Write>(records: &[Record], writer: W) -> Result<usize, ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in records {
        wtr.serialize(ExportRow::from(r))?;
    }
    if records.is_empty() {
        wtr.write_record([
            "id",
            "name",
            "state",
            "source",
            "technology",
            "capacity_mw",
            "lat",
            "lon",
            "operating_year",
        ])?;
    }
    wtr.flush()?;
    Ok(records.len())
}

pub fn write_json<W: Write>(records: &[Record], writer: W) -> Result<usize, ExportError> {
    serde_json::to_writer_pretty(writer, records)?;
    Ok(records.len())
}

/// Read records written by [`write_csv`]. Rows that fail to parse are skipped
/// and counted.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Record>, ExportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (line, row) in rdr.deserialize::<ExportRow>().enumerate() {
        match row {
            Ok(row) => records.push(row.into()),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                metrics::counter!("snapshot_csv_parse_errors_total").increment(1);
                tracing::warn!(row = line + 1, error = %e, "skipping unreadable CSV row");
            }
        }
    }
    Ok(records)
}
