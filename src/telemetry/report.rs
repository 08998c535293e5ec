//! Post-processing of telemetry files for offline analysis.
//!
//! Turns the epoch-millisecond timestamp column into readable local time,
//! inserts a `Cumulative_Time_s` column measured from the first row and
//! writes the result as a tab-separated text file next to the input.

use chrono::{Local, TimeZone};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CUMULATIVE_COLUMN: &str = "Cumulative_Time_s";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Log file has no header row")]
    MissingHeader,
    #[error("Line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: u64, value: String },
}

/// A telemetry log with readable timestamps and the cumulative time column.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLog {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedLog {
    pub fn duration_s(&self) -> f64 {
        self.rows
            .last()
            .and_then(|row| row.get(1))
            .and_then(|value| value.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// Parse a telemetry CSV, rendering timestamps in `tz`.
pub fn parse_log<Tz>(path: &Path, tz: &Tz) -> Result<ParsedLog, ReportError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut records = reader.records();

    let mut header: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => return Err(ReportError::MissingHeader),
    };
    if header.is_empty() {
        return Err(ReportError::MissingHeader);
    }
    header[0] = "Timestamp".to_string();
    header.insert(1, CUMULATIVE_COLUMN.to_string());

    let mut rows = Vec::new();
    let mut start_ms: Option<i64> = None;
    for (index, record) in records.enumerate() {
        let record = record?;
        let Some(raw) = record.get(0) else { continue };
        if raw.trim().is_empty() {
            continue;
        }
        // header is line 1
        let line = index as u64 + 2;
        let invalid = || ReportError::InvalidTimestamp {
            line,
            value: raw.to_string(),
        };
        let epoch_ms: i64 = raw.trim().parse().map_err(|_| invalid())?;
        let start = *start_ms.get_or_insert(epoch_ms);
        let cumulative_s = (epoch_ms - start) as f64 / 1000.0;
        let readable = tz
            .timestamp_millis_opt(epoch_ms)
            .single()
            .ok_or_else(invalid)?
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();

        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row[0] = readable;
        row.insert(1, format!("{:.3}", cumulative_s));
        rows.push(row);
    }

    tracing::debug!("Parsed {} telemetry rows from {}", rows.len(), path.display());
    Ok(ParsedLog { header, rows })
}

/// `<dir>/<stem>_parsed.txt` for an input `<dir>/<stem>.<ext>`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "telemetry".to_string());
    input.with_file_name(format!("{}_parsed.txt", stem))
}

/// Write the parsed log tab-separated, decimal commas normalised to points.
pub fn write_tab_separated(path: &Path, log: &ParsedLog) -> Result<(), ReportError> {
    let file = File::create(path)?;
    // truncated rows from an interrupted run are kept as they are
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(file);
    writer.write_record(&log.header)?;
    for row in &log.rows {
        writer.write_record(row.iter().map(|value| value.replace(',', ".")))?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse `input` in local time and write the report next to it (or to `output`).
pub fn convert(input: &Path, output: Option<&Path>) -> Result<(ParsedLog, PathBuf), ReportError> {
    let log = parse_log(input, &Local)?;
    let out = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input));
    write_tab_separated(&out, &log)?;
    tracing::info!(
        "Wrote {} rows ({:.3} s) to {}",
        log.rows.len(),
        log.duration_s(),
        out.display()
    );
    Ok((log, out))
}
