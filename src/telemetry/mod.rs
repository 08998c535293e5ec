// src/telemetry/mod.rs - Per-iteration CSV telemetry
pub mod report;

use crate::config::TelemetryConfig;
use crate::motion::pose::{JOINT_COUNT, JointVector, Pose};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column names, in file order. The header row is always exactly these.
pub const TELEMETRY_COLUMNS: [&str; 4 + 2 * JOINT_COUNT] = [
    "Timestamp",
    "EndEffector_X",
    "EndEffector_Y",
    "EndEffector_Z",
    "J1_Pos_rad",
    "J2_Pos_rad",
    "J3_Pos_rad",
    "J4_Pos_rad",
    "J5_Pos_rad",
    "J6_Pos_rad",
    "J7_Pos_rad",
    "J1_Torque_Nm",
    "J2_Torque_Nm",
    "J3_Torque_Nm",
    "J4_Torque_Nm",
    "J5_Torque_Nm",
    "J6_Torque_Nm",
    "J7_Torque_Nm",
];

const FILE_PREFIX: &str = "SliderData_";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Telemetry sink already closed")]
    Closed,
}

/// One row per control loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Wall clock, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    pub pose: Pose,
    pub joint_positions: JointVector,
    pub joint_torques: JointVector,
}

impl TelemetryRecord {
    /// Integer milliseconds, positions to 2 decimals, joints and torques to 4.
    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(TELEMETRY_COLUMNS.len());
        fields.push(self.timestamp_ms.to_string());
        fields.push(format!("{:.2}", self.pose.x));
        fields.push(format!("{:.2}", self.pose.y));
        fields.push(format!("{:.2}", self.pose.z));
        fields.extend(self.joint_positions.iter().map(|q| format!("{:.4}", q)));
        fields.extend(self.joint_torques.iter().map(|t| format!("{:.4}", t)));
        fields
    }
}

/// Destination for telemetry records. Owned by the control loop.
pub trait TelemetrySink: Send {
    fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError>;

    /// Flush and release the sink. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), TelemetryError>;
}

/// Append-only CSV file, flushed after every row.
#[derive(Debug)]
pub struct CsvTelemetryLogger {
    writer: Option<csv::Writer<File>>,
    path: PathBuf,
    rows: u64,
}

impl CsvTelemetryLogger {
    /// Create `SliderData_<YYYYMMDD_HHMMSS>.csv` in `directory`. An existing
    /// file is never overwritten; a numeric suffix is added instead.
    pub fn create_in(directory: &Path, now: DateTime<Local>) -> Result<Self, TelemetryError> {
        std::fs::create_dir_all(directory)?;
        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let mut suffix = 0u32;
        loop {
            let name = if suffix == 0 {
                format!("{}{}.csv", FILE_PREFIX, stamp)
            } else {
                format!("{}{}_{}.csv", FILE_PREFIX, stamp, suffix)
            };
            let path = directory.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Self::from_file(file, path),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && suffix < 100 => {
                    suffix += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Create (or truncate) a telemetry file at an explicit path.
    pub fn create(path: &Path) -> Result<Self, TelemetryError> {
        let file = File::create(path)?;
        Self::from_file(file, path.to_path_buf())
    }

    fn from_file(file: File, path: PathBuf) -> Result<Self, TelemetryError> {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(TELEMETRY_COLUMNS)?;
        writer.flush()?;
        tracing::info!("Telemetry file ready at: {}", path.display());
        Ok(Self {
            writer: Some(writer),
            path,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

impl TelemetrySink for CsvTelemetryLogger {
    fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        let writer = self.writer.as_mut().ok_or(TelemetryError::Closed)?;
        writer.write_record(record.to_fields())?;
        writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TelemetryError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::info!(
                "Closed telemetry file {} after {} rows",
                self.path.display(),
                self.rows
            );
        }
        Ok(())
    }
}

/// Open the run's telemetry file as configured. A file that cannot be
/// created is not fatal: the task runs without telemetry.
pub fn open_or_warn(
    config: &TelemetryConfig,
    now: DateTime<Local>,
) -> Option<Box<dyn TelemetrySink>> {
    if !config.enabled {
        tracing::info!("Telemetry disabled by configuration");
        return None;
    }
    match CsvTelemetryLogger::create_in(&config.directory, now) {
        Ok(logger) => Some(Box::new(logger)),
        Err(e) => {
            tracing::warn!(
                "Could not open telemetry file in {}, continuing without it: {}",
                config.directory.display(),
                e
            );
            None
        }
    }
}

impl Drop for CsvTelemetryLogger {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close telemetry file {}: {}", self.path.display(), e);
        }
    }
}
