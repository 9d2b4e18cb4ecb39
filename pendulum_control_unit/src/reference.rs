//! Trajectory files.
//!
//! Delimited text with one header row and the columns
//! `time, position, velocity, torque`, one row per sample. The sample period
//! is the difference between the first two time values. Files like this are
//! produced by offline planners and by [`RunReport::write_csv`] and consumed
//! as warm starts or replay references.
//!
//! [`RunReport::write_csv`]: crate::recorder::RunReport::write_csv

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

/// Columns read from every row; later columns are ignored.
const COLUMNS: usize = 4;

/// Errors while reading a trajectory file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    #[error("Cannot read trajectory file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Trajectory line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Trajectory contains no samples")]
    Empty,

    #[error("Trajectory line {line}: time does not increase")]
    NonMonotonicTime { line: usize },
}

/// One row of a trajectory file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub time: f64,
    pub position: f64,
    pub velocity: f64,
    pub torque: f64,
}

/// A validated, time-ordered reference trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTrajectory {
    samples: Vec<TrajectorySample>,
}

impl ReferenceTrajectory {
    /// Read and validate a trajectory file.
    pub fn load(path: &Path) -> Result<Self, TrajectoryError> {
        let reader = reader().from_path(path).map_err(|e| TrajectoryError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::read(reader)
    }

    /// Parse trajectory text. The first non-blank line is the header.
    pub fn parse(content: &str) -> Result<Self, TrajectoryError> {
        Self::read(reader().from_reader(content.as_bytes()))
    }

    fn read<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self, TrajectoryError> {
        let mut samples = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| {
                let line = e.position().map_or(0, |p| p.line() as usize);
                parse_error(line, e)
            })?;
            samples.push(parse_record(&record)?);
        }
        Self::from_samples(samples)
    }

    /// Build from in-memory samples; time must be strictly increasing.
    pub fn from_samples(samples: Vec<TrajectorySample>) -> Result<Self, TrajectoryError> {
        if samples.is_empty() {
            return Err(TrajectoryError::Empty);
        }
        // Row numbers as in a file: header is line 1.
        if let Some(i) = samples.windows(2).position(|w| w[1].time <= w[0].time) {
            return Err(TrajectoryError::NonMonotonicTime { line: i + 3 });
        }
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `t₁ − t₀`, or `None` for a single-sample trajectory.
    pub fn sample_period(&self) -> Option<f64> {
        match self.samples.as_slice() {
            [first, second, ..] => Some(second.time - first.time),
            _ => None,
        }
    }

    /// Sample active `elapsed` seconds after the start; holds the last sample
    /// once the trajectory is exhausted.
    pub fn sample_at(&self, elapsed: f64) -> &TrajectorySample {
        let last = self.samples.len() - 1;
        let idx = match self.sample_period() {
            Some(period) if elapsed > 0.0 => {
                // Tolerate 0.06 / 0.02 = 2.9999999999999996.
                let raw = (elapsed / period + 1e-6).floor();
                if raw >= last as f64 { last } else { raw as usize }
            }
            _ => 0,
        };
        &self.samples[idx]
    }

    /// Torque column.
    pub fn torques(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.torque).collect()
    }

    /// Write in the format [`load`](Self::load) reads.
    pub fn write_csv(&self, path: &Path) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for sample in &self.samples {
            writer.serialize(sample)?;
        }
        writer.flush()
    }
}

/// Header names vary between producers, so rows are matched by position.
fn reader() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(true).trim(Trim::All).flexible(true);
    builder
}

fn parse_error(line: usize, e: csv::Error) -> TrajectoryError {
    TrajectoryError::Parse {
        line,
        message: e.to_string(),
    }
}

fn parse_record(record: &StringRecord) -> Result<TrajectorySample, TrajectoryError> {
    let line = record.position().map_or(0, |p| p.line() as usize);
    if record.len() < COLUMNS {
        return Err(TrajectoryError::Parse {
            line,
            message: format!("expected {COLUMNS} columns, found {}", record.len()),
        });
    }
    let leading: StringRecord = record.iter().take(COLUMNS).collect();
    let sample: TrajectorySample = leading
        .deserialize(None)
        .map_err(|e| parse_error(line, e))?;
    for (name, value) in [
        ("time", sample.time),
        ("position", sample.position),
        ("velocity", sample.velocity),
        ("torque", sample.torque),
    ] {
        if !value.is_finite() {
            return Err(TrajectoryError::Parse {
                line,
                message: format!("non-finite value in column '{name}'"),
            });
        }
    }
    Ok(sample)
}
