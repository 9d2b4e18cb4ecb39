//! Per-tick run records and CSV export.
//!
//! The first four CSV columns are `time, position, velocity, torque` (the
//! commanded torque), so a recorded run can be loaded back as a
//! [`ReferenceTrajectory`](crate::reference::ReferenceTrajectory).

use crate::cycle::CycleStats;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// CSV header written by [`RunReport::write_csv`].
pub const CSV_HEADER: &str = "time,position,velocity,torque,measured_torque,\
desired_position,desired_velocity,desired_torque,tick_duration,overrun";

/// One control tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickRecord {
    /// Seconds since the loop started.
    pub time: f64,
    /// Measured position [rad].
    pub position: f64,
    /// Measured velocity [rad/s].
    pub velocity: f64,
    /// Measured torque [Nm].
    pub measured_torque: f64,
    pub desired_position: Option<f64>,
    pub desired_velocity: Option<f64>,
    pub desired_torque: Option<f64>,
    /// Torque written to the actuator [Nm].
    pub command: f64,
    /// Busy time of the tick [s].
    pub duration: f64,
    pub overrun: bool,
}

/// Why the loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// `max_duration` elapsed.
    #[default]
    Duration,
    /// The stop flag was set.
    StopRequested,
}

/// Result of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub ticks: Vec<TickRecord>,
    pub stats: CycleStats,
    pub stop_reason: StopReason,
}

impl RunReport {
    pub fn last(&self) -> Option<&TickRecord> {
        self.ticks.last()
    }

    /// Write every tick to `path` as CSV.
    pub fn write_csv(&self, path: &Path) -> io::Result<()> {
        self.write_to(&mut File::create(path)?)
    }

    /// Write every tick as CSV to `out`.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        for tick in &self.ticks {
            writer.serialize(CsvRow::from(tick))?;
        }
        writer.flush()
    }
}

/// Column layout of [`CSV_HEADER`]; unset set-points are empty fields.
#[derive(Serialize)]
struct CsvRow {
    time: f64,
    position: f64,
    velocity: f64,
    torque: f64,
    measured_torque: f64,
    desired_position: Option<f64>,
    desired_velocity: Option<f64>,
    desired_torque: Option<f64>,
    tick_duration: f64,
    overrun: u8,
}

impl From<&TickRecord> for CsvRow {
    fn from(t: &TickRecord) -> Self {
        Self {
            time: t.time,
            position: t.position,
            velocity: t.velocity,
            torque: t.command,
            measured_torque: t.measured_torque,
            desired_position: t.desired_position,
            desired_velocity: t.desired_velocity,
            desired_torque: t.desired_torque,
            tick_duration: t.duration,
            overrun: u8::from(t.overrun),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceTrajectory;
    use tempfile::NamedTempFile;

    fn report() -> RunReport {
        RunReport {
            ticks: vec![
                TickRecord {
                    time: 0.0,
                    desired_torque: Some(0.5),
                    command: 0.5,
                    ..Default::default()
                },
                TickRecord {
                    time: 0.02,
                    position: 0.01,
                    velocity: 0.4,
                    desired_position: Some(0.02),
                    desired_velocity: Some(0.5),
                    command: 0.9,
                    overrun: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn csv_leaves_unset_set_points_empty() {
        let mut buf = Vec::new();
        report().write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "0.0,0.0,0.0,0.5,0.0,,,0.5,0.0,0");
        assert!(lines[2].ends_with(",1"));
    }

    #[test]
    fn recorded_run_loads_as_reference() {
        let file = NamedTempFile::new().unwrap();
        report().write_csv(file.path()).unwrap();
        let reference = ReferenceTrajectory::load(file.path()).unwrap();
        assert_eq!(reference.torques(), vec![0.5, 0.9]);
        assert_eq!(reference.samples()[1].velocity, 0.4);
    }
}
