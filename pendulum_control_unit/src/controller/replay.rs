//! Time-indexed replay of a trajectory file.

use super::Controller;
use crate::error::ControlError;
use crate::reference::{ReferenceTrajectory, TrajectoryError};
use pendulum_common::config::ConfigError;
use pendulum_common::control::ControlOutput;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// What the replay hands to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Feed-forward torque only.
    #[default]
    Torque,
    /// Position and velocity set-points plus feed-forward torque; the loop
    /// closes its PD law around them.
    Tracking,
}

/// `[controller]` settings for `kind = "replay"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Trajectory file.
    pub path: PathBuf,
    #[serde(default)]
    pub mode: ReplayMode,
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "controller.path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Plays back a [`ReferenceTrajectory`], holding the last sample at the end.
#[derive(Debug, Clone)]
pub struct TrajectoryReplay {
    reference: ReferenceTrajectory,
    mode: ReplayMode,
}

impl TrajectoryReplay {
    pub fn new(reference: ReferenceTrajectory, mode: ReplayMode) -> Self {
        Self { reference, mode }
    }

    pub fn load(path: &Path, mode: ReplayMode) -> Result<Self, TrajectoryError> {
        let reference = ReferenceTrajectory::load(path)?;
        info!(
            path = %path.display(),
            samples = reference.len(),
            period = ?reference.sample_period(),
            ?mode,
            "Replay trajectory loaded"
        );
        Ok(Self::new(reference, mode))
    }

    pub fn reference(&self) -> &ReferenceTrajectory {
        &self.reference
    }

    pub fn mode(&self) -> ReplayMode {
        self.mode
    }
}

impl Controller for TrajectoryReplay {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn get_control_output(
        &mut self,
        _position: f64,
        _velocity: f64,
        _torque: f64,
        time: f64,
    ) -> Result<ControlOutput, ControlError> {
        let sample = self.reference.sample_at(time);
        Ok(match self.mode {
            ReplayMode::Torque => ControlOutput::torque(sample.torque),
            ReplayMode::Tracking => {
                ControlOutput::tracking(sample.position, sample.velocity, Some(sample.torque))
            }
        })
    }
}
