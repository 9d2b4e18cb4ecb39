//! Controller contract and the configured controller variants.
//!
//! - [`IlqrMpc`] - Receding-horizon iLQR swing-up
//! - [`replay::TrajectoryReplay`] - Time-indexed replay of a trajectory file
//! - [`gravity::GravityCompensation`] - Holds the pendulum against gravity
//!
//! [`ControllerKind`] is built from the `[controller]` section, whose `kind`
//! key selects the variant.

pub mod gravity;
pub mod replay;

use crate::error::ControlError;
use crate::mpc::{IlqrMpc, IlqrMpcConfig};
use pendulum_common::config::ConfigError;
use pendulum_common::control::ControlOutput;
use pendulum_common::pendulum::PendulumParams;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use gravity::GravityCompensation;
pub use replay::{ReplayConfig, ReplayMode, TrajectoryReplay};

/// A controller queried once per tick by the control loop.
pub trait Controller: Send {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Called once with the measured state before the first tick.
    fn init(&mut self, _position: f64, _velocity: f64) -> Result<(), ControlError> {
        Ok(())
    }

    /// Set the target state.
    fn set_goal(&mut self, _position: f64, _velocity: f64) -> Result<(), ControlError> {
        Ok(())
    }

    /// Desired output for the measured state; `time` is seconds since the
    /// loop started.
    fn get_control_output(
        &mut self,
        position: f64,
        velocity: f64,
        torque: f64,
        time: f64,
    ) -> Result<ControlOutput, ControlError>;
}

impl<C: Controller + ?Sized> Controller for Box<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn init(&mut self, position: f64, velocity: f64) -> Result<(), ControlError> {
        (**self).init(position, velocity)
    }

    fn set_goal(&mut self, position: f64, velocity: f64) -> Result<(), ControlError> {
        (**self).set_goal(position, velocity)
    }

    fn get_control_output(
        &mut self,
        position: f64,
        velocity: f64,
        torque: f64,
        time: f64,
    ) -> Result<ControlOutput, ControlError> {
        (**self).get_control_output(position, velocity, torque, time)
    }
}

// ─── Configuration ──────────────────────────────────────────────────

/// `[controller]` section.
///
/// # TOML Example
///
/// ```toml
/// [controller]
/// kind = "replay"
/// path = "swingup.csv"
/// mode = "tracking"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControllerConfig {
    IlqrMpc(IlqrMpcConfig),
    Replay(ReplayConfig),
    GravityCompensation,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::IlqrMpc(IlqrMpcConfig::default())
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::IlqrMpc(config) => config.validate(),
            Self::Replay(config) => config.validate(),
            Self::GravityCompensation => Ok(()),
        }
    }
}

// ─── Dispatch ───────────────────────────────────────────────────────

/// Closed set of controllers selectable by configuration.
pub enum ControllerKind {
    IlqrMpc(Box<IlqrMpc>),
    Replay(TrajectoryReplay),
    GravityCompensation(GravityCompensation),
}

impl ControllerKind {
    /// Build and configure the selected controller.
    ///
    /// The MPC goal is taken from its configuration.
    pub fn from_config(
        config: &ControllerConfig,
        params: &PendulumParams,
    ) -> Result<Self, ControlError> {
        config.validate()?;
        let controller = match config {
            ControllerConfig::IlqrMpc(mpc_config) => {
                let mut mpc = IlqrMpc::new(mpc_config, params)?;
                mpc.set_goal(mpc_config.goal_position, mpc_config.goal_velocity)?;
                Self::IlqrMpc(Box::new(mpc))
            }
            ControllerConfig::Replay(replay) => {
                Self::Replay(TrajectoryReplay::load(&replay.path, replay.mode)?)
            }
            ControllerConfig::GravityCompensation => {
                Self::GravityCompensation(GravityCompensation::new(params)?)
            }
        };
        info!(controller = controller.name(), "Controller created");
        Ok(controller)
    }

    fn as_dyn(&mut self) -> &mut dyn Controller {
        match self {
            Self::IlqrMpc(c) => c.as_mut(),
            Self::Replay(c) => c,
            Self::GravityCompensation(c) => c,
        }
    }
}

impl Controller for ControllerKind {
    fn name(&self) -> &'static str {
        match self {
            Self::IlqrMpc(c) => c.name(),
            Self::Replay(c) => c.name(),
            Self::GravityCompensation(c) => c.name(),
        }
    }

    fn init(&mut self, position: f64, velocity: f64) -> Result<(), ControlError> {
        self.as_dyn().init(position, velocity)
    }

    fn set_goal(&mut self, position: f64, velocity: f64) -> Result<(), ControlError> {
        self.as_dyn().set_goal(position, velocity)
    }

    fn get_control_output(
        &mut self,
        position: f64,
        velocity: f64,
        torque: f64,
        time: f64,
    ) -> Result<ControlOutput, ControlError> {
        self.as_dyn()
            .get_control_output(position, velocity, torque, time)
    }
}
