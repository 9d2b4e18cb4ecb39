//! Control unit error taxonomy.
//!
//! | Variant | Raised by | Effect on hardware |
//! |---------|-----------|--------------------|
//! | `Configuration` | construction / `set_goal` missing | never written |
//! | `Divergence` | any rollout with non-finite values | command never written |
//! | `NonConvergence` | offline planning only | never written (pre-loop) |
//! | `Hardware` | actuator read / write | zero torque, loop exits |
//! | `Trajectory` | trajectory file loading | never written |
//!
//! Timing overruns are not errors; they are counted in `CycleStats`.

use crate::ilqr::{Termination, Trajectory};
use crate::reference::TrajectoryError;
use pendulum_common::config::ConfigError;
use pendulum_common::hal::driver::HalError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ControlError {
    /// Invalid horizon, weights, dynamics selection or call order.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Non-finite state or cost in a rollout. No trajectory is produced.
    #[error("Solver diverged: non-finite {quantity} at step {step}")]
    Divergence {
        /// Time step at which the first non-finite value appeared.
        step: usize,
        /// `"state"` or `"cost"`.
        quantity: &'static str,
    },

    /// Offline planning gave up without converging.
    #[error(
        "Planning did not converge ({termination:?}) after {iterations} iterations: regularization {regularization:.3e}, best cost {best_cost:.6}"
    )]
    NonConvergence {
        /// `RegularizationExhausted` or `RetriesExhausted`.
        termination: Termination,
        regularization: f64,
        iterations: usize,
        best_cost: f64,
        /// Best trajectory found before giving up.
        best: Box<Trajectory>,
    },

    /// Actuator read or write failure.
    #[error("Hardware fault: {0}")]
    Hardware(#[from] HalError),

    /// Trajectory file could not be used.
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
}

impl From<ConfigError> for ControlError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}
