//! Optimizer-side pendulum model: discrete dynamics, costs and their
//! derivatives.
//!
//! - [`dynamics`] - `Dynamics` trait with 2-state and 3-state implementations
//! - [`cost`] - `Cost` trait with the matching swing-up costs
//! - [`derivatives`] - Central finite-difference strategy

pub mod cost;
pub mod derivatives;
pub mod dynamics;

use crate::error::ControlError;
use pendulum_common::pendulum::{Integrator, PendulumParams, PendulumPlant};
use serde::{Deserialize, Serialize};

pub use cost::{AngleCost, CosSinCost, Cost, CostWeights};
pub use derivatives::FiniteDifference;
pub use dynamics::{AngleDynamics, CosSinDynamics, Dynamics};

/// State representation used by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateEncoding {
    /// `(angle, velocity)`.
    Angle,
    /// `(cos angle, sin angle, velocity)`; no wrap discontinuity.
    #[default]
    CosSin,
}

impl StateEncoding {
    pub const fn state_dim(self) -> usize {
        match self {
            Self::Angle => 2,
            Self::CosSin => 3,
        }
    }
}

/// Build the matching dynamics/cost pair for `encoding`.
pub fn build_model(
    encoding: StateEncoding,
    params: &PendulumParams,
    dt: f64,
    integrator: Integrator,
    weights: CostWeights,
    differentiation: FiniteDifference,
) -> Result<(Box<dyn Dynamics>, Box<dyn Cost>), ControlError> {
    params.validate()?;
    weights.validate()?;
    differentiation.validate()?;
    if !(dt.is_finite() && dt > 0.0) {
        return Err(ControlError::Configuration(format!(
            "dynamics dt must be > 0, got {dt}"
        )));
    }
    let plant = PendulumPlant::new(*params);
    Ok(match encoding {
        StateEncoding::Angle => (
            Box::new(AngleDynamics::new(plant, dt, integrator).with_differentiation(differentiation)),
            Box::new(AngleCost::new(params, weights)),
        ),
        StateEncoding::CosSin => (
            Box::new(CosSinDynamics::new(plant, dt, integrator).with_differentiation(differentiation)),
            Box::new(CosSinCost::new(params, weights)),
        ),
    })
}
