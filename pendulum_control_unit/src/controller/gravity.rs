//! Gravity compensation: `τ = m·g·l·sin θ`, clipped to the torque limit.

use super::Controller;
use crate::error::ControlError;
use pendulum_common::control::ControlOutput;
use pendulum_common::pendulum::{PendulumParams, PendulumPlant};

/// Cancels the gravity torque at the measured angle.
#[derive(Debug, Clone)]
pub struct GravityCompensation {
    plant: PendulumPlant,
}

impl GravityCompensation {
    pub fn new(params: &PendulumParams) -> Result<Self, ControlError> {
        params.validate()?;
        Ok(Self {
            plant: PendulumPlant::new(*params),
        })
    }

    /// Clipped holding torque at `angle`.
    pub fn torque(&self, angle: f64) -> f64 {
        let p = self.plant.params();
        self.plant
            .clip_torque(p.mass * p.gravity * p.length * angle.sin())
    }
}

impl Controller for GravityCompensation {
    fn name(&self) -> &'static str {
        "gravity_compensation"
    }

    fn get_control_output(
        &mut self,
        position: f64,
        _velocity: f64,
        _torque: f64,
        _time: f64,
    ) -> Result<ControlOutput, ControlError> {
        Ok(ControlOutput::torque(self.torque(position)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pendulum_common::pendulum::Integrator;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn holding_torque_cancels_gravity() {
        let params = PendulumParams::default();
        let comp = GravityCompensation::new(&params).unwrap();
        let plant = PendulumPlant::new(params);
        // Below the limit: |m·g·l·sin θ| < 2 Nm for |θ| < 0.79.
        for angle in [-0.6, 0.0, 0.3, 0.7] {
            let acc = plant.forward_dynamics(angle, 0.0, comp.torque(angle));
            assert_abs_diff_eq!(acc, 0.0, epsilon = 1e-12);
        }
        let (angle, velocity) = plant.step(Integrator::RungeKutta, 0.5, 0.0, comp.torque(0.5), 0.02);
        assert_abs_diff_eq!(angle, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(velocity, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn saturates_at_horizontal() {
        // m·g·l = 2.81 Nm exceeds the 2 Nm limit.
        let comp = GravityCompensation::new(&PendulumParams::default()).unwrap();
        assert_eq!(comp.torque(FRAC_PI_2), 2.0);
        assert_eq!(comp.torque(-FRAC_PI_2), -2.0);
        assert_eq!(comp.torque(1.0), 2.0);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let params = PendulumParams {
            mass: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            GravityCompensation::new(&params),
            Err(ControlError::Configuration(_))
        ));
    }
}
