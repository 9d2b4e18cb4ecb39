//! Discrete-time pendulum dynamics for the optimizer.
//!
//! Both implementations wrap the shared [`PendulumPlant`] and satisfy the same
//! contract: `discrete_step` is pure, clips torque to the actuator limit and
//! advances the state by `dt` with the configured [`Integrator`].

use super::derivatives::FiniteDifference;
use nalgebra::{DMatrix, DVector};
use pendulum_common::pendulum::{Integrator, PendulumPlant};

/// Discrete dynamics `x' = f(x, u)` consumed by the solver.
pub trait Dynamics: Send {
    /// Dimension of the state vector.
    fn state_dim(&self) -> usize;

    /// Symmetric torque limit applied inside `discrete_step`.
    fn torque_limit(&self) -> f64;

    /// Step length [s].
    fn dt(&self) -> f64;

    /// Advance `state` by one step under `torque`.
    fn discrete_step(&self, state: &DVector<f64>, torque: f64) -> DVector<f64>;

    /// `(∂f/∂x, ∂f/∂u)` at `(state, torque)`.
    fn jacobians(&self, state: &DVector<f64>, torque: f64) -> (DMatrix<f64>, DVector<f64>) {
        FiniteDifference::default().jacobians(|x, u| self.discrete_step(x, u), state, torque)
    }

    /// State vector for a measured `(position, velocity)`.
    fn encode(&self, position: f64, velocity: f64) -> DVector<f64>;

    /// `(position, velocity)` represented by `state`.
    fn decode(&self, state: &DVector<f64>) -> (f64, f64);

    /// Clip a torque to the actuator limit.
    fn clip(&self, torque: f64) -> f64 {
        torque.clamp(-self.torque_limit(), self.torque_limit())
    }
}

// ─── 2-state: (angle, velocity) ─────────────────────────────────────

/// Dynamics on `(angle, velocity)`.
#[derive(Debug, Clone)]
pub struct AngleDynamics {
    plant: PendulumPlant,
    dt: f64,
    integrator: Integrator,
    fd: FiniteDifference,
}

impl AngleDynamics {
    pub fn new(plant: PendulumPlant, dt: f64, integrator: Integrator) -> Self {
        Self {
            plant,
            dt,
            integrator,
            fd: FiniteDifference::default(),
        }
    }

    pub fn with_differentiation(mut self, fd: FiniteDifference) -> Self {
        self.fd = fd;
        self
    }
}

impl Dynamics for AngleDynamics {
    fn state_dim(&self) -> usize {
        2
    }

    fn torque_limit(&self) -> f64 {
        self.plant.torque_limit()
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn discrete_step(&self, state: &DVector<f64>, torque: f64) -> DVector<f64> {
        let (angle, velocity) =
            self.plant
                .step(self.integrator, state[0], state[1], torque, self.dt);
        DVector::from_column_slice(&[angle, velocity])
    }

    fn jacobians(&self, state: &DVector<f64>, torque: f64) -> (DMatrix<f64>, DVector<f64>) {
        self.fd
            .jacobians(|x, u| self.discrete_step(x, u), state, torque)
    }

    fn encode(&self, position: f64, velocity: f64) -> DVector<f64> {
        DVector::from_column_slice(&[position, velocity])
    }

    fn decode(&self, state: &DVector<f64>) -> (f64, f64) {
        (state[0], state[1])
    }
}

// ─── 3-state: (cos, sin, velocity) ──────────────────────────────────

/// Dynamics on `(cos angle, sin angle, velocity)`.
///
/// The angle is recovered with `atan2(sin, cos)`; the trigonometric
/// components evolve as `ċ = −s·ω`, `ṡ = c·ω`.
#[derive(Debug, Clone)]
pub struct CosSinDynamics {
    plant: PendulumPlant,
    dt: f64,
    integrator: Integrator,
    fd: FiniteDifference,
}

impl CosSinDynamics {
    pub fn new(plant: PendulumPlant, dt: f64, integrator: Integrator) -> Self {
        Self {
            plant,
            dt,
            integrator,
            fd: FiniteDifference::default(),
        }
    }

    pub fn with_differentiation(mut self, fd: FiniteDifference) -> Self {
        self.fd = fd;
        self
    }
}

impl Dynamics for CosSinDynamics {
    fn state_dim(&self) -> usize {
        3
    }

    fn torque_limit(&self) -> f64 {
        self.plant.torque_limit()
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn discrete_step(&self, state: &DVector<f64>, torque: f64) -> DVector<f64> {
        let next = self
            .integrator
            .step(&[state[0], state[1], state[2]], self.dt, |x| {
                let [c, s, v] = *x;
                let angle = s.atan2(c);
                [-s * v, c * v, self.plant.forward_dynamics(angle, v, torque)]
            });
        DVector::from_column_slice(&next)
    }

    fn jacobians(&self, state: &DVector<f64>, torque: f64) -> (DMatrix<f64>, DVector<f64>) {
        self.fd
            .jacobians(|x, u| self.discrete_step(x, u), state, torque)
    }

    fn encode(&self, position: f64, velocity: f64) -> DVector<f64> {
        DVector::from_column_slice(&[position.cos(), position.sin(), velocity])
    }

    fn decode(&self, state: &DVector<f64>) -> (f64, f64) {
        (state[1].atan2(state[0]), state[2])
    }
}
