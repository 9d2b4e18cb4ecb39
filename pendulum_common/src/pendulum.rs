//! Pendulum plant model.
//!
//! Physical parameters, kinematics and the continuous-time equation of motion
//! of a single torque-driven rotary pendulum. Angle 0 is hanging straight
//! down, angle π is upright; positive torque accelerates positive angle.
//!
//! The same model backs the optimizer's dynamics in the control unit and the
//! simulated actuator in the HAL, so both sides always agree on physics.

use crate::config::ConfigError;
use crate::consts::{DEFAULT_TORQUE_LIMIT, GRAVITY};
use serde::{Deserialize, Serialize};

// ─── Parameters ─────────────────────────────────────────────────────

/// Physical parameters of the pendulum.
///
/// # TOML Example
///
/// ```toml
/// [pendulum]
/// mass = 0.57288
/// length = 0.5
/// damping = 0.15
/// coulomb_friction = 0.0
/// torque_limit = 2.0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendulumParams {
    /// Point mass at the tip [kg].
    pub mass: f64,
    /// Rod length [m].
    pub length: f64,
    /// Viscous damping coefficient [Nm·s/rad].
    pub damping: f64,
    /// Coulomb friction torque magnitude [Nm].
    pub coulomb_friction: f64,
    /// Gravitational acceleration [m/s²].
    pub gravity: f64,
    /// Rotational inertia about the pivot [kg·m²]; `None` means `mass·length²`.
    pub inertia: Option<f64>,
    /// Symmetric actuator torque limit [Nm].
    pub torque_limit: f64,
}

impl Default for PendulumParams {
    fn default() -> Self {
        Self {
            mass: 0.57288,
            length: 0.5,
            damping: 0.15,
            coulomb_friction: 0.0,
            gravity: GRAVITY,
            inertia: None,
            torque_limit: DEFAULT_TORQUE_LIMIT,
        }
    }
}

impl PendulumParams {
    /// Validate physical plausibility.
    ///
    /// # Errors
    ///
    /// `ConfigError::ValidationError` if mass, length, torque limit or an
    /// explicit inertia is not strictly positive, or if damping or friction is
    /// negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("pendulum.mass", self.mass)?;
        positive("pendulum.length", self.length)?;
        positive("pendulum.torque_limit", self.torque_limit)?;
        if let Some(inertia) = self.inertia {
            positive("pendulum.inertia", inertia)?;
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "pendulum.damping must be >= 0, got {}",
                self.damping
            )));
        }
        if !(self.coulomb_friction.is_finite() && self.coulomb_friction >= 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "pendulum.coulomb_friction must be >= 0, got {}",
                self.coulomb_friction
            )));
        }
        if !self.gravity.is_finite() {
            return Err(ConfigError::ValidationError(
                "pendulum.gravity must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject anything that is not a finite, strictly positive number.
pub fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{name} must be > 0, got {value}"
        )))
    }
}

// ─── Integration ────────────────────────────────────────────────────

/// Fixed-step integration scheme for discrete-time dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrator {
    /// Explicit (forward) Euler.
    Euler,
    /// Classic 4th-order Runge-Kutta.
    #[default]
    RungeKutta,
}

impl Integrator {
    /// Advance `x` by `dt` under `ẋ = f(x)`.
    pub fn step<const N: usize>(
        self,
        x: &[f64; N],
        dt: f64,
        f: impl Fn(&[f64; N]) -> [f64; N],
    ) -> [f64; N] {
        match self {
            Self::Euler => axpy(x, dt, &f(x)),
            Self::RungeKutta => {
                let k1 = f(x);
                let k2 = f(&axpy(x, 0.5 * dt, &k1));
                let k3 = f(&axpy(x, 0.5 * dt, &k2));
                let k4 = f(&axpy(x, dt, &k3));
                std::array::from_fn(|i| {
                    x[i] + dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i])
                })
            }
        }
    }
}

#[inline]
fn axpy<const N: usize>(x: &[f64; N], a: f64, y: &[f64; N]) -> [f64; N] {
    std::array::from_fn(|i| x[i] + a * y[i])
}

/// Sign function with `sign(0) == 0`.
///
/// `f64::signum` returns ±1 for ±0.0, which would apply full Coulomb friction
/// to a pendulum at rest.
#[inline]
pub fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

// ─── Plant ──────────────────────────────────────────────────────────

/// Pendulum plant: kinematics and continuous dynamics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendulumPlant {
    params: PendulumParams,
    inertia: f64,
}

impl PendulumPlant {
    pub fn new(params: PendulumParams) -> Self {
        let inertia = params
            .inertia
            .unwrap_or(params.mass * params.length * params.length);
        Self { params, inertia }
    }

    #[inline]
    pub fn params(&self) -> &PendulumParams {
        &self.params
    }

    #[inline]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    #[inline]
    pub fn torque_limit(&self) -> f64 {
        self.params.torque_limit
    }

    /// Clamp a torque command to `±torque_limit`. NaN passes through.
    #[inline]
    pub fn clip_torque(&self, torque: f64) -> f64 {
        torque.clamp(-self.params.torque_limit, self.params.torque_limit)
    }

    /// Tip position `(x, y)` for `angle`; the pivot is the origin and y points up.
    pub fn forward_kinematics(&self, angle: f64) -> (f64, f64) {
        let l = self.params.length;
        (l * angle.sin(), -l * angle.cos())
    }

    /// Angle in `(-π, π]` whose tip lies on the ray through `(x, y)`.
    ///
    /// Undefined at the origin, where `atan2` returns 0.
    pub fn inverse_kinematics(&self, x: f64, y: f64) -> f64 {
        x.atan2(-y)
    }

    /// Angular acceleration for the given state and (unclipped) torque.
    pub fn forward_dynamics(&self, angle: f64, velocity: f64, torque: f64) -> f64 {
        let p = &self.params;
        let torque = self.clip_torque(torque);
        let gravity = p.mass * p.gravity * p.length * angle.sin();
        let friction = p.damping * velocity + p.coulomb_friction * sign(velocity);
        (torque - gravity - friction) / self.inertia
    }

    /// Advance `(angle, velocity)` by `dt` with `torque` held constant.
    pub fn step(
        &self,
        integrator: Integrator,
        angle: f64,
        velocity: f64,
        torque: f64,
        dt: f64,
    ) -> (f64, f64) {
        let [angle, velocity] = integrator.step(&[angle, velocity], dt, |x| {
            [x[1], self.forward_dynamics(x[0], x[1], torque)]
        });
        (angle, velocity)
    }

    /// Mechanical energy relative to hanging at rest [J].
    pub fn energy(&self, angle: f64, velocity: f64) -> f64 {
        let p = &self.params;
        0.5 * self.inertia * velocity * velocity
            + p.mass * p.gravity * p.length * (1.0 - angle.cos())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
