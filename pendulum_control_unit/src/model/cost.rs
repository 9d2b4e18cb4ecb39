//! Swing-up costs.
//!
//! With the pendulum energy `E(θ, ω) = ½·m·(l·ω)² + m·g·l·(1 − cos θ)`:
//!
//! ```text
//! stage = Cu·u² + Cp·pos_err + Cv·(ω − ω_g)² + Cen·(E − E_g)²
//! final = fCp·pos_err + fCv·(ω − ω_g)² + fCen·(E − E_g)²
//! ```
//!
//! `pos_err` is `(θ − θ_g)²` on `(angle, velocity)` states and
//! `(c − c_g)² + (s − s_g)²` on `(cos, sin, velocity)` states. Both costs
//! provide closed-form first and second derivatives.

use super::derivatives::FiniteDifference;
use nalgebra::{DMatrix, DVector};
use pendulum_common::config::ConfigError;
use pendulum_common::pendulum::{PendulumParams, PendulumPlant};
use serde::{Deserialize, Serialize};

// ─── Weights ────────────────────────────────────────────────────────

/// Cost weights.
///
/// # TOML Example
///
/// ```toml
/// [controller.weights]
/// control = 0.1
/// final_position = 1000.0
/// final_velocity = 300.0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostWeights {
    /// Stage control effort `Cu`.
    pub control: f64,
    /// Stage position error `Cp`.
    pub position: f64,
    /// Stage velocity error `Cv`.
    pub velocity: f64,
    /// Stage energy error `Cen`.
    pub energy: f64,
    /// Terminal position error `fCp`.
    pub final_position: f64,
    /// Terminal velocity error `fCv`.
    pub final_velocity: f64,
    /// Terminal energy error `fCen`.
    pub final_energy: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            control: 10.0,
            position: 0.001,
            velocity: 0.001,
            energy: 0.0,
            final_position: 1000.0,
            final_velocity: 10.0,
            final_energy: 300.0,
        }
    }
}

impl CostWeights {
    /// Every weight must be finite and non-negative; the terminal weights must
    /// not all be zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, w) in [
            ("control", self.control),
            ("position", self.position),
            ("velocity", self.velocity),
            ("energy", self.energy),
            ("final_position", self.final_position),
            ("final_velocity", self.final_velocity),
            ("final_energy", self.final_energy),
        ] {
            if !(w.is_finite() && w >= 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "weights.{name} must be finite and >= 0, got {w}"
                )));
            }
        }
        if self.final_position + self.final_velocity + self.final_energy == 0.0 {
            return Err(ConfigError::ValidationError(
                "at least one terminal weight must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ─── Cost contract ──────────────────────────────────────────────────

/// Second-order expansion of a stage cost.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDerivatives {
    pub l_x: DVector<f64>,
    pub l_u: f64,
    pub l_xx: DMatrix<f64>,
    pub l_ux: DVector<f64>,
    pub l_uu: f64,
}

/// Second-order expansion of a terminal cost.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalDerivatives {
    pub l_x: DVector<f64>,
    pub l_xx: DMatrix<f64>,
}

/// Stage and terminal cost parameterized by a goal state.
///
/// The derivative methods default to central finite differences on the value
/// functions.
pub trait Cost: Send {
    fn stage_cost(&self, state: &DVector<f64>, control: f64, goal: &DVector<f64>) -> f64;

    fn final_cost(&self, state: &DVector<f64>, goal: &DVector<f64>) -> f64;

    fn stage_derivatives(
        &self,
        state: &DVector<f64>,
        control: f64,
        goal: &DVector<f64>,
    ) -> StageDerivatives {
        // Differentiate over z = [x; u].
        let n = state.len();
        let z = state.clone().insert_row(n, control);
        let f = |z: &DVector<f64>| self.stage_cost(&z.rows(0, n).into_owned(), z[n], goal);
        let fd = FiniteDifference::default();
        let g = fd.gradient(f, &z);
        let h = fd.hessian(f, &z);
        StageDerivatives {
            l_x: g.rows(0, n).into_owned(),
            l_u: g[n],
            l_xx: h.view((0, 0), (n, n)).into_owned(),
            l_ux: h.view((0, n), (n, 1)).column(0).into_owned(),
            l_uu: h[(n, n)],
        }
    }

    fn final_derivatives(&self, state: &DVector<f64>, goal: &DVector<f64>) -> FinalDerivatives {
        let fd = FiniteDifference::default();
        let f = |x: &DVector<f64>| self.final_cost(x, goal);
        FinalDerivatives {
            l_x: fd.gradient(f, state),
            l_xx: fd.hessian(f, state),
        }
    }
}

// ─── Energy ─────────────────────────────────────────────────────────

/// Pendulum energy about the pivot, written in terms of `cos θ`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Energy {
    /// Rotational inertia about the pivot; `m·l²` unless configured.
    inertia: f64,
    /// `m·g·l`
    mgl: f64,
}

impl Energy {
    fn new(params: &PendulumParams) -> Self {
        Self {
            inertia: PendulumPlant::new(*params).inertia(),
            mgl: params.mass * params.gravity * params.length,
        }
    }

    #[inline]
    fn value(&self, cos: f64, velocity: f64) -> f64 {
        0.5 * self.inertia * velocity * velocity + self.mgl * (1.0 - cos)
    }
}

/// Weights of one cost flavour (stage or terminal) on the state terms.
#[derive(Debug, Clone, Copy)]
struct StateWeights {
    position: f64,
    velocity: f64,
    energy: f64,
}

impl CostWeights {
    fn stage(&self) -> StateWeights {
        StateWeights {
            position: self.position,
            velocity: self.velocity,
            energy: self.energy,
        }
    }

    fn terminal(&self) -> StateWeights {
        StateWeights {
            position: self.final_position,
            velocity: self.final_velocity,
            energy: self.final_energy,
        }
    }
}

// ─── 2-state cost ───────────────────────────────────────────────────

/// Swing-up cost on `(angle, velocity)`.
#[derive(Debug, Clone)]
pub struct AngleCost {
    weights: CostWeights,
    energy: Energy,
}

impl AngleCost {
    pub fn new(params: &PendulumParams, weights: CostWeights) -> Self {
        Self {
            weights,
            energy: Energy::new(params),
        }
    }

    fn state_value(&self, w: StateWeights, x: &DVector<f64>, goal: &DVector<f64>) -> f64 {
        let de = self.energy.value(x[0].cos(), x[1]) - self.energy.value(goal[0].cos(), goal[1]);
        w.position * (x[0] - goal[0]).powi(2) + w.velocity * (x[1] - goal[1]).powi(2) + w.energy * de * de
    }

    fn state_expansion(
        &self,
        w: StateWeights,
        x: &DVector<f64>,
        goal: &DVector<f64>,
    ) -> (DVector<f64>, DMatrix<f64>) {
        let (th, v) = (x[0], x[1]);
        let e = &self.energy;
        let de = e.value(th.cos(), v) - e.value(goal[0].cos(), goal[1]);
        let e_th = e.mgl * th.sin();
        let e_v = e.inertia * v;
        let e_thth = e.mgl * th.cos();

        let grad = DVector::from_column_slice(&[
            2.0 * w.position * (th - goal[0]) + 2.0 * w.energy * de * e_th,
            2.0 * w.velocity * (v - goal[1]) + 2.0 * w.energy * de * e_v,
        ]);
        let h_thth = 2.0 * w.position + 2.0 * w.energy * (e_th * e_th + de * e_thth);
        let h_vv = 2.0 * w.velocity + 2.0 * w.energy * (e_v * e_v + de * e.inertia);
        let h_thv = 2.0 * w.energy * e_th * e_v;
        let hess = DMatrix::from_row_slice(2, 2, &[h_thth, h_thv, h_thv, h_vv]);
        (grad, hess)
    }
}

impl Cost for AngleCost {
    fn stage_cost(&self, state: &DVector<f64>, control: f64, goal: &DVector<f64>) -> f64 {
        self.weights.control * control * control + self.state_value(self.weights.stage(), state, goal)
    }

    fn final_cost(&self, state: &DVector<f64>, goal: &DVector<f64>) -> f64 {
        self.state_value(self.weights.terminal(), state, goal)
    }

    fn stage_derivatives(
        &self,
        state: &DVector<f64>,
        control: f64,
        goal: &DVector<f64>,
    ) -> StageDerivatives {
        let (l_x, l_xx) = self.state_expansion(self.weights.stage(), state, goal);
        StageDerivatives {
            l_x,
            l_u: 2.0 * self.weights.control * control,
            l_xx,
            l_ux: DVector::zeros(2),
            l_uu: 2.0 * self.weights.control,
        }
    }

    fn final_derivatives(&self, state: &DVector<f64>, goal: &DVector<f64>) -> FinalDerivatives {
        let (l_x, l_xx) = self.state_expansion(self.weights.terminal(), state, goal);
        FinalDerivatives { l_x, l_xx }
    }
}

// ─── 3-state cost ───────────────────────────────────────────────────

/// Swing-up cost on `(cos, sin, velocity)`.
#[derive(Debug, Clone)]
pub struct CosSinCost {
    weights: CostWeights,
    energy: Energy,
}

impl CosSinCost {
    pub fn new(params: &PendulumParams, weights: CostWeights) -> Self {
        Self {
            weights,
            energy: Energy::new(params),
        }
    }

    fn state_value(&self, w: StateWeights, x: &DVector<f64>, goal: &DVector<f64>) -> f64 {
        let pos = (x[0] - goal[0]).powi(2) + (x[1] - goal[1]).powi(2);
        let de = self.energy.value(x[0], x[2]) - self.energy.value(goal[0], goal[2]);
        w.position * pos + w.velocity * (x[2] - goal[2]).powi(2) + w.energy * de * de
    }

    fn state_expansion(
        &self,
        w: StateWeights,
        x: &DVector<f64>,
        goal: &DVector<f64>,
    ) -> (DVector<f64>, DMatrix<f64>) {
        let (c, s, v) = (x[0], x[1], x[2]);
        let e = &self.energy;
        let de = e.value(c, v) - e.value(goal[0], goal[2]);
        let e_c = -e.mgl;
        let e_v = e.inertia * v;

        let grad = DVector::from_column_slice(&[
            2.0 * w.position * (c - goal[0]) + 2.0 * w.energy * de * e_c,
            2.0 * w.position * (s - goal[1]),
            2.0 * w.velocity * (v - goal[2]) + 2.0 * w.energy * de * e_v,
        ]);
        let h_cc = 2.0 * w.position + 2.0 * w.energy * e_c * e_c;
        let h_ss = 2.0 * w.position;
        let h_vv = 2.0 * w.velocity + 2.0 * w.energy * (e_v * e_v + de * e.inertia);
        let h_cv = 2.0 * w.energy * e_c * e_v;
        #[rustfmt::skip]
        let hess = DMatrix::from_row_slice(3, 3, &[
            h_cc, 0.0,  h_cv,
            0.0,  h_ss, 0.0,
            h_cv, 0.0,  h_vv,
        ]);
        (grad, hess)
    }
}

impl Cost for CosSinCost {
    fn stage_cost(&self, state: &DVector<f64>, control: f64, goal: &DVector<f64>) -> f64 {
        self.weights.control * control * control + self.state_value(self.weights.stage(), state, goal)
    }

    fn final_cost(&self, state: &DVector<f64>, goal: &DVector<f64>) -> f64 {
        self.state_value(self.weights.terminal(), state, goal)
    }

    fn stage_derivatives(
        &self,
        state: &DVector<f64>,
        control: f64,
        goal: &DVector<f64>,
    ) -> StageDerivatives {
        let (l_x, l_xx) = self.state_expansion(self.weights.stage(), state, goal);
        StageDerivatives {
            l_x,
            l_u: 2.0 * self.weights.control * control,
            l_xx,
            l_ux: DVector::zeros(3),
            l_uu: 2.0 * self.weights.control,
        }
    }

    fn final_derivatives(&self, state: &DVector<f64>, goal: &DVector<f64>) -> FinalDerivatives {
        let (l_x, l_xx) = self.state_expansion(self.weights.terminal(), state, goal);
        FinalDerivatives { l_x, l_xx }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
