//! Solver trajectories and gains.

use nalgebra::DVector;

/// `N + 1` states and `N` controls.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub states: Vec<DVector<f64>>,
    pub controls: Vec<f64>,
}

impl Trajectory {
    /// Number of controls.
    pub fn horizon(&self) -> usize {
        self.controls.len()
    }

    pub fn initial_state(&self) -> &DVector<f64> {
        &self.states[0]
    }

    pub fn final_state(&self) -> &DVector<f64> {
        &self.states[self.states.len() - 1]
    }

    /// First control action.
    pub fn first_control(&self) -> f64 {
        self.controls[0]
    }
}

/// Drop the first control and repeat the last one, keeping the length.
pub fn shift_controls(controls: &[f64]) -> Vec<f64> {
    match controls {
        [] => Vec::new(),
        [_, rest @ ..] => {
            let mut shifted = Vec::with_capacity(controls.len());
            shifted.extend_from_slice(rest);
            shifted.push(controls[controls.len() - 1]);
            shifted
        }
    }
}

/// Resize a control sequence to `horizon`: truncate, or pad with the last
/// value (`fill` if empty).
pub fn fit_controls(controls: &[f64], horizon: usize, fill: f64) -> Vec<f64> {
    let pad = controls.last().copied().unwrap_or(fill);
    let mut fitted: Vec<f64> = controls.iter().copied().take(horizon).collect();
    fitted.resize(horizon, pad);
    fitted
}

/// Per-step feedforward `k` and feedback row `K` from one backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Gains {
    pub feedforward: Vec<f64>,
    pub feedback: Vec<DVector<f64>>,
}

impl Gains {
    /// `u = ū + α·k + K·(x − x̄)` at step `t`.
    #[inline]
    pub fn control(&self, t: usize, nominal: f64, alpha: f64, dx: &DVector<f64>) -> f64 {
        nominal + alpha * self.feedforward[t] + self.feedback[t].dot(dx)
    }
}
