//! Solver options and the two operating modes.

use pendulum_common::config::ConfigError;
use serde::{Deserialize, Serialize};

/// iLQR iteration, regularization and line-search settings.
///
/// Regularization `μ` is added to `Q_uu` before inversion. It shrinks by
/// `regu_decrease` after every accepted step (never below `regu_min`) and
/// grows by `regu_increase` after every rejected attempt. The solve stops as
/// non-converged once it exceeds `regu_max` or when `max_retries + 1`
/// attempts of one iteration are all rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverOptions {
    /// Iteration budget (accepted or exhausted iterations).
    pub max_iter: usize,
    /// Converged once an accepted step reduces cost by less than this.
    pub break_cost_redu: f64,
    /// Initial regularization.
    pub regu_init: f64,
    pub regu_min: f64,
    pub regu_max: f64,
    pub regu_decrease: f64,
    pub regu_increase: f64,
    /// Backward-pass retries per iteration after the first attempt.
    pub max_retries: usize,
    /// Line-search step sizes, tried in order.
    pub line_search: Vec<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::offline()
    }
}

impl SolverOptions {
    /// Large budget for the pre-loop swing-up plan.
    pub fn offline() -> Self {
        Self {
            max_iter: 500,
            break_cost_redu: 1e-6,
            regu_init: 100.0,
            regu_min: 1e-6,
            regu_max: 1e10,
            regu_decrease: 0.7,
            regu_increase: 2.0,
            max_retries: 8,
            line_search: vec![1.0, 0.5, 0.25, 0.125],
        }
    }

    /// Single-iteration budget for the per-tick MPC solve.
    pub fn online() -> Self {
        Self {
            max_iter: 1,
            ..Self::offline()
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_break_cost_redu(mut self, threshold: f64) -> Self {
        self.break_cost_redu = threshold;
        self
    }

    pub fn with_regu_init(mut self, regu: f64) -> Self {
        self.regu_init = regu;
        self
    }

    /// # Errors
    ///
    /// `ConfigError::ValidationError` for an empty iteration budget, a
    /// negative or inverted regularization range, non-contracting/expanding
    /// factors, or line-search steps outside `(0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::ValidationError(msg));
        if self.max_iter == 0 {
            return fail("solver.max_iter must be >= 1".to_string());
        }
        if !(self.break_cost_redu.is_finite() && self.break_cost_redu >= 0.0) {
            return fail(format!(
                "solver.break_cost_redu must be >= 0, got {}",
                self.break_cost_redu
            ));
        }
        if !(self.regu_min >= 0.0
            && self.regu_min <= self.regu_init
            && self.regu_init <= self.regu_max
            && self.regu_max.is_finite())
        {
            return fail(format!(
                "solver regularization requires 0 <= regu_min ({}) <= regu_init ({}) <= regu_max ({}) < inf",
                self.regu_min, self.regu_init, self.regu_max
            ));
        }
        if !(self.regu_decrease > 0.0 && self.regu_decrease < 1.0) {
            return fail(format!(
                "solver.regu_decrease must be in (0, 1), got {}",
                self.regu_decrease
            ));
        }
        if !(self.regu_increase > 1.0 && self.regu_increase.is_finite()) {
            return fail(format!(
                "solver.regu_increase must be > 1, got {}",
                self.regu_increase
            ));
        }
        if self.line_search.is_empty() || self.line_search.iter().any(|a| !(*a > 0.0 && *a <= 1.0)) {
            return fail("solver.line_search steps must be non-empty and in (0, 1]".to_string());
        }
        Ok(())
    }
}
