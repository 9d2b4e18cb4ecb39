//! Central finite-difference differentiation.
//!
//! Used by the default `Dynamics::jacobians` and `Cost::*_derivatives`
//! implementations. Models with closed-form derivatives override those
//! methods; the solver never knows which strategy produced its inputs.

use nalgebra::{DMatrix, DVector};
use pendulum_common::config::ConfigError;
use pendulum_common::pendulum::positive;
use serde::{Deserialize, Serialize};

/// Central finite-difference steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FiniteDifference {
    /// Step for first derivatives.
    pub step: f64,
    /// Step for second derivatives.
    pub hessian_step: f64,
}

impl Default for FiniteDifference {
    fn default() -> Self {
        Self {
            step: 1e-5,
            hessian_step: 1e-4,
        }
    }
}

impl FiniteDifference {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("differentiation.step", self.step)?;
        positive("differentiation.hessian_step", self.hessian_step)
    }

    /// `(∂f/∂x, ∂f/∂u)` of a discrete step `f(x, u)`.
    pub fn jacobians(
        &self,
        f: impl Fn(&DVector<f64>, f64) -> DVector<f64>,
        x: &DVector<f64>,
        u: f64,
    ) -> (DMatrix<f64>, DVector<f64>) {
        let n = x.len();
        let h = self.step;
        let mut a = DMatrix::zeros(n, n);
        let mut shifted = x.clone();
        for j in 0..n {
            shifted[j] = x[j] + h;
            let plus = f(&shifted, u);
            shifted[j] = x[j] - h;
            let minus = f(&shifted, u);
            shifted[j] = x[j];
            a.set_column(j, &((plus - minus) / (2.0 * h)));
        }
        let b = (f(x, u + h) - f(x, u - h)) / (2.0 * h);
        (a, b)
    }

    /// Gradient of a scalar function.
    pub fn gradient(&self, f: impl Fn(&DVector<f64>) -> f64, x: &DVector<f64>) -> DVector<f64> {
        let h = self.step;
        let mut shifted = x.clone();
        DVector::from_fn(x.len(), |i, _| {
            shifted[i] = x[i] + h;
            let plus = f(&shifted);
            shifted[i] = x[i] - h;
            let minus = f(&shifted);
            shifted[i] = x[i];
            (plus - minus) / (2.0 * h)
        })
    }

    /// Symmetric Hessian of a scalar function.
    pub fn hessian(&self, f: impl Fn(&DVector<f64>) -> f64, x: &DVector<f64>) -> DMatrix<f64> {
        let n = x.len();
        let h = self.hessian_step;
        let mut shifted = x.clone();
        let mut eval = |i: usize, di: f64, j: usize, dj: f64| {
            shifted.copy_from(x);
            shifted[i] += di;
            shifted[j] += dj;
            f(&shifted)
        };
        let mut hess = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let v = (eval(i, h, j, h) - eval(i, h, j, -h) - eval(i, -h, j, h)
                    + eval(i, -h, j, -h))
                    / (4.0 * h * h);
                hess[(i, j)] = v;
                hess[(j, i)] = v;
            }
        }
        hess
    }
}
