//! iLQR solver.

use super::diagnostics::{IterationRecord, SolverDiagnostics, Termination};
use super::options::SolverOptions;
use super::trajectory::{Gains, Trajectory};
use crate::error::ControlError;
use crate::model::{Cost, Dynamics};
use nalgebra::DVector;
use tracing::{debug, info, trace, warn};

/// Result of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    /// Best trajectory found; the warm-start rollout if no step was accepted.
    pub trajectory: Trajectory,
    /// Gains of the last accepted step.
    pub gains: Option<Gains>,
    /// Total cost of `trajectory`.
    pub cost: f64,
    pub termination: Termination,
    /// Iterations started.
    pub iterations: usize,
    /// Regularization when the solve stopped.
    pub regularization: f64,
    pub diagnostics: SolverDiagnostics,
}

/// Predicted reduction `α·linear + α²·quadratic` from the backward pass.
#[derive(Debug, Clone, Copy, Default)]
struct ExpectedReduction {
    linear: f64,
    quadratic: f64,
}

impl ExpectedReduction {
    #[inline]
    fn at(&self, alpha: f64) -> f64 {
        alpha * self.linear + alpha * alpha * self.quadratic
    }
}

/// Outcome of a line search over one set of gains.
enum LineSearch {
    Accepted {
        trajectory: Trajectory,
        cost: f64,
        alpha: f64,
        reduction: f64,
    },
    Rejected {
        alpha: f64,
        reduction: f64,
    },
}

/// iLQR solver bound to one dynamics/cost pair.
///
/// Representation-agnostic: it only sees state vectors, scalar torques and
/// the `Dynamics`/`Cost` contracts.
pub struct IlqrSolver {
    dynamics: Box<dyn Dynamics>,
    cost: Box<dyn Cost>,
}

impl IlqrSolver {
    pub fn new(dynamics: Box<dyn Dynamics>, cost: Box<dyn Cost>) -> Self {
        Self { dynamics, cost }
    }

    pub fn dynamics(&self) -> &dyn Dynamics {
        self.dynamics.as_ref()
    }

    pub fn cost(&self) -> &dyn Cost {
        self.cost.as_ref()
    }

    /// Simulate `controls` (clipped) from `x0`.
    ///
    /// # Errors
    /// `ControlError::Divergence` on the first non-finite state.
    pub fn rollout(&self, x0: &DVector<f64>, controls: &[f64]) -> Result<Trajectory, ControlError> {
        let controls: Vec<f64> = controls.iter().map(|&u| self.dynamics.clip(u)).collect();
        let mut states = Vec::with_capacity(controls.len() + 1);
        states.push(x0.clone());
        for (t, &u) in controls.iter().enumerate() {
            let next = self.dynamics.discrete_step(&states[t], u);
            if !is_finite(&next) {
                return Err(ControlError::Divergence {
                    step: t + 1,
                    quantity: "state",
                });
            }
            states.push(next);
        }
        Ok(Trajectory { states, controls })
    }

    /// Sum of stage costs plus the terminal cost.
    ///
    /// # Errors
    /// `ControlError::Divergence` if the total is not finite.
    pub fn total_cost(
        &self,
        trajectory: &Trajectory,
        goal: &DVector<f64>,
    ) -> Result<f64, ControlError> {
        let stage: f64 = trajectory
            .states
            .iter()
            .zip(&trajectory.controls)
            .map(|(x, &u)| self.cost.stage_cost(x, u, goal))
            .sum();
        let total = stage + self.cost.final_cost(trajectory.final_state(), goal);
        if total.is_finite() {
            Ok(total)
        } else {
            Err(ControlError::Divergence {
                step: trajectory.horizon(),
                quantity: "cost",
            })
        }
    }

    /// Run the iLQR state machine from `x0` with `warm_start` controls.
    ///
    /// The horizon is `warm_start.len()`. The solve stops when an accepted
    /// step reduces the cost by less than `break_cost_redu` (`Converged`),
    /// after `max_iter` iterations (`IterationBudget`), when `μ` exceeds
    /// `regu_max` (`RegularizationExhausted`), or when every attempt of one
    /// iteration is rejected (`RetriesExhausted`). Non-convergence is
    /// reported through [`SolveOutcome::termination`]; use
    /// [`plan`](Self::plan) to turn it into an error.
    ///
    /// # Errors
    /// - `ControlError::Configuration` for invalid options or mismatched dimensions
    /// - `ControlError::Divergence` for a non-finite state or cost in any rollout
    pub fn solve(
        &self,
        x0: &DVector<f64>,
        goal: &DVector<f64>,
        warm_start: &[f64],
        options: &SolverOptions,
    ) -> Result<SolveOutcome, ControlError> {
        options.validate()?;
        self.check_problem(x0, goal, warm_start)?;

        let mut trajectory = self.rollout(x0, warm_start)?;
        let mut cost = self.total_cost(&trajectory, goal)?;
        let mut diagnostics = SolverDiagnostics::new(cost);
        let mut regu = options.regu_init;
        let mut gains = None;
        let mut termination = Termination::IterationBudget;
        let mut iterations = 0;

        'iterations: for iteration in 0..options.max_iter {
            iterations = iteration + 1;
            let mut step = None;

            for _ in 0..=options.max_retries {
                let mut record = IterationRecord {
                    iteration,
                    regularization: regu,
                    cost,
                    expected_reduction: None,
                    reduction: None,
                    step: None,
                    accepted: false,
                };

                if let Some((candidate_gains, expected)) =
                    self.backward_pass(&trajectory, goal, regu)
                {
                    match self.line_search(&trajectory, &candidate_gains, cost, goal, options)? {
                        LineSearch::Accepted {
                            trajectory: candidate,
                            cost: candidate_cost,
                            alpha,
                            reduction,
                        } => {
                            record.expected_reduction = Some(expected.at(alpha));
                            record.reduction = Some(reduction);
                            record.step = Some(alpha);
                            record.cost = candidate_cost;
                            record.accepted = true;
                            step = Some((candidate, candidate_cost, candidate_gains, reduction));
                        }
                        LineSearch::Rejected { alpha, reduction } => {
                            record.expected_reduction = Some(expected.at(alpha));
                            record.reduction = Some(reduction);
                            record.step = Some(alpha);
                        }
                    }
                }

                trace!(
                    iteration,
                    regu = record.regularization,
                    accepted = record.accepted,
                    reduction = ?record.reduction,
                    "iLQR attempt"
                );
                diagnostics.records.push(record);
                if step.is_some() {
                    break;
                }
                regu *= options.regu_increase;
                if regu > options.regu_max {
                    termination = Termination::RegularizationExhausted;
                    break 'iterations;
                }
            }

            let Some((candidate, candidate_cost, candidate_gains, reduction)) = step else {
                termination = Termination::RetriesExhausted;
                break;
            };
            trajectory = candidate;
            cost = candidate_cost;
            gains = Some(candidate_gains);
            regu = (regu * options.regu_decrease).max(options.regu_min);
            if reduction < options.break_cost_redu {
                termination = Termination::Converged;
                break;
            }
        }

        debug!(
            horizon = trajectory.horizon(),
            iterations,
            cost,
            regu,
            ?termination,
            "iLQR solve finished"
        );
        Ok(SolveOutcome {
            trajectory,
            gains,
            cost,
            termination,
            iterations,
            regularization: regu,
            diagnostics,
        })
    }

    /// Offline planning: [`solve`](Self::solve) where exhausted
    /// regularization or retries is an error carrying the best trajectory.
    ///
    /// # Errors
    /// As `solve`, plus `ControlError::NonConvergence`.
    pub fn plan(
        &self,
        x0: &DVector<f64>,
        goal: &DVector<f64>,
        warm_start: &[f64],
        options: &SolverOptions,
    ) -> Result<SolveOutcome, ControlError> {
        let outcome = self.solve(x0, goal, warm_start, options)?;
        match outcome.termination {
            Termination::Converged => {
                info!(
                    iterations = outcome.iterations,
                    cost = outcome.cost,
                    "Offline plan converged"
                );
                Ok(outcome)
            }
            Termination::IterationBudget => {
                warn!(
                    iterations = outcome.iterations,
                    cost = outcome.cost,
                    "Offline plan hit its iteration budget before converging"
                );
                Ok(outcome)
            }
            Termination::RegularizationExhausted | Termination::RetriesExhausted => {
                Err(ControlError::NonConvergence {
                    termination: outcome.termination,
                    regularization: outcome.regularization,
                    iterations: outcome.iterations,
                    best_cost: outcome.cost,
                    best: Box::new(outcome.trajectory),
                })
            }
        }
    }

    fn check_problem(
        &self,
        x0: &DVector<f64>,
        goal: &DVector<f64>,
        warm_start: &[f64],
    ) -> Result<(), ControlError> {
        let n = self.dynamics.state_dim();
        if warm_start.is_empty() {
            return Err(ControlError::Configuration(
                "horizon must be >= 1".to_string(),
            ));
        }
        if x0.len() != n || goal.len() != n {
            return Err(ControlError::Configuration(format!(
                "state dimension mismatch: dynamics {n}, initial state {}, goal {}",
                x0.len(),
                goal.len()
            )));
        }
        if !is_finite(goal) {
            return Err(ControlError::Configuration(
                "goal state must be finite".to_string(),
            ));
        }
        if !is_finite(x0) {
            return Err(ControlError::Divergence {
                step: 0,
                quantity: "state",
            });
        }
        Ok(())
    }

    /// Quadratic value-function recursion from the terminal step.
    ///
    /// Returns `None` if `Q_uu + μ` is not positive or a gain is not finite.
    fn backward_pass(
        &self,
        trajectory: &Trajectory,
        goal: &DVector<f64>,
        regu: f64,
    ) -> Option<(Gains, ExpectedReduction)> {
        let n = self.dynamics.state_dim();
        let horizon = trajectory.horizon();
        let terminal = self.cost.final_derivatives(trajectory.final_state(), goal);
        let mut v_x = terminal.l_x;
        let mut v_xx = terminal.l_xx;
        let mut feedforward = vec![0.0; horizon];
        let mut feedback = vec![DVector::zeros(n); horizon];
        let mut expected = ExpectedReduction::default();

        for t in (0..horizon).rev() {
            let x = &trajectory.states[t];
            let u = trajectory.controls[t];
            let l = self.cost.stage_derivatives(x, u, goal);
            let (a, b) = self.dynamics.jacobians(x, u);

            let v_xx_a = &v_xx * &a;
            let q_x = &l.l_x + a.tr_mul(&v_x);
            let q_u = l.l_u + b.dot(&v_x);
            let q_xx = &l.l_xx + a.tr_mul(&v_xx_a);
            let q_ux = &l.l_ux + v_xx_a.tr_mul(&b);
            let q_uu = l.l_uu + b.dot(&(&v_xx * &b));

            let q_uu_reg = q_uu + regu;
            if !(q_uu_reg.is_finite() && q_uu_reg > 0.0) {
                return None;
            }
            let k = -q_u / q_uu_reg;
            let big_k = &q_ux * (-1.0 / q_uu_reg);
            if !(k.is_finite() && is_finite(&big_k)) {
                return None;
            }

            v_x = q_x + &big_k * (q_uu * k + q_u) + &q_ux * k;
            let v_xx_next = q_xx
                + (&big_k * big_k.transpose()) * q_uu
                + &big_k * q_ux.transpose()
                + &q_ux * big_k.transpose();
            v_xx = (&v_xx_next + v_xx_next.transpose()) * 0.5;

            expected.linear += -q_u * k;
            expected.quadratic += -0.5 * k * k * q_uu;
            feedforward[t] = k;
            feedback[t] = big_k;
        }

        Some((
            Gains {
                feedforward,
                feedback,
            },
            expected,
        ))
    }

    /// Closed-loop rollout of `gains` around `nominal` with step `alpha`.
    fn forward_pass(
        &self,
        nominal: &Trajectory,
        gains: &Gains,
        alpha: f64,
    ) -> Result<Trajectory, ControlError> {
        let horizon = nominal.horizon();
        let mut states = Vec::with_capacity(horizon + 1);
        let mut controls = Vec::with_capacity(horizon);
        states.push(nominal.states[0].clone());
        for t in 0..horizon {
            let dx = &states[t] - &nominal.states[t];
            let u = self
                .dynamics
                .clip(gains.control(t, nominal.controls[t], alpha, &dx));
            let next = self.dynamics.discrete_step(&states[t], u);
            if !is_finite(&next) {
                return Err(ControlError::Divergence {
                    step: t + 1,
                    quantity: "state",
                });
            }
            controls.push(u);
            states.push(next);
        }
        Ok(Trajectory { states, controls })
    }

    /// Try the configured step sizes in order; accept the first that lowers
    /// the cost.
    fn line_search(
        &self,
        nominal: &Trajectory,
        gains: &Gains,
        cost: f64,
        goal: &DVector<f64>,
        options: &SolverOptions,
    ) -> Result<LineSearch, ControlError> {
        let mut last = LineSearch::Rejected {
            alpha: 0.0,
            reduction: 0.0,
        };
        for &alpha in &options.line_search {
            let candidate = self.forward_pass(nominal, gains, alpha)?;
            let candidate_cost = self.total_cost(&candidate, goal)?;
            let reduction = cost - candidate_cost;
            if reduction > 0.0 {
                return Ok(LineSearch::Accepted {
                    trajectory: candidate,
                    cost: candidate_cost,
                    alpha,
                    reduction,
                });
            }
            last = LineSearch::Rejected { alpha, reduction };
        }
        Ok(last)
    }
}

#[inline]
fn is_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

// ─── Tests ──────────────────────────────────────────────────────────
