//! Per-attempt solver traces.

/// Why a solve stopped.
///
/// | Exit path | Termination |
/// |-----------|-------------|
/// | accepted step with reduction `< break_cost_redu` | `Converged` |
/// | `max_iter` iterations, each with an accepted step | `IterationBudget` |
/// | `μ > regu_max` after a rejected attempt | `RegularizationExhausted` |
/// | all `max_retries + 1` attempts of one iteration rejected | `RetriesExhausted` |
///
/// The last two are non-convergence: [`IlqrSolver::plan`] turns them into
/// `ControlError::NonConvergence`, the online solve keeps the best trajectory.
///
/// [`IlqrSolver::plan`]: crate::ilqr::IlqrSolver::plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Converged,
    IterationBudget,
    RegularizationExhausted,
    RetriesExhausted,
}

impl Termination {
    /// True for the two non-convergence exits.
    pub const fn is_non_converged(self) -> bool {
        matches!(self, Self::RegularizationExhausted | Self::RetriesExhausted)
    }
}

/// One backward/forward attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationRecord {
    /// Iteration index (several attempts may share one).
    pub iteration: usize,
    /// Regularization used by this attempt's backward pass.
    pub regularization: f64,
    /// Total cost after the attempt (unchanged when rejected).
    pub cost: f64,
    /// Predicted reduction at the tried step; `None` if the backward pass failed.
    pub expected_reduction: Option<f64>,
    /// Actual reduction at the tried step; `None` if the backward pass failed.
    pub reduction: Option<f64>,
    /// Line-search step of the accepted (or last tried) candidate.
    pub step: Option<f64>,
    pub accepted: bool,
}

impl IterationRecord {
    /// Actual over predicted reduction.
    pub fn reduction_ratio(&self) -> Option<f64> {
        match (self.reduction, self.expected_reduction) {
            (Some(actual), Some(expected)) if expected != 0.0 => Some(actual / expected),
            _ => None,
        }
    }
}

/// Diagnostics of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverDiagnostics {
    /// Cost of the warm-start rollout.
    pub initial_cost: f64,
    pub records: Vec<IterationRecord>,
}

impl SolverDiagnostics {
    pub fn new(initial_cost: f64) -> Self {
        Self {
            initial_cost,
            records: Vec::new(),
        }
    }

    /// Initial cost followed by the cost after every accepted step.
    pub fn cost_trace(&self) -> Vec<f64> {
        std::iter::once(self.initial_cost)
            .chain(self.records.iter().filter(|r| r.accepted).map(|r| r.cost))
            .collect()
    }

    pub fn regularization_trace(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.regularization).collect()
    }

    pub fn reduction_ratio_trace(&self) -> Vec<Option<f64>> {
        self.records.iter().map(IterationRecord::reduction_ratio).collect()
    }

    pub fn accepted_count(&self) -> usize {
        self.records.iter().filter(|r| r.accepted).count()
    }

    pub fn rejected_count(&self) -> usize {
        self.records.len() - self.accepted_count()
    }

    /// Cost after the last accepted step, or the initial cost.
    pub fn final_cost(&self) -> f64 {
        self.records
            .iter()
            .rev()
            .find(|r| r.accepted)
            .map_or(self.initial_cost, |r| r.cost)
    }
}
