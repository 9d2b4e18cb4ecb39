//! Iterative LQR / DDP trajectory optimizer.
//!
//! ```text
//! rollout ─► backward pass ─► forward pass (line search) ─► accept?
//!    ▲          ▲   │ Q_uu + μ not invertible        │ yes: μ ← max(μ·0.7, μ_min)
//!    │          └───┴──────── μ ← 2μ ◄───────────────┤ no
//!    └───────────────────────────────────────────────┘
//! ```
//!
//! The same state machine runs in two modes: an offline plan with a large
//! iteration budget ([`SolverOptions::offline`]) and a per-tick online solve
//! with a budget of one ([`SolverOptions::online`]).

pub mod diagnostics;
pub mod options;
pub mod solver;
pub mod trajectory;

pub use diagnostics::{IterationRecord, SolverDiagnostics, Termination};
pub use options::SolverOptions;
pub use solver::{IlqrSolver, SolveOutcome};
pub use trajectory::{Gains, Trajectory};
