//! Receding-horizon iLQR controller.
//!
//! Every tick the previous control sequence is shifted by one step (drop the
//! first action, repeat the last), the solver is anchored at the measured
//! state and runs one online iteration, and the first action of the result is
//! returned. An optional offline plan seeds the sequence before the loop
//! starts.

use crate::controller::Controller;
use crate::cycle::log_throttled;
use crate::error::ControlError;
use crate::ilqr::trajectory::{fit_controls, shift_controls};
use crate::ilqr::{IlqrSolver, SolveOutcome, SolverOptions};
use crate::model::{CostWeights, FiniteDifference, StateEncoding, build_model};
use crate::reference::{ReferenceTrajectory, TrajectorySample};
use nalgebra::DVector;
use pendulum_common::config::ConfigError;
use pendulum_common::consts::DEFAULT_DT;
use pendulum_common::control::ControlOutput;
use pendulum_common::pendulum::{Integrator, PendulumParams, positive};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Constant warm-start torque [Nm].
///
/// An all-zero sequence is a stationary point of the swing-up problem on
/// `(cos, sin, velocity)` states: the backward pass returns zero gains.
pub const DEFAULT_INITIAL_TORQUE: f64 = 0.5;

/// `[controller]` settings for `kind = "ilqr_mpc"`.
///
/// # TOML Example
///
/// ```toml
/// [controller]
/// kind = "ilqr_mpc"
/// horizon = 50
/// dt = 0.05
/// encoding = "cos_sin"
/// online_max_iter = 1
///
/// [controller.solver]
/// max_iter = 500
/// break_cost_redu = 0.1
///
/// [controller.weights]
/// control = 0.1
/// final_position = 1000.0
/// final_velocity = 300.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IlqrMpcConfig {
    /// Number of control steps.
    pub horizon: usize,
    /// Model step [s]; may differ from the loop period.
    pub dt: f64,
    pub encoding: StateEncoding,
    pub integrator: Integrator,
    pub weights: CostWeights,
    pub differentiation: FiniteDifference,
    /// Offline settings; the online solve reuses them with `online_max_iter`.
    pub solver: SolverOptions,
    /// Iteration budget of the per-tick solve.
    pub online_max_iter: usize,
    /// Warm-start torque when no initial guess is given [Nm].
    pub initial_torque: f64,
    /// Trajectory file whose torque column seeds the warm start.
    pub initial_guess: Option<PathBuf>,
    /// Run the offline plan from the initial state before the first tick.
    pub plan_offline: bool,
    /// Goal angle [rad].
    pub goal_position: f64,
    /// Goal velocity [rad/s].
    pub goal_velocity: f64,
}

impl Default for IlqrMpcConfig {
    fn default() -> Self {
        Self {
            horizon: 50,
            dt: DEFAULT_DT,
            encoding: StateEncoding::default(),
            integrator: Integrator::default(),
            weights: CostWeights::default(),
            differentiation: FiniteDifference::default(),
            solver: SolverOptions::offline(),
            online_max_iter: 1,
            initial_torque: DEFAULT_INITIAL_TORQUE,
            initial_guess: None,
            plan_offline: true,
            goal_position: PI,
            goal_velocity: 0.0,
        }
    }
}

impl IlqrMpcConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::ValidationError(
                "controller.horizon must be >= 1".to_string(),
            ));
        }
        if self.online_max_iter == 0 {
            return Err(ConfigError::ValidationError(
                "controller.online_max_iter must be >= 1".to_string(),
            ));
        }
        positive("controller.dt", self.dt)?;
        if !self.initial_torque.is_finite() {
            return Err(ConfigError::ValidationError(
                "controller.initial_torque must be finite".to_string(),
            ));
        }
        if !(self.goal_position.is_finite() && self.goal_velocity.is_finite()) {
            return Err(ConfigError::ValidationError(
                "controller goal must be finite".to_string(),
            ));
        }
        self.weights.validate()?;
        self.differentiation.validate()?;
        self.solver.validate()
    }

    /// Per-tick solver settings.
    pub fn online_options(&self) -> SolverOptions {
        self.solver.clone().with_max_iter(self.online_max_iter)
    }
}

/// iLQR model-predictive controller.
pub struct IlqrMpc {
    solver: IlqrSolver,
    horizon: usize,
    offline: SolverOptions,
    online: SolverOptions,
    initial_torque: f64,
    plan_offline: bool,
    goal: Option<DVector<f64>>,
    initial_state: Option<DVector<f64>>,
    /// Warm start of the next solve.
    controls: Vec<f64>,
    last_outcome: Option<SolveOutcome>,
    ticks: u64,
    non_converged: u64,
}

impl IlqrMpc {
    /// Build the model and solver from configuration.
    ///
    /// The goal is not taken from `config`; call [`set_goal`](Self::set_goal).
    pub fn new(config: &IlqrMpcConfig, params: &PendulumParams) -> Result<Self, ControlError> {
        config.validate()?;
        let (dynamics, cost) = build_model(
            config.encoding,
            params,
            config.dt,
            config.integrator,
            config.weights,
            config.differentiation,
        )?;
        let mut mpc = Self::from_parts(
            IlqrSolver::new(dynamics, cost),
            config.horizon,
            config.solver.clone(),
            config.online_options(),
        )?
        .with_initial_torque(config.initial_torque)
        .with_offline_plan(config.plan_offline);
        if let Some(path) = &config.initial_guess {
            mpc.load_initial_guess(path)?;
        }
        info!(
            horizon = config.horizon,
            dt = config.dt,
            encoding = ?config.encoding,
            "iLQR MPC created"
        );
        Ok(mpc)
    }

    /// Assemble from an existing solver.
    pub fn from_parts(
        solver: IlqrSolver,
        horizon: usize,
        offline: SolverOptions,
        online: SolverOptions,
    ) -> Result<Self, ControlError> {
        if horizon == 0 {
            return Err(ControlError::Configuration(
                "horizon must be >= 1".to_string(),
            ));
        }
        offline.validate()?;
        online.validate()?;
        Ok(Self {
            solver,
            horizon,
            offline,
            online,
            initial_torque: DEFAULT_INITIAL_TORQUE,
            plan_offline: false,
            goal: None,
            initial_state: None,
            controls: vec![DEFAULT_INITIAL_TORQUE; horizon],
            last_outcome: None,
            ticks: 0,
            non_converged: 0,
        })
    }

    /// Replace the constant warm start.
    pub fn with_initial_torque(mut self, torque: f64) -> Self {
        self.initial_torque = torque;
        self.controls = vec![torque; self.horizon];
        self
    }

    /// Plan offline in [`init`](Self::init).
    pub fn with_offline_plan(mut self, enabled: bool) -> Self {
        self.plan_offline = enabled;
        self
    }

    pub fn set_goal(&mut self, position: f64, velocity: f64) -> Result<(), ControlError> {
        if !(position.is_finite() && velocity.is_finite()) {
            return Err(ControlError::Configuration(format!(
                "goal must be finite, got ({position}, {velocity})"
            )));
        }
        self.goal = Some(self.solver.dynamics().encode(position, velocity));
        debug!(position, velocity, "MPC goal set");
        Ok(())
    }

    /// Anchor the offline plan at `(position, velocity)` and, if enabled, run it.
    pub fn init(&mut self, position: f64, velocity: f64) -> Result<(), ControlError> {
        self.initial_state = Some(self.solver.dynamics().encode(position, velocity));
        if self.plan_offline {
            let options = self.offline.clone();
            self.compute_initial_guess(&options)?;
        }
        Ok(())
    }

    /// Use `controls` as the warm start, truncated or padded to the horizon.
    pub fn set_initial_guess(&mut self, controls: &[f64]) -> Result<(), ControlError> {
        if let Some(i) = controls.iter().position(|u| !u.is_finite()) {
            return Err(ControlError::Configuration(format!(
                "initial guess has a non-finite torque at step {i}"
            )));
        }
        if controls.len() != self.horizon {
            debug!(
                given = controls.len(),
                horizon = self.horizon,
                "Fitting initial guess to horizon"
            );
        }
        self.controls = fit_controls(controls, self.horizon, self.initial_torque);
        Ok(())
    }

    /// Warm start from the torque column of a trajectory file.
    pub fn load_initial_guess(&mut self, path: &Path) -> Result<(), ControlError> {
        let reference = ReferenceTrajectory::load(path)?;
        self.set_initial_guess(&reference.torques())?;
        info!(path = %path.display(), samples = reference.len(), "Initial guess loaded");
        Ok(())
    }

    /// Offline solve from the initial state; the result becomes the warm start.
    ///
    /// # Errors
    /// `Configuration` without a goal or initial state, otherwise as
    /// [`IlqrSolver::plan`].
    pub fn compute_initial_guess(
        &mut self,
        options: &SolverOptions,
    ) -> Result<&SolveOutcome, ControlError> {
        let goal = self.goal.as_ref().ok_or_else(missing_goal)?;
        let x0 = self.initial_state.as_ref().ok_or_else(|| {
            ControlError::Configuration(
                "init must be called before computing an initial guess".to_string(),
            )
        })?;
        let outcome = self.solver.plan(x0, goal, &self.controls, options)?;
        info!(
            iterations = outcome.iterations,
            cost = outcome.cost,
            termination = ?outcome.termination,
            "Initial guess computed"
        );
        self.controls.clone_from(&outcome.trajectory.controls);
        Ok(self.last_outcome.insert(outcome))
    }

    /// One receding-horizon step from the measured state; returns the torque.
    pub fn control(&mut self, position: f64, velocity: f64) -> Result<f64, ControlError> {
        let goal = self.goal.as_ref().ok_or_else(missing_goal)?;
        let x = self.solver.dynamics().encode(position, velocity);
        let warm_start = shift_controls(&self.controls);
        let outcome = self.solver.solve(&x, goal, &warm_start, &self.online)?;

        self.ticks += 1;
        if outcome.termination.is_non_converged() {
            self.non_converged += 1;
            if log_throttled(self.non_converged) {
                warn!(
                    tick = self.ticks,
                    count = self.non_converged,
                    regu = outcome.regularization,
                    "Online solve did not converge, keeping best trajectory"
                );
            }
        }
        let torque = outcome.trajectory.first_control();
        self.controls.clone_from(&outcome.trajectory.controls);
        self.last_outcome = Some(outcome);
        Ok(torque)
    }

    /// Last solved trajectory as `(time, position, velocity, torque)` samples
    /// spaced by the model step; `None` before the first solve.
    pub fn planned_reference(&self) -> Option<ReferenceTrajectory> {
        let trajectory = &self.last_outcome.as_ref()?.trajectory;
        let dynamics = self.solver.dynamics();
        let samples = trajectory
            .states
            .iter()
            .zip(&trajectory.controls)
            .enumerate()
            .map(|(k, (state, &torque))| {
                let (position, velocity) = dynamics.decode(state);
                TrajectorySample {
                    time: k as f64 * dynamics.dt(),
                    position,
                    velocity,
                    torque,
                }
            })
            .collect();
        ReferenceTrajectory::from_samples(samples).ok()
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Current warm start (the last solution).
    pub fn controls(&self) -> &[f64] {
        &self.controls
    }

    pub fn goal(&self) -> Option<&DVector<f64>> {
        self.goal.as_ref()
    }

    pub fn solver(&self) -> &IlqrSolver {
        &self.solver
    }

    pub fn last_outcome(&self) -> Option<&SolveOutcome> {
        self.last_outcome.as_ref()
    }

    /// Online solves run so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Online solves that ended without convergence (regularization or
    /// retries exhausted).
    pub fn non_converged_count(&self) -> u64 {
        self.non_converged
    }
}

fn missing_goal() -> ControlError {
    ControlError::Configuration("set_goal must be called before solving".to_string())
}

impl Controller for IlqrMpc {
    fn name(&self) -> &'static str {
        "ilqr_mpc"
    }

    fn init(&mut self, position: f64, velocity: f64) -> Result<(), ControlError> {
        IlqrMpc::init(self, position, velocity)
    }

    fn set_goal(&mut self, position: f64, velocity: f64) -> Result<(), ControlError> {
        IlqrMpc::set_goal(self, position, velocity)
    }

    fn get_control_output(
        &mut self,
        position: f64,
        velocity: f64,
        _torque: f64,
        _time: f64,
    ) -> Result<ControlOutput, ControlError> {
        self.control(position, velocity).map(ControlOutput::torque)
    }
}
