//! Integration test: offline swing-up from hanging to upright.
//!
//! Horizon 50 at 0.05 s (2.5 s of motion) with only terminal position and
//! velocity weights. The torque limit is well below `m·g·l`, so the plan has
//! to pump energy before it can reach the top.

use std::f64::consts::PI;

use pendulum_common::pendulum::{Integrator, PendulumParams};
use pendulum_control_unit::ilqr::{IlqrSolver, SolverOptions, Termination};
use pendulum_control_unit::model::{CostWeights, FiniteDifference, StateEncoding, build_model};

// ── Helpers ─────────────────────────────────────────────────────────

const HORIZON: usize = 50;
const DT: f64 = 0.05;

fn swing_up_solver(encoding: StateEncoding) -> IlqrSolver {
    let weights = CostWeights {
        control: 0.1,
        position: 0.0,
        velocity: 0.0,
        energy: 0.0,
        final_position: 1000.0,
        final_velocity: 300.0,
        final_energy: 0.0,
    };
    let (dynamics, cost) = build_model(
        encoding,
        &PendulumParams::default(),
        DT,
        Integrator::RungeKutta,
        weights,
        FiniteDifference::default(),
    )
    .unwrap();
    IlqrSolver::new(dynamics, cost)
}

fn options() -> SolverOptions {
    SolverOptions::offline()
        .with_regu_init(100.0)
        .with_break_cost_redu(0.1)
}

/// Signed angular distance to upright, in `(-π, π]`.
fn upright_error(angle: f64) -> f64 {
    let e = (angle - PI).rem_euclid(2.0 * PI);
    if e > PI { e - 2.0 * PI } else { e }
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn cos_sin_plan_reaches_upright() {
    let solver = swing_up_solver(StateEncoding::CosSin);
    let x0 = solver.dynamics().encode(0.0, 0.0);
    let goal = solver.dynamics().encode(PI, 0.0);

    let outcome = solver
        .plan(&x0, &goal, &[0.5; HORIZON], &options())
        .unwrap();

    assert_eq!(outcome.termination, Termination::Converged);
    let (angle, velocity) = solver.dynamics().decode(outcome.trajectory.final_state());
    assert!(upright_error(angle).abs() < 0.05, "final angle {angle}");
    assert!(velocity.abs() < 0.1, "final velocity {velocity}");

    let limit = PendulumParams::default().torque_limit;
    assert!(outcome.trajectory.controls.iter().all(|u| u.abs() <= limit));
}

#[test]
fn accepted_steps_strictly_reduce_cost() {
    let solver = swing_up_solver(StateEncoding::CosSin);
    let x0 = solver.dynamics().encode(0.0, 0.0);
    let goal = solver.dynamics().encode(PI, 0.0);

    let outcome = solver
        .plan(&x0, &goal, &[0.5; HORIZON], &options())
        .unwrap();
    let trace = outcome.diagnostics.cost_trace();

    assert!(trace.len() > 2);
    assert!(trace.windows(2).all(|w| w[1] < w[0]), "trace {trace:?}");
    assert_eq!(*trace.last().unwrap(), outcome.cost);
    assert!(outcome.cost < 0.05 * outcome.diagnostics.initial_cost);

    let recomputed = solver.total_cost(&outcome.trajectory, &goal).unwrap();
    assert!((recomputed - outcome.cost).abs() < 1e-9 * outcome.cost.max(1.0));
}

#[test]
fn angle_encoding_plan_swings_up() {
    let solver = swing_up_solver(StateEncoding::Angle);
    let x0 = solver.dynamics().encode(0.0, 0.0);
    let goal = solver.dynamics().encode(PI, 0.0);

    let outcome = solver
        .plan(&x0, &goal, &[0.5; HORIZON], &options())
        .unwrap();

    assert!(outcome.cost < 0.1 * outcome.diagnostics.initial_cost);
    let (angle, _) = solver.dynamics().decode(outcome.trajectory.final_state());
    assert!(upright_error(angle).abs() < 0.3, "final angle {angle}");
}

#[test]
fn plan_is_deterministic() {
    let solver = swing_up_solver(StateEncoding::CosSin);
    let x0 = solver.dynamics().encode(0.0, 0.0);
    let goal = solver.dynamics().encode(PI, 0.0);

    let a = solver.plan(&x0, &goal, &[0.5; HORIZON], &options()).unwrap();
    let b = solver.plan(&x0, &goal, &[0.5; HORIZON], &options()).unwrap();
    assert_eq!(a.trajectory, b.trajectory);
    assert_eq!(a.iterations, b.iterations);
}
