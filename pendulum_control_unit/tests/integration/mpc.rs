//! Integration test: receding-horizon behavior of the iLQR MPC.
//!
//! A converged plan is its own best continuation: re-solving one step later
//! from the planned state, warm-started with the planned controls, must
//! return (almost) the planned second action.

use pendulum_common::pendulum::PendulumParams;
use pendulum_control_unit::controller::{Controller, ControllerConfig, ControllerKind};
use pendulum_control_unit::error::ControlError;
use pendulum_control_unit::ilqr::SolverOptions;
use pendulum_control_unit::model::{CostWeights, StateEncoding};
use pendulum_control_unit::mpc::{IlqrMpc, IlqrMpcConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn stabilizing_config() -> IlqrMpcConfig {
    IlqrMpcConfig {
        horizon: 50,
        dt: 0.02,
        encoding: StateEncoding::Angle,
        weights: CostWeights {
            control: 0.1,
            position: 10.0,
            velocity: 1.0,
            energy: 0.0,
            final_position: 100.0,
            final_velocity: 10.0,
            final_energy: 0.0,
        },
        solver: SolverOptions::offline().with_break_cost_redu(1e-9),
        plan_offline: true,
        goal_position: 0.0,
        goal_velocity: 0.0,
        ..Default::default()
    }
}

fn planned_mpc() -> IlqrMpc {
    let mut mpc = IlqrMpc::new(&stabilizing_config(), &PendulumParams::default()).unwrap();
    mpc.set_goal(0.0, 0.0).unwrap();
    mpc.init(0.3, 0.0).unwrap();
    mpc
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn resolve_from_planned_state_keeps_planned_action() {
    let mut mpc = planned_mpc();
    let plan = mpc.last_outcome().unwrap().clone();
    assert!(!plan.termination.is_non_converged());

    let controls = plan.trajectory.controls.clone();
    let (position, velocity) = mpc.solver().dynamics().decode(&plan.trajectory.states[1]);
    mpc.set_initial_guess(&controls).unwrap();

    let torque = mpc.control(position, velocity).unwrap();
    assert!(
        (torque - controls[1]).abs() < 1e-3,
        "planned {} got {torque}",
        controls[1]
    );
    assert_eq!(mpc.tick_count(), 1);
}

#[test]
fn offline_plan_seeds_the_warm_start() {
    let mpc = planned_mpc();
    let plan = mpc.last_outcome().unwrap();
    assert_eq!(mpc.controls(), plan.trajectory.controls.as_slice());
    assert!(plan.iterations > 1);

    let reference = mpc.planned_reference().unwrap();
    assert_eq!(reference.len(), 50);
    assert_eq!(reference.sample_period(), Some(0.02));
    assert!((reference.samples()[0].position - 0.3).abs() < 1e-12);
    // Stabilizing towards hanging: the final sample is closer to the goal.
    assert!(reference.samples()[49].position.abs() < 0.3);
}

#[test]
fn closed_loop_ticks_keep_horizon_and_limit() {
    let mut mpc = planned_mpc();
    let limit = PendulumParams::default().torque_limit;
    let mut position = 0.3;
    for k in 0..10 {
        let out = mpc
            .get_control_output(position, 0.0, 0.0, 0.02 * k as f64)
            .unwrap();
        let torque = out.torque.unwrap();
        assert!(torque.abs() <= limit);
        assert_eq!(mpc.controls().len(), 50);
        position *= 0.9;
    }
    assert_eq!(mpc.tick_count(), 10);
}

#[test]
fn controller_kind_builds_mpc_with_configured_goal() {
    let config = ControllerConfig::IlqrMpc(IlqrMpcConfig {
        plan_offline: false,
        ..stabilizing_config()
    });
    let mut controller = ControllerKind::from_config(&config, &PendulumParams::default()).unwrap();
    assert_eq!(controller.name(), "ilqr_mpc");
    match &controller {
        ControllerKind::IlqrMpc(mpc) => {
            let goal = mpc.goal().unwrap();
            assert_eq!(goal.as_slice(), &[0.0, 0.0]);
        }
        _ => panic!("expected ilqr_mpc"),
    }
    controller.init(0.3, 0.0).unwrap();
    assert!(controller.get_control_output(0.3, 0.0, 0.0, 0.0).is_ok());
}

#[test]
fn offline_plan_without_goal_fails_before_any_tick() {
    let mut mpc = IlqrMpc::new(&stabilizing_config(), &PendulumParams::default()).unwrap();
    assert!(matches!(
        mpc.init(0.3, 0.0),
        Err(ControlError::Configuration(_))
    ));
    assert_eq!(mpc.tick_count(), 0);
}
