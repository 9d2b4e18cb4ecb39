//! Integration test: control loop against actuators and real controllers.
//!
//! Validates the loop contract end to end:
//! 1. Overrun → counted, next tick starts immediately, no catch-up
//! 2. Read fault / controller error → one zero-torque write, then return
//! 3. Replay of an offline plan reproduces it on the simulated plant

use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use pendulum_common::prelude::*;
use pendulum_control_unit::config::CycleConfig;
use pendulum_control_unit::controller::{
    Controller, ControllerConfig, ControllerKind, GravityCompensation, ReplayConfig, ReplayMode,
    TrajectoryReplay,
};
use pendulum_control_unit::cycle::{Clock, ControlLoop, ManualClock};
use pendulum_control_unit::error::ControlError;
use pendulum_control_unit::ilqr::SolverOptions;
use pendulum_control_unit::model::{CostWeights, StateEncoding};
use pendulum_control_unit::mpc::{IlqrMpc, IlqrMpcConfig};
use pendulum_control_unit::recorder::StopReason;
use pendulum_control_unit::reference::ReferenceTrajectory;
use pendulum_hal::{SimulationActuator, SimulationConfig};
use proptest::prelude::*;
use tempfile::NamedTempFile;

// ── Helpers ─────────────────────────────────────────────────────────

const PERIOD: f64 = 0.02;

fn cycle(max_duration: f64) -> CycleConfig {
    CycleConfig {
        period: PERIOD,
        max_duration,
        kp: 10.0,
        kd: 1.0,
    }
}

fn manual_loop(max_duration: f64, clock: ManualClock) -> ControlLoop<ManualClock> {
    ControlLoop::new(&cycle(max_duration), PendulumParams::default().torque_limit)
        .unwrap()
        .with_clock(clock)
}

fn simulation(initial_position: f64, fail_read_after: Option<u64>) -> SimulationActuator {
    SimulationActuator::new(
        PendulumParams::default(),
        SimulationConfig {
            initial_position,
            dt: PERIOD,
            fail_read_after,
            ..Default::default()
        },
    )
}

/// Fixed measurement; records every command.
#[derive(Default)]
struct Recorder {
    writes: Vec<f64>,
}

impl Actuator for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }
    fn read(&mut self) -> Result<Measurement, HalError> {
        Ok(Measurement::default())
    }
    fn write(&mut self, torque: f64) -> Result<(), HalError> {
        self.writes.push(torque);
        Ok(())
    }
}

/// Constant torque; optionally burns clock time or fails on one tick.
struct Scripted {
    torque: f64,
    calls: usize,
    slow_tick: Option<(usize, ManualClock, Duration)>,
    fail_tick: Option<usize>,
}

impl Scripted {
    fn constant(torque: f64) -> Self {
        Self {
            torque,
            calls: 0,
            slow_tick: None,
            fail_tick: None,
        }
    }
}

impl Controller for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn get_control_output(&mut self, _: f64, _: f64, _: f64, _: f64) -> Result<ControlOutput, ControlError> {
        let call = self.calls;
        self.calls += 1;
        if let Some((tick, clock, busy)) = &self.slow_tick {
            if *tick == call {
                clock.advance(*busy);
            }
        }
        if self.fail_tick == Some(call) {
            return Err(ControlError::Divergence {
                step: call,
                quantity: "state",
            });
        }
        Ok(ControlOutput::torque(self.torque))
    }
}

fn stabilizing_plan() -> ReferenceTrajectory {
    let config = IlqrMpcConfig {
        horizon: 50,
        dt: PERIOD,
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
        solver: SolverOptions::offline().with_max_iter(50),
        goal_position: 0.0,
        ..Default::default()
    };
    let mut mpc = IlqrMpc::new(&config, &PendulumParams::default()).unwrap();
    mpc.set_goal(0.0, 0.0).unwrap();
    mpc.init(0.3, 0.0).unwrap();
    mpc.planned_reference().unwrap()
}

// ── Timing ──────────────────────────────────────────────────────────

#[test]
fn overrun_is_counted_and_next_tick_starts_immediately() {
    let clock = ManualClock::new();
    let mut controller = Scripted {
        slow_tick: Some((2, clock.clone(), Duration::from_millis(30))),
        ..Scripted::constant(0.2)
    };
    let mut actuator = Recorder::default();

    let report = manual_loop(0.1, clock.clone())
        .run(&mut actuator, &mut controller, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Duration);
    assert_eq!(report.stats.overruns, 1);
    let overruns: Vec<bool> = report.ticks.iter().map(|t| t.overrun).collect();
    assert_eq!(overruns, vec![false, false, true, false, false]);

    // Tick 3 starts at 70 ms (end of the slow tick), not 60 ms or 80 ms.
    let times: Vec<f64> = report.ticks.iter().map(|t| t.time).collect();
    for (t, expected) in times.iter().zip([0.0, 0.02, 0.04, 0.07, 0.09]) {
        assert!((t - expected).abs() < 1e-9, "times {times:?}");
    }
    assert!((report.ticks[2].duration - 0.03).abs() < 1e-9);
    assert_eq!(actuator.writes.len(), 6);
    assert_eq!(clock.now(), Duration::from_millis(110));
}

// ── Safe Stop ───────────────────────────────────────────────────────

#[test]
fn read_fault_writes_zero_once_and_returns() {
    let mut actuator = simulation(0.0, Some(3));
    let err = manual_loop(1.0, ManualClock::new())
        .run(&mut actuator, &mut Scripted::constant(0.5), &AtomicBool::new(false))
        .unwrap_err();

    assert!(matches!(err, ControlError::Hardware(HalError::ReadFailed(_))));
    // Three ticks, then the zero command.
    assert_eq!(actuator.write_count(), 4);
    assert_eq!(actuator.applied_torque(), 0.0);
}

#[test]
fn controller_error_stops_loop_without_writing_its_tick() {
    let mut controller = Scripted {
        fail_tick: Some(2),
        ..Scripted::constant(0.4)
    };
    let mut actuator = Recorder::default();
    let err = manual_loop(1.0, ManualClock::new())
        .run(&mut actuator, &mut controller, &AtomicBool::new(false))
        .unwrap_err();

    assert!(matches!(err, ControlError::Divergence { step: 2, .. }));
    assert_eq!(actuator.writes, vec![0.4, 0.4, 0.0]);
}

#[test]
fn initialize_never_writes() {
    let mut actuator = simulation(0.3, None);
    let mut controller = GravityCompensation::new(&PendulumParams::default()).unwrap();
    let m = manual_loop(1.0, ManualClock::new())
        .initialize(&mut actuator, &mut controller)
        .unwrap();
    assert_eq!(m.position, 0.3);
    assert_eq!(actuator.write_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_command_is_clamped_and_run_ends_at_zero(torque in -10.0f64..10.0, ticks in 1usize..20) {
        let limit = PendulumParams::default().torque_limit;
        let mut actuator = Recorder::default();
        let report = manual_loop(PERIOD * ticks as f64 - 1e-6, ManualClock::new())
            .run(&mut actuator, &mut Scripted::constant(torque), &AtomicBool::new(false))
            .unwrap();

        prop_assert_eq!(report.ticks.len(), ticks);
        prop_assert_eq!(actuator.writes.len(), ticks + 1);
        prop_assert!(actuator.writes.iter().all(|u| u.abs() <= limit));
        prop_assert_eq!(actuator.writes.last().copied(), Some(0.0));
    }
}

// ── Controllers on the Simulated Plant ──────────────────────────────

#[test]
fn gravity_compensation_holds_position() {
    let mut actuator = simulation(0.3, None);
    let mut controller = GravityCompensation::new(&PendulumParams::default()).unwrap();
    let report = manual_loop(1.0, ManualClock::new())
        .run(&mut actuator, &mut controller, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(report.ticks.len(), 50);
    for tick in &report.ticks {
        assert!((tick.position - 0.3).abs() < 1e-9);
        assert!(tick.velocity.abs() < 1e-9);
    }
}

#[test]
fn replayed_plan_is_reproduced_by_the_simulation() {
    let plan = stabilizing_plan();
    for mode in [ReplayMode::Torque, ReplayMode::Tracking] {
        let mut actuator = simulation(0.3, None);
        let mut controller = TrajectoryReplay::new(plan.clone(), mode);
        let report = manual_loop(1.0, ManualClock::new())
            .run(&mut actuator, &mut controller, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(report.ticks.len(), plan.len());
        for (tick, sample) in report.ticks.iter().zip(plan.samples()) {
            assert!((tick.position - sample.position).abs() < 1e-9, "{mode:?}");
            assert!((tick.velocity - sample.velocity).abs() < 1e-9, "{mode:?}");
            assert!((tick.command - sample.torque).abs() < 1e-6, "{mode:?}");
        }
    }
}

#[test]
fn replay_controller_loads_plan_from_file() {
    let plan = stabilizing_plan();
    let file = NamedTempFile::new().unwrap();
    plan.write_csv(file.path()).unwrap();

    let config = ControllerConfig::Replay(ReplayConfig {
        path: file.path().to_path_buf(),
        mode: ReplayMode::Torque,
    });
    let mut controller = ControllerKind::from_config(&config, &PendulumParams::default()).unwrap();
    assert_eq!(controller.name(), "replay");

    let mut actuator = simulation(0.3, None);
    let report = manual_loop(1.0, ManualClock::new())
        .run(&mut actuator, &mut controller, &AtomicBool::new(false))
        .unwrap();
    let last = report.last().unwrap();
    assert!((last.position - plan.samples()[49].position).abs() < 1e-9);
}

#[test]
fn recorded_run_can_seed_a_replay() {
    let mut actuator = simulation(0.3, None);
    let mut controller = GravityCompensation::new(&PendulumParams::default()).unwrap();
    let report = manual_loop(0.2, ManualClock::new())
        .run(&mut actuator, &mut controller, &AtomicBool::new(false))
        .unwrap();

    let mut file = NamedTempFile::new().unwrap();
    report.write_to(&mut file).unwrap();
    file.flush().unwrap();

    let replay = TrajectoryReplay::load(file.path(), ReplayMode::Tracking).unwrap();
    assert_eq!(replay.reference().len(), 10);
    assert!((replay.reference().sample_period().unwrap() - PERIOD).abs() < 1e-9);
}
