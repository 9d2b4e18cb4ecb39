//! Integration test: configuration file → wired control unit.
//!
//! Mirrors the startup sequence of the binary: load and validate one TOML
//! file, create the actuator through the driver registry, build the
//! controller and the loop, initialize, run.

use std::io::Write;
use std::sync::atomic::AtomicBool;

use pendulum_common::config::ConfigError;
use pendulum_common::hal::driver::HalError;
use pendulum_control_unit::config::{load_config, load_config_from_str};
use pendulum_control_unit::controller::{Controller, ControllerConfig, ControllerKind};
use pendulum_control_unit::cycle::{ControlLoop, ManualClock};
use pendulum_control_unit::error::ControlError;
use pendulum_control_unit::recorder::StopReason;
use pendulum_hal::DriverRegistry;
use tempfile::NamedTempFile;

const HOLDING: &str = r#"
[shared]
service_name = "pendulum-test"

[pendulum]
mass = 0.57288
length = 0.5
torque_limit = 2.0

[cycle]
period = 0.02
max_duration = 0.5

[actuator]
driver = "simulation"

[actuator.settings]
initial_position = 0.4
dt = 0.02

[controller]
kind = "gravity_compensation"
"#;

const MPC: &str = r#"
[cycle]
period = 0.02
max_duration = 0.2

[actuator.settings]
initial_position = 0.2

[controller]
kind = "ilqr_mpc"
horizon = 20
dt = 0.02
encoding = "angle"
goal_position = 0.0
plan_offline = true

[controller.solver]
max_iter = 30

[controller.weights]
control = 0.1
position = 10.0
velocity = 1.0
final_position = 100.0
final_velocity = 10.0
"#;

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn file_config_drives_a_full_run() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(HOLDING.as_bytes()).unwrap();
    file.flush().unwrap();
    let config = load_config(file.path()).unwrap();

    let registry = DriverRegistry::with_builtin();
    let mut actuator = registry
        .create(&config.actuator.driver, &config.pendulum, &config.actuator.settings)
        .unwrap();
    let mut controller = ControllerKind::from_config(&config.controller, &config.pendulum).unwrap();
    let mut control_loop = ControlLoop::new(&config.cycle, config.pendulum.torque_limit)
        .unwrap()
        .with_clock(ManualClock::new());

    let initial = control_loop
        .initialize(actuator.as_mut(), &mut controller)
        .unwrap();
    assert_eq!(initial.position, 0.4);

    let report = control_loop
        .run(actuator.as_mut(), &mut controller, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(report.stop_reason, StopReason::Duration);
    assert_eq!(report.ticks.len(), 25);
    assert!((report.last().unwrap().position - 0.4).abs() < 1e-9);
}

#[test]
fn mpc_config_plans_before_the_loop() {
    let config = load_config_from_str(MPC).unwrap();
    let mut actuator = DriverRegistry::with_builtin()
        .create(&config.actuator.driver, &config.pendulum, &config.actuator.settings)
        .unwrap();
    let mut controller = ControllerKind::from_config(&config.controller, &config.pendulum).unwrap();
    let mut control_loop = ControlLoop::new(&config.cycle, config.pendulum.torque_limit)
        .unwrap()
        .with_clock(ManualClock::new());

    control_loop
        .initialize(actuator.as_mut(), &mut controller)
        .unwrap();
    match &controller {
        ControllerKind::IlqrMpc(mpc) => {
            assert_eq!(mpc.horizon(), 20);
            assert!(mpc.last_outcome().is_some());
            assert_eq!(mpc.tick_count(), 0);
        }
        _ => panic!("expected ilqr_mpc"),
    }

    let report = control_loop
        .run(actuator.as_mut(), &mut controller, &AtomicBool::new(false))
        .unwrap();
    assert_eq!(report.ticks.len(), 10);
    // Torque-only controller: no set-points recorded.
    assert!(report.ticks.iter().all(|t| t.desired_position.is_none()));
    assert!(report.ticks.iter().all(|t| t.desired_torque == Some(t.command)));
}

#[test]
fn invalid_configs_fail_before_the_actuator_is_touched() {
    assert!(matches!(
        load_config_from_str("[cycle]\nperiod = -0.02\n"),
        Err(ConfigError::ValidationError(_))
    ));
    assert!(matches!(
        load_config_from_str("[controller]\nkind = \"pid\"\n"),
        Err(ConfigError::ParseError(_))
    ));

    let config = load_config_from_str("[actuator]\ndriver = \"ethercat\"\n").unwrap();
    let err = DriverRegistry::with_builtin()
        .create(&config.actuator.driver, &config.pendulum, &config.actuator.settings)
        .err()
        .unwrap();
    assert!(matches!(err, HalError::DriverNotFound(ref name) if name == "ethercat"));

    let config = load_config_from_str("[actuator.settings]\nsubsteps = 0\n").unwrap();
    assert!(matches!(
        DriverRegistry::with_builtin().create(
            &config.actuator.driver,
            &config.pendulum,
            &config.actuator.settings
        ),
        Err(HalError::InitFailed(_))
    ));
}

#[test]
fn missing_replay_file_is_a_trajectory_error() {
    let config = load_config_from_str(
        "[controller]\nkind = \"replay\"\npath = \"/nonexistent/plan.csv\"\n",
    )
    .unwrap();
    assert!(matches!(config.controller, ControllerConfig::Replay(_)));
    let err = ControllerKind::from_config(&config.controller, &config.pendulum)
        .err()
        .unwrap();
    assert!(matches!(err, ControlError::Trajectory(_)));
}

#[test]
fn controller_names_follow_config_kind() {
    let params = load_config_from_str("").unwrap().pendulum;
    let gravity = ControllerKind::from_config(&ControllerConfig::GravityCompensation, &params).unwrap();
    assert_eq!(gravity.name(), "gravity_compensation");
}
