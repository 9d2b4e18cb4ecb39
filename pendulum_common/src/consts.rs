//! Workspace-wide defaults.
//!
//! Single source of truth for numeric defaults shared by the HAL and the
//! control unit.

/// Standard gravity [m/s²].
pub const GRAVITY: f64 = 9.81;

/// Default control period [s] (50 Hz).
pub const DEFAULT_DT: f64 = 0.02;

/// Default run duration of the control loop [s].
pub const DEFAULT_MAX_DURATION: f64 = 10.0;

/// Default actuator torque limit [Nm].
pub const DEFAULT_TORQUE_LIMIT: f64 = 2.0;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pendulum/config.toml";
