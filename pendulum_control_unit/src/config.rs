//! Control unit configuration: one TOML file, validated on load.
//!
//! ```toml
//! [shared]
//! service_name = "pendulum-cu"
//!
//! [pendulum]
//! mass = 0.57288
//! length = 0.5
//!
//! [cycle]
//! period = 0.02
//! max_duration = 10.0
//!
//! [actuator]
//! driver = "simulation"
//!
//! [actuator.settings]
//! initial_position = 0.0
//!
//! [controller]
//! kind = "ilqr_mpc"
//! horizon = 50
//! ```

use crate::controller::ControllerConfig;
use pendulum_common::config::{ConfigError, ConfigLoader, SharedConfig};
use pendulum_common::consts::{DEFAULT_DT, DEFAULT_MAX_DURATION};
use pendulum_common::pendulum::{PendulumParams, positive};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ─── Sections ───────────────────────────────────────────────────────

/// `[cycle]` section: loop timing and PD tracking gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CycleConfig {
    /// Control period [s].
    pub period: f64,
    /// Run duration [s].
    pub max_duration: f64,
    /// PD position gain [Nm/rad].
    pub kp: f64,
    /// PD velocity gain [Nm·s/rad].
    pub kd: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_DT,
            max_duration: DEFAULT_MAX_DURATION,
            kp: 10.0,
            kd: 1.0,
        }
    }
}

impl CycleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("cycle.period", self.period)?;
        positive("cycle.max_duration", self.max_duration)?;
        for (name, gain) in [("cycle.kp", self.kp), ("cycle.kd", self.kd)] {
            if !(gain.is_finite() && gain >= 0.0) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be >= 0, got {gain}"
                )));
            }
        }
        Ok(())
    }
}

/// `[actuator]` section: driver name plus driver-specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActuatorConfig {
    /// Registry name of the driver.
    pub driver: String,
    /// Passed verbatim to the driver factory.
    pub settings: toml::Table,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            driver: "simulation".to_string(),
            settings: toml::Table::new(),
        }
    }
}

impl ActuatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "actuator.driver cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete control unit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CuConfig {
    pub shared: SharedConfig,
    pub pendulum: PendulumParams,
    pub cycle: CycleConfig,
    pub actuator: ActuatorConfig,
    pub controller: ControllerConfig,
}

impl CuConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.pendulum.validate()?;
        self.cycle.validate()?;
        self.actuator.validate()?;
        self.controller.validate()
    }
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<CuConfig, ConfigError> {
    let config = CuConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate an in-memory configuration.
pub fn load_config_from_str(content: &str) -> Result<CuConfig, ConfigError> {
    let config = CuConfig::parse(content)?;
    config.validate()?;
    Ok(config)
}

// ─── Tests ──────────────────────────────────────────────────────────
