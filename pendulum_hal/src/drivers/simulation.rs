//! Simulated pendulum actuator.
//!
//! Integrates the shared [`PendulumPlant`] one control period per torque
//! command, so a control loop running against it sees the same physics the
//! optimizer plans with. A read fault can be injected after a fixed number of
//! reads to exercise the loop's fail-safe path.

use pendulum_common::hal::driver::{Actuator, HalError};
use pendulum_common::hal::types::Measurement;
use pendulum_common::pendulum::{Integrator, PendulumParams, PendulumPlant, positive};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Driver-specific settings from the `[actuator.settings]` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Initial joint angle [rad].
    pub initial_position: f64,
    /// Initial joint velocity [rad/s].
    pub initial_velocity: f64,
    /// Simulated time advanced per `write()` [s].
    pub dt: f64,
    /// Integration sub-steps per `write()`.
    pub substeps: u32,
    /// Integration scheme.
    pub integrator: Integrator,
    /// Fail every `read()` after this many successful reads.
    pub fail_read_after: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_position: 0.0,
            initial_velocity: 0.0,
            dt: pendulum_common::consts::DEFAULT_DT,
            substeps: 1,
            integrator: Integrator::RungeKutta,
            fail_read_after: None,
        }
    }
}

impl SimulationConfig {
    /// Parse settings from a TOML table; an empty table yields the defaults.
    pub fn from_table(table: &toml::Table) -> Result<Self, HalError> {
        let config: Self = table
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| HalError::InitFailed(e.to_string()))?;
        positive("simulation.dt", config.dt).map_err(|e| HalError::InitFailed(e.to_string()))?;
        if config.substeps == 0 {
            return Err(HalError::InitFailed(
                "simulation.substeps must be >= 1".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Software pendulum implementing [`Actuator`].
pub struct SimulationActuator {
    plant: PendulumPlant,
    config: SimulationConfig,
    position: f64,
    velocity: f64,
    applied_torque: f64,
    time: f64,
    reads: u64,
    writes: u64,
}

impl SimulationActuator {
    /// Registry name.
    pub const NAME: &'static str = "simulation";

    /// Create a simulated pendulum at the configured initial state.
    pub fn new(params: PendulumParams, config: SimulationConfig) -> Self {
        info!(
            position = config.initial_position,
            velocity = config.initial_velocity,
            dt = config.dt,
            "Simulation actuator initialized"
        );
        Self {
            plant: PendulumPlant::new(params),
            position: config.initial_position,
            velocity: config.initial_velocity,
            config,
            applied_torque: 0.0,
            time: 0.0,
            reads: 0,
            writes: 0,
        }
    }

    /// [`ActuatorFactory`](pendulum_common::hal::driver::ActuatorFactory) entry point.
    pub fn factory(
        params: &PendulumParams,
        settings: &toml::Table,
    ) -> Result<Box<dyn Actuator>, HalError> {
        let config = SimulationConfig::from_table(settings)?;
        Ok(Box::new(Self::new(*params, config)))
    }

    /// Current `(position, velocity)`.
    pub fn state(&self) -> (f64, f64) {
        (self.position, self.velocity)
    }

    /// Simulated time [s].
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Torque applied during the last step (after clipping).
    pub fn applied_torque(&self) -> f64 {
        self.applied_torque
    }

    /// Number of accepted `write()` calls.
    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl Actuator for SimulationActuator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn read(&mut self) -> Result<Measurement, HalError> {
        if let Some(limit) = self.config.fail_read_after {
            if self.reads >= limit {
                return Err(HalError::ReadFailed(format!(
                    "simulated fault after {limit} reads"
                )));
            }
        }
        self.reads += 1;
        Ok(Measurement {
            position: self.position,
            velocity: self.velocity,
            torque: self.applied_torque,
            timestamp: self.time,
        })
    }

    fn write(&mut self, torque: f64) -> Result<(), HalError> {
        if !torque.is_finite() {
            return Err(HalError::WriteFailed(format!(
                "refusing non-finite torque {torque}"
            )));
        }
        self.applied_torque = self.plant.clip_torque(torque);
        let h = self.config.dt / f64::from(self.config.substeps);
        for _ in 0..self.config.substeps {
            (self.position, self.velocity) = self.plant.step(
                self.config.integrator,
                self.position,
                self.velocity,
                self.applied_torque,
                h,
            );
        }
        self.time += self.config.dt;
        self.writes += 1;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        debug!(
            reads = self.reads,
            writes = self.writes,
            time = self.time,
            "Simulation actuator shut down"
        );
        Ok(())
    }
}
