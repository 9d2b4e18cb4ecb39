//! Driver registry for actuator drivers.
//!
//! Maps a driver name from the `[actuator]` configuration section to a
//! factory. Constructed at startup and passed by value; no global state.

use crate::drivers::simulation::SimulationActuator;
use pendulum_common::hal::driver::{Actuator, ActuatorFactory, HalError};
use pendulum_common::pendulum::PendulumParams;
use std::collections::HashMap;
use tracing::info;

/// Registry of available actuator drivers.
pub struct DriverRegistry {
    factories: HashMap<&'static str, ActuatorFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every driver shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SimulationActuator::NAME, SimulationActuator::factory);
        registry
    }

    /// Register a driver factory, replacing any factory of the same name.
    ///
    /// Returns `true` if a previous factory was replaced.
    pub fn register(&mut self, name: &'static str, factory: ActuatorFactory) -> bool {
        self.factories.insert(name, factory).is_some()
    }

    /// Create an actuator by driver name.
    ///
    /// # Errors
    /// `HalError::DriverNotFound` for an unknown name, or whatever the
    /// driver's factory reports for invalid settings.
    pub fn create(
        &self,
        name: &str,
        params: &PendulumParams,
        settings: &toml::Table,
    ) -> Result<Box<dyn Actuator>, HalError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))?;
        let actuator = factory(params, settings)?;
        info!(driver = name, "Actuator created");
        Ok(actuator)
    }

    /// Registered driver names, sorted.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pendulum_common::hal::types::Measurement;

    struct NullActuator;

    impl Actuator for NullActuator {
        fn name(&self) -> &'static str {
            "null"
        }

        fn read(&mut self) -> Result<Measurement, HalError> {
            Ok(Measurement::default())
        }

        fn write(&mut self, _torque: f64) -> Result<(), HalError> {
            Ok(())
        }
    }

    fn null_factory(_: &PendulumParams, _: &toml::Table) -> Result<Box<dyn Actuator>, HalError> {
        Ok(Box::new(NullActuator))
    }

    #[test]
    fn builtin_registry_provides_simulation() {
        let registry = DriverRegistry::with_builtin();
        assert_eq!(registry.list_drivers(), vec!["simulation"]);

        let actuator = registry
            .create("simulation", &PendulumParams::default(), &toml::Table::new())
            .unwrap();
        assert_eq!(actuator.name(), "simulation");
    }

    #[test]
    fn unknown_driver_is_reported() {
        let registry = DriverRegistry::new();
        let err = registry
            .create("can_bus", &PendulumParams::default(), &toml::Table::new())
            .err()
            .unwrap();
        assert_eq!(err, HalError::DriverNotFound("can_bus".to_string()));
    }

    #[test]
    fn register_replaces_existing_factory() {
        let mut registry = DriverRegistry::with_builtin();
        assert!(!registry.register("null", null_factory));
        assert!(registry.register("null", null_factory));
        assert_eq!(registry.list_drivers(), vec!["null", "simulation"]);
    }
}
