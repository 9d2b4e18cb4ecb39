//! Actuator trait and error types.
//!
//! This module defines:
//! - `Actuator` trait - Interface the control loop drives every tick
//! - `HalError` enum - Hardware fault taxonomy
//! - `ActuatorFactory` type alias - Factory function type for the driver registry

use crate::hal::types::Measurement;
use crate::pendulum::PendulumParams;
use thiserror::Error;

/// Error types for actuator operations.
///
/// Every variant is fatal for the current run: the control loop never retries
/// inside a tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Reading the joint state failed
    #[error("Actuator read failed: {0}")]
    ReadFailed(String),

    /// Sending a torque command failed
    #[error("Actuator write failed: {0}")]
    WriteFailed(String),

    /// Driver not found in the registry
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
}

/// Factory function type for creating actuator instances.
pub type ActuatorFactory =
    fn(&PendulumParams, &toml::Table) -> Result<Box<dyn Actuator>, HalError>;

/// Interface to the torque-controlled joint.
///
/// # Timing Contracts
///
/// | Operation | Blocking | Counts against tick budget |
/// |-----------|----------|----------------------------|
/// | `read()` | yes | yes |
/// | `write()` | yes | yes |
/// | `shutdown()` | yes | no (after the loop) |
pub trait Actuator: Send {
    /// Returns the driver's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Read position, velocity, torque and timestamp.
    fn read(&mut self) -> Result<Measurement, HalError>;

    /// Command a joint torque [Nm].
    fn write(&mut self, torque: f64) -> Result<(), HalError>;

    /// Release the hardware. Called once after the loop has exited.
    fn shutdown(&mut self) -> Result<(), HalError> {
        Ok(())
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn read(&mut self) -> Result<Measurement, HalError> {
        (**self).read()
    }

    fn write(&mut self, torque: f64) -> Result<(), HalError> {
        (**self).write(torque)
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        (**self).shutdown()
    }
}
