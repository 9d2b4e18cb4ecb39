//! # Pendulum HAL Library
//!
//! Actuator drivers behind the `Actuator` trait defined in
//! `pendulum_common::hal::driver`.
//!
//! # Module Structure
//!
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   read / write   ┌──────────────────────┐
//! │  Control loop        │◄────────────────►│  dyn Actuator        │
//! │  (control unit)      │                  │  (trait object)      │
//! └──────────────────────┘                  └──────────┬───────────┘
//!                                                      │ created by
//!                                           ┌──────────▼───────────┐
//!                                           │  DriverRegistry      │
//!                                           └──────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod driver_registry;
pub mod drivers;

pub use crate::driver_registry::DriverRegistry;
pub use crate::drivers::simulation::{SimulationActuator, SimulationConfig};
