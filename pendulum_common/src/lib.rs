//! Pendulum Common Library
//!
//! Shared types used by every crate of the pendulum workspace: the physical
//! plant model, the actuator interface the control loop drives, the controller
//! output type, and TOML configuration loading.
//!
//! # Module Structure
//!
//! - [`pendulum`] - Plant parameters, kinematics and continuous dynamics
//! - [`hal`] - Actuator trait, measurements and hardware errors
//! - [`control`] - Controller output shared by all controller variants
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Workspace-wide defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use pendulum_common::prelude::*;
//!
//! let plant = PendulumPlant::new(PendulumParams::default());
//! let (x, y) = plant.forward_kinematics(0.0);
//! assert!(x.abs() < 1e-12 && y < 0.0);
//! ```

pub mod config;
pub mod consts;
pub mod control;
pub mod hal;
pub mod pendulum;
pub mod prelude;
