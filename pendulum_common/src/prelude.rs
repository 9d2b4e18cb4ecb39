//! Prelude module for common re-exports.
//!
//! ```rust
//! use pendulum_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Plant ──────────────────────────────────────────────────────────
pub use crate::pendulum::{Integrator, PendulumParams, PendulumPlant};

// ─── Actuator ───────────────────────────────────────────────────────
pub use crate::hal::driver::{Actuator, HalError};
pub use crate::hal::types::Measurement;

// ─── Control ────────────────────────────────────────────────────────
pub use crate::control::ControlOutput;
pub use crate::consts::{DEFAULT_DT, DEFAULT_MAX_DURATION, GRAVITY};
