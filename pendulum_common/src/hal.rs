//! Hardware abstraction for the pendulum actuator.
//!
//! The control loop only sees the [`driver::Actuator`] trait; concrete
//! drivers (simulation, motor bus) live in `pendulum_hal`.

pub mod driver;
pub mod types;
