//! Loop-side control laws.
//!
//! Controllers that return position/velocity set-points are tracked by the
//! PD law in [`pd`]; torque-only outputs bypass it.

pub mod pd;
