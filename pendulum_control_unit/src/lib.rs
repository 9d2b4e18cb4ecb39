//! # Pendulum Control Unit Library
//!
//! Swing-up and stabilization of a torque-limited pendulum. An iterative LQR
//! solver plans over a finite horizon; a model-predictive wrapper re-solves
//! once per tick from the measured state; a fixed-period loop reads the
//! actuator, queries the controller and writes the torque command.
//!
//! ## Layers
//!
//! 1. **model** - Discrete dynamics and costs on `(angle, velocity)` or
//!    `(cos, sin, velocity)` states
//! 2. **ilqr** - Representation-agnostic trajectory optimizer
//! 3. **mpc / controller** - Controllers queried by the loop
//! 4. **cycle** - Real-time loop with overrun accounting and safe stop
//!
//! ## Safe Stop
//!
//! Configuration and planning errors surface before the loop starts, so the
//! actuator is never written. Once the loop runs, every exit writes zero
//! torque exactly once.

pub mod config;
pub mod control;
pub mod controller;
pub mod cycle;
pub mod error;
pub mod ilqr;
pub mod model;
pub mod mpc;
pub mod recorder;
pub mod reference;
