//! Actuator driver implementations.

pub mod simulation;
