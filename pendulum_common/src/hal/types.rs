//! Actuator data types.

/// One sample read from the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurement {
    /// Joint angle [rad].
    pub position: f64,
    /// Joint velocity [rad/s].
    pub velocity: f64,
    /// Measured (or last applied) torque [Nm].
    pub torque: f64,
    /// Actuator-side timestamp [s].
    pub timestamp: f64,
}

impl Measurement {
    /// True if every field is a finite number.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.torque.is_finite()
            && self.timestamp.is_finite()
    }
}
