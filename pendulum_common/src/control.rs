//! Controller output shared by all controller variants.

/// Desired set-points returned by a controller for one tick.
///
/// A pure torque controller leaves `position` and `velocity` unset. A tracking
/// controller sets them and the control loop closes a PD law around them,
/// adding `torque` (if any) as feed-forward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlOutput {
    /// Desired position [rad].
    pub position: Option<f64>,
    /// Desired velocity [rad/s].
    pub velocity: Option<f64>,
    /// Desired (or feed-forward) torque [Nm].
    pub torque: Option<f64>,
}

impl ControlOutput {
    /// Torque-only output.
    pub const fn torque(torque: f64) -> Self {
        Self {
            position: None,
            velocity: None,
            torque: Some(torque),
        }
    }

    /// Tracking output with optional feed-forward torque.
    pub const fn tracking(position: f64, velocity: f64, feed_forward: Option<f64>) -> Self {
        Self {
            position: Some(position),
            velocity: Some(velocity),
            torque: feed_forward,
        }
    }

    /// True if the loop must run the PD law for this output.
    pub const fn needs_tracking(&self) -> bool {
        self.position.is_some() || self.velocity.is_some()
    }
}
