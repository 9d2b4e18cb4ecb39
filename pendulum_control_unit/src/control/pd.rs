//! PD tracking law with feed-forward torque.
//!
//! `τ = kp·(p_d − p) + kd·(v_d − v) + τ_ff`. An unset set-point contributes no
//! term; an unset feed-forward is zero. Zero kp disables the position term,
//! zero kd the velocity term.

use pendulum_common::control::ControlOutput;
use serde::{Deserialize, Serialize};

/// PD gains applied by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdGains {
    /// Position gain [Nm/rad].
    pub kp: f64,
    /// Velocity gain [Nm·s/rad].
    pub kd: f64,
}

/// Torque command for `output` at the measured state.
///
/// Torque-only outputs pass through unchanged (zero if unset).
///
/// # Returns
/// Unsaturated torque [Nm]; clamping is done by the caller.
#[inline]
pub fn pd_compute(gains: &PdGains, output: &ControlOutput, position: f64, velocity: f64) -> f64 {
    let feed_forward = output.torque.unwrap_or(0.0);
    if !output.needs_tracking() {
        return feed_forward;
    }

    // ── P term ──────────────────────────────────────────────
    let p_term = output
        .position
        .map_or(0.0, |desired| gains.kp * (desired - position));

    // ── D term ──────────────────────────────────────────────
    let d_term = output
        .velocity
        .map_or(0.0, |desired| gains.kd * (desired - velocity));

    p_term + d_term + feed_forward
}

// ─── Tests ──────────────────────────────────────────────────────────
