//! Fixed-period control loop: read → control → write.
//!
//! ## RT Setup
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)` - lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity` - pin to one CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, priority)`.
//!
//! ## Tick
//! Read the actuator, ask the controller for its output at the elapsed time,
//! close the PD law if the output carries set-points, clamp and write, then
//! sleep for the rest of the period. A tick that runs past its period is an
//! overrun: it is counted and the next tick starts immediately, without
//! catching up on the missed one.
//!
//! ## Exit
//! The loop stops when `max_duration` elapses, the stop flag is set, the
//! actuator faults or the controller fails. Every exit path writes zero torque
//! exactly once before returning.

use crate::config::CycleConfig;
use crate::control::pd::{PdGains, pd_compute};
use crate::controller::Controller;
use crate::error::ControlError;
use crate::recorder::{RunReport, StopReason, TickRecord};
use pendulum_common::hal::driver::{Actuator, HalError};
use pendulum_common::hal::types::Measurement;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleStats {
    /// Total ticks executed.
    pub cycle_count: u64,
    /// Last tick busy time [ns].
    pub last_cycle_ns: i64,
    /// Minimum tick busy time [ns].
    pub min_cycle_ns: i64,
    /// Maximum tick busy time [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Maximum wake-up latency [ns] (time between scheduled and actual start).
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a tick duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average tick time [ns] (returns 0 if no ticks).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

/// Rate limit for repeated warnings: the first 10, then every 1000th.
#[inline]
pub(crate) fn log_throttled(count: u64) -> bool {
    count <= 10 || count % 1000 == 0
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Errors during RT setup.
#[derive(Debug, Clone, Error)]
pub enum CycleError {
    /// RT system call failed.
    #[error("RT setup error: {0}")]
    RtSetup(String),
}

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the solver's first deep call does not fault.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Perform the RT setup sequence before entering the loop.
///
/// Without the `rt` feature every system call is a no-op.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Clocks ─────────────────────────────────────────────────────────

/// Time source driving the loop.
pub trait Clock {
    /// Time since a fixed origin.
    fn now(&self) -> Duration;

    /// Block until `deadline` (same origin); returns at once if it has passed.
    fn sleep_until(&self, deadline: Duration);
}

/// Wall-clock time from [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        if let Some(remaining) = deadline.checked_sub(self.now()) {
            std::thread::sleep(remaining);
        }
    }
}

/// Clock that only moves when advanced or slept on.
///
/// Clones share the same time, so a simulated workload can advance the clock
/// the loop reads. Used for faster-than-real-time runs and tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `d`.
    pub fn advance(&self, d: Duration) {
        self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn sleep_until(&self, deadline: Duration) {
        self.nanos
            .fetch_max(deadline.as_nanos() as u64, Ordering::SeqCst);
    }
}

// ─── Control Loop ───────────────────────────────────────────────────

/// Fixed-period loop bound to one configuration and clock.
pub struct ControlLoop<C: Clock = MonotonicClock> {
    period: Duration,
    max_duration: Duration,
    gains: PdGains,
    torque_limit: f64,
    clock: C,
}

impl ControlLoop<MonotonicClock> {
    /// # Errors
    /// `Configuration` for an invalid period, duration, gains or torque limit.
    pub fn new(config: &CycleConfig, torque_limit: f64) -> Result<Self, ControlError> {
        config.validate()?;
        if !(torque_limit.is_finite() && torque_limit > 0.0) {
            return Err(ControlError::Configuration(format!(
                "torque limit must be > 0, got {torque_limit}"
            )));
        }
        Ok(Self {
            period: Duration::from_secs_f64(config.period),
            max_duration: Duration::from_secs_f64(config.max_duration),
            gains: PdGains {
                kp: config.kp,
                kd: config.kd,
            },
            torque_limit,
            clock: MonotonicClock::new(),
        })
    }
}

impl<C: Clock> ControlLoop<C> {
    /// Replace the time source.
    pub fn with_clock<D: Clock>(self, clock: D) -> ControlLoop<D> {
        ControlLoop {
            period: self.period,
            max_duration: self.max_duration,
            gains: self.gains,
            torque_limit: self.torque_limit,
            clock,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Read the initial state and hand it to `controller.init`.
    ///
    /// Nothing is written to the actuator.
    pub fn initialize(
        &self,
        actuator: &mut dyn Actuator,
        controller: &mut dyn Controller,
    ) -> Result<Measurement, ControlError> {
        let m = read_finite(actuator)?;
        controller.init(m.position, m.velocity)?;
        info!(
            controller = controller.name(),
            position = m.position,
            velocity = m.velocity,
            "Controller initialized"
        );
        Ok(m)
    }

    /// Run until the duration elapses, `stop` is set, or an error occurs.
    ///
    /// # Errors
    /// The first hardware fault or controller error. In every case one
    /// zero-torque command has been written before this returns.
    pub fn run(
        &mut self,
        actuator: &mut dyn Actuator,
        controller: &mut dyn Controller,
        stop: &AtomicBool,
    ) -> Result<RunReport, ControlError> {
        let expected_ticks = (self.max_duration.as_secs_f64() / self.period.as_secs_f64()).ceil();
        let mut report = RunReport {
            ticks: Vec::with_capacity(expected_ticks.min(1e6) as usize + 1),
            ..Default::default()
        };
        info!(
            period_s = self.period.as_secs_f64(),
            max_duration_s = self.max_duration.as_secs_f64(),
            actuator = actuator.name(),
            controller = controller.name(),
            "Entering control loop"
        );

        let result = self.run_ticks(actuator, controller, stop, &mut report);
        let safe_stop = actuator.write(0.0);

        match (result, safe_stop) {
            (Ok(reason), Ok(())) => {
                report.stop_reason = reason;
                info!(
                    ?reason,
                    ticks = report.stats.cycle_count,
                    overruns = report.stats.overruns,
                    avg_tick_us = report.stats.avg_cycle_ns() / 1000,
                    max_tick_us = report.stats.max_cycle_ns / 1000,
                    "Control loop finished"
                );
                Ok(report)
            }
            (Ok(_), Err(e)) => {
                error!("Zero-torque write failed: {e}");
                Err(e.into())
            }
            (Err(e), safe_stop) => {
                if let Err(w) = safe_stop {
                    error!("Zero-torque write failed: {w}");
                }
                error!(ticks = report.stats.cycle_count, "Control loop stopped: {e}");
                Err(e)
            }
        }
    }

    fn run_ticks(
        &mut self,
        actuator: &mut dyn Actuator,
        controller: &mut dyn Controller,
        stop: &AtomicBool,
        report: &mut RunReport,
    ) -> Result<StopReason, ControlError> {
        let start = self.clock.now();
        let mut scheduled = start;

        loop {
            if stop.load(Ordering::SeqCst) {
                info!("Stop requested");
                return Ok(StopReason::StopRequested);
            }
            let tick_start = self.clock.now();
            let elapsed = tick_start.saturating_sub(start);
            if elapsed >= self.max_duration {
                return Ok(StopReason::Duration);
            }
            let latency = tick_start.saturating_sub(scheduled);

            let mut record = self.tick(actuator, controller, elapsed.as_secs_f64(), report.ticks.len())?;

            let tick_end = self.clock.now();
            let busy = tick_end.saturating_sub(tick_start);
            report
                .stats
                .record(busy.as_nanos() as i64, latency.as_nanos() as i64);
            record.duration = busy.as_secs_f64();

            scheduled = tick_start + self.period;
            if tick_end > scheduled {
                record.overrun = true;
                report.stats.overruns += 1;
                if log_throttled(report.stats.overruns) {
                    warn!(
                        tick = report.ticks.len(),
                        busy_us = busy.as_micros() as u64,
                        period_us = self.period.as_micros() as u64,
                        overruns = report.stats.overruns,
                        "Tick overran its period"
                    );
                }
                scheduled = tick_end;
            } else {
                self.clock.sleep_until(scheduled);
            }
            report.ticks.push(record);
        }
    }

    /// One read → control → write step. Nothing is written on error.
    fn tick(
        &self,
        actuator: &mut dyn Actuator,
        controller: &mut dyn Controller,
        time: f64,
        index: usize,
    ) -> Result<TickRecord, ControlError> {
        let m = read_finite(actuator)?;
        let output = controller.get_control_output(m.position, m.velocity, m.torque, time)?;
        let torque = pd_compute(&self.gains, &output, m.position, m.velocity);
        if !torque.is_finite() {
            return Err(ControlError::Divergence {
                step: index,
                quantity: "torque",
            });
        }
        let command = torque.clamp(-self.torque_limit, self.torque_limit);
        actuator.write(command)?;

        Ok(TickRecord {
            time,
            position: m.position,
            velocity: m.velocity,
            measured_torque: m.torque,
            desired_position: output.position,
            desired_velocity: output.velocity,
            desired_torque: output.torque,
            command,
            duration: 0.0,
            overrun: false,
        })
    }
}

fn read_finite(actuator: &mut dyn Actuator) -> Result<Measurement, ControlError> {
    let m = actuator.read()?;
    if !m.is_finite() {
        return Err(HalError::ReadFailed(format!("non-finite measurement {m:?}")).into());
    }
    Ok(m)
}

// ─── Tests ──────────────────────────────────────────────────────────
