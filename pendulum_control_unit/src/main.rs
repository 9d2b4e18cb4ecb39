//! # Pendulum Control Unit
//!
//! Loads one TOML configuration, creates the actuator through the driver
//! registry and the configured controller, runs the offline plan (if any),
//! performs RT setup and enters the fixed-period control loop.

use clap::Parser;
use pendulum_common::consts::DEFAULT_CONFIG_PATH;
use pendulum_control_unit::config::{CuConfig, load_config};
use pendulum_control_unit::controller::{Controller, ControllerKind};
use pendulum_control_unit::cycle::{ControlLoop, rt_setup};
use pendulum_hal::DriverRegistry;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Pendulum Control Unit - iLQR swing-up and real-time control loop
#[derive(Parser, Debug)]
#[command(name = "pendulum_cu")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Model-predictive swing-up control for a torque-limited pendulum")]
struct Args {
    /// Path to the configuration TOML.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override `cycle.max_duration` [s].
    #[arg(long)]
    duration: Option<f64>,

    /// Override `shared.log_level` (any EnvFilter directive).
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Run the offline plan and exit without entering the loop.
    #[arg(long)]
    plan_only: bool,

    /// Write the run (or, with --plan-only, the plan) as CSV.
    #[arg(long, value_name = "CSV")]
    record: Option<PathBuf>,

    /// CPU core to pin the loop thread to.
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority.
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}: {e}", args.config.display());
            process::exit(1);
        }
    };
    setup_tracing(&args, &config);

    info!(
        "Pendulum Control Unit v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Pendulum Control Unit shutdown complete");
}

fn run(args: &Args, mut config: CuConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(duration) = args.duration {
        config.cycle.max_duration = duration;
        config.cycle.validate()?;
    }

    let registry = DriverRegistry::with_builtin();
    let mut actuator = registry.create(
        &config.actuator.driver,
        &config.pendulum,
        &config.actuator.settings,
    )?;
    let mut controller = ControllerKind::from_config(&config.controller, &config.pendulum)?;
    let mut control_loop = ControlLoop::new(&config.cycle, config.pendulum.torque_limit)?;

    // Offline planning happens here, before anything is written.
    control_loop.initialize(actuator.as_mut(), &mut controller)?;

    if args.plan_only {
        match &controller {
            ControllerKind::IlqrMpc(mpc) => match (mpc.planned_reference(), &args.record) {
                (Some(plan), Some(path)) => {
                    plan.write_csv(path)?;
                    info!(path = %path.display(), samples = plan.len(), "Plan written");
                }
                (None, _) => warn!("No offline plan was computed (controller.plan_offline = false)"),
                _ => {}
            },
            other => warn!(controller = other.name(), "Controller has no offline plan"),
        }
        actuator.shutdown()?;
        return Ok(());
    }

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.store(true, Ordering::SeqCst);
    })?;

    let result = control_loop.run(actuator.as_mut(), &mut controller, &stop);
    if let Err(e) = actuator.shutdown() {
        warn!("Actuator shutdown failed: {e}");
    }
    let report = result?;

    if let Some(path) = &args.record {
        report.write_csv(path)?;
        info!(path = %path.display(), ticks = report.ticks.len(), "Run recorded");
    }
    Ok(())
}

/// Setup tracing subscriber from the CLI override or `shared.log_level`.
fn setup_tracing(args: &Args, config: &CuConfig) {
    let directive = args
        .log_level
        .as_deref()
        .unwrap_or(config.shared.log_level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
