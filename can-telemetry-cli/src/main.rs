//! CAN Telemetry Dashboard CLI
//!
//! Command-line consumer of the can-telemetry library. It:
//! - Builds a bus controller from config.toml and command-line flags
//! - Polls the bus on a worker thread
//! - Prints a dashboard line (or JSON object) on every refresh
//! - Can run against simulated vehicle traffic (`--virtual`)

use anyhow::Result;
use can_telemetry::{BusError, Controller, SharedTelemetry};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod config;
mod report;
mod simulate;

use config::{AppConfig, DisplayConfig, OutputFormat};

/// CAN Telemetry - live dashboard for the vehicle CAN bus
#[derive(Parser, Debug)]
#[command(name = "can-telemetry-cli")]
#[command(about = "Decode and display live vehicle telemetry from a CAN bus", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CAN interface to open (overrides the config file)
    #[arg(short, long, value_name = "IFACE")]
    interface: Option<String>,

    /// Use an in-process virtual bus with simulated vehicle traffic
    #[arg(long = "virtual")]
    virtual_bus: bool,

    /// Skip the `ip link` bring-up step
    #[arg(long)]
    no_bring_up: bool,

    /// Print JSON objects instead of dashboard lines
    #[arg(long)]
    json: bool,

    /// Dashboard refresh period in milliseconds
    #[arg(long, value_name = "MS")]
    refresh_ms: Option<u64>,

    /// Stop after this many dashboard refreshes
    #[arg(long, value_name = "COUNT")]
    max_refreshes: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Telemetry CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using can-telemetry library v{}", can_telemetry::VERSION);

    let config = resolve_config(&args)?;
    log::debug!("Effective configuration: {:?}", config);

    let stop = Arc::new(AtomicBool::new(false));

    let (controller, simulator) = if args.virtual_bus {
        let (controller, bus) = Controller::open_virtual(config.bus.clone());
        (controller, Some(simulate::spawn(bus, stop.clone())))
    } else {
        (open_hardware(&config)?, None)
    };

    run_dashboard(controller, &config.display, args.max_refreshes, stop.clone())?;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = simulator {
        if handle.join().is_err() {
            log::error!("Simulator thread panicked");
        }
    }
    Ok(())
}

/// Merge the config file (if any) with command-line overrides
fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(interface) = &args.interface {
        config.bus.interface = interface.clone();
    }
    if args.no_bring_up || args.virtual_bus {
        config.bus.bring_up = false;
    }
    if args.json {
        config.display.format = OutputFormat::Json;
    }
    if let Some(refresh_ms) = args.refresh_ms {
        config.display.refresh_ms = refresh_ms;
    }
    if args.virtual_bus && args.interface.is_none() {
        config.bus.interface = "vcan-sim".to_string();
    }

    Ok(config)
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
fn open_hardware(config: &AppConfig) -> Result<Controller> {
    use can_telemetry::transport::{IpLinkBringUp, SocketCanConnector};
    Ok(Controller::open(
        config.bus.clone(),
        SocketCanConnector,
        IpLinkBringUp::new(),
    ))
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
fn open_hardware(config: &AppConfig) -> Result<Controller> {
    anyhow::bail!(
        "cannot open {}: built without SocketCAN support (rebuild with --features socketcan, or use --virtual)",
        config.bus.interface
    )
}

/// Poll on a worker thread, print snapshots on this one
fn run_dashboard(
    mut controller: Controller,
    display: &DisplayConfig,
    max_refreshes: Option<usize>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    let shared = SharedTelemetry::new();
    controller.publish_to(&shared);

    let publisher = shared.clone();
    let worker_stop = stop.clone();
    let reconnect = display.reconnect();
    let worker = thread::Builder::new()
        .name("can-poller".to_string())
        .spawn(move || {
            while !worker_stop.load(Ordering::SeqCst) {
                match controller.poll() {
                    Ok(_) => controller.publish_to(&publisher),
                    Err(BusError::NotReady) => {
                        controller.publish_to(&publisher);
                        if !sleep_unless_stopped(reconnect, &worker_stop) {
                            break;
                        }
                        match controller.reinitialize() {
                            Ok(()) => log::info!("CAN bus reconnected"),
                            Err(e) => log::warn!("Reconnect failed: {}", e),
                        }
                    }
                    Err(e) => log::warn!("Bus error: {}", e),
                }
            }
            controller.shutdown();
        })?;

    let mut refreshes = 0usize;
    while max_refreshes.map_or(true, |max| refreshes < max) {
        thread::sleep(display.refresh());

        let snapshot = shared.latest();
        match display.format {
            OutputFormat::Text => println!("{}", report::render_text(&snapshot)),
            OutputFormat::Json => println!("{}", report::render_json(&snapshot, Utc::now())?),
        }
        refreshes += 1;
    }

    stop.store(true, Ordering::SeqCst);
    if worker.join().is_err() {
        log::error!("Poller thread panicked");
    }
    Ok(())
}

/// Sleep in short slices, returning `false` as soon as `stop` is set
fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) -> bool {
    const SLICE: Duration = Duration::from_millis(20);

    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(SLICE.min(deadline - now));
    }
    false
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
