//! zramkitd - zram metrics collector daemon.
//!
//! Samples memory saved and device load at a fixed interval and keeps a
//! bounded history on disk. Only one instance runs per host; a second one
//! exits immediately. With `--restore` the persisted devices are re-created
//! before collection starts.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use zramkit::collector::{DeviceInventory, InstanceLock, ProcfsProbe, RealFs, SystemCommandRunner};
use zramkit::config::{ConfigStore, DEFAULT_CONFIG_PATH, IniConfigStore, Settings};
use zramkit::history::JsonHistoryStore;
use zramkit::manager::{DeviceManager, OpLog};
use zramkit::metrics::MetricsCollector;

/// zram metrics collector daemon.
#[derive(Parser)]
#[command(name = "zramkitd", about = "zram metrics collector daemon", version)]
struct Args {
    /// Collection interval in seconds. Overrides `collector_interval`.
    #[arg(short, long)]
    interval: Option<u64>,

    /// Settings file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// History file, rewritten after every sample.
    #[arg(long, default_value = "/var/lib/zramkit/history.json")]
    history_file: PathBuf,

    /// Pid file guarding against a second collector.
    #[arg(long, default_value = "/run/zramkit/collector.pid")]
    pid_file: PathBuf,

    /// Number of samples kept. Overrides `history_points`.
    #[arg(long)]
    capacity: Option<usize>,

    /// Re-create the persisted devices before collecting.
    #[arg(long)]
    restore: bool,

    /// Path to sysfs (for testing/mocking).
    #[arg(long, default_value = "/sys")]
    sys_path: String,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// `debug="yes"` in the settings file counts as one `-v`.
fn init_logging(verbose: u8, quiet: bool, debug: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose.saturating_add(debug as u8) {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["zramkitd", "zramkit"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();

    let store = IniConfigStore::new(&args.config);
    let (settings, config_error) = match store.load() {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    init_logging(args.verbose, args.quiet, settings.debug);

    info!("zramkitd {} starting", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        warn!(error = %e, "using default settings");
    }

    let interval = args
        .interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| settings.collector_interval());
    let capacity = args.capacity.unwrap_or(settings.history_points);
    info!(
        "Config: interval={}s, capacity={}, history={}, timeout={}ms",
        interval.as_secs(),
        capacity,
        args.history_file.display(),
        settings.command_timeout_ms
    );

    let runner = SystemCommandRunner::new(settings.command_timeout());
    let fs = RealFs::new();

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let lock = InstanceLock::new(&args.pid_file, ProcfsProbe::new(fs, &args.proc_path));
    let mut collector = MetricsCollector::new(
        DeviceInventory::new(runner.clone(), fs, &args.sys_path),
        JsonHistoryStore::new(&args.history_file),
        capacity,
    )
    .with_interval(interval);

    // Devices are restored only by the instance holding the pid file.
    let restore = || {
        if !args.restore {
            return;
        }
        let manager = DeviceManager::with_paths(
            runner.clone(),
            fs,
            store.clone(),
            &args.sys_path,
            &args.proc_path,
        )
        .configured(&settings);
        match manager.restore(&mut OpLog::new()) {
            Ok(created) if created.is_empty() => info!("No devices to restore"),
            Ok(created) => info!("Restored {}", created.join(", ")),
            Err(e) => error!(error = %e, "restore failed"),
        }
    };

    match collector.run(&lock, process::id(), &running, restore) {
        Ok(samples) => info!("Shutdown complete after {} samples", samples),
        Err(e) => {
            error!("Collector failed: {}", e);
            process::exit(1);
        }
    }
}
