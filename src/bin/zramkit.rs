//! zramkit - command-line front door for zram swap devices.
//!
//! Every subcommand prints one JSON document on stdout. Logs go to stderr.
//!
//! Usage:
//!   zramkit status                    # devices and totals
//!   zramkit history                   # samples recorded by zramkitd
//!   zramkit create --size 2G --algo zstd
//!   zramkit remove zram1              # remove one device
//!   zramkit remove                    # remove every device
//!   zramkit priority zram0 50
//!   zramkit check-safety zram0
//!   zramkit restore

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{Level, error};
use tracing_subscriber::EnvFilter;

use zramkit::api::{self, Action, ActionRequest, ActionResponse};
use zramkit::collector::{DeviceInventory, RealFs, SystemCommandRunner};
use zramkit::config::{ConfigStore, DEFAULT_CONFIG_PATH, IniConfigStore, Settings};
use zramkit::history::{HistoryStore, JsonHistoryStore};
use zramkit::manager::DeviceManager;
use zramkit::status::StatusAggregator;

/// Manage zram swap devices.
#[derive(Parser)]
#[command(name = "zramkit", about = "Manage zram swap devices", version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Settings file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// History file written by zramkitd.
    #[arg(long, global = true, default_value = "/var/lib/zramkit/history.json")]
    history_file: PathBuf,

    /// Path to sysfs (for testing/mocking).
    #[arg(long, global = true, default_value = "/sys")]
    sys_path: String,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, global = true, default_value = "/proc")]
    proc_path: String,

    /// Single-line JSON instead of pretty-printed.
    #[arg(long, global = true)]
    compact: bool,

    /// Increase logging verbosity (-v for info, -vv for debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Show devices and aggregate statistics.
    Status,
    /// Show the collector's sample history.
    History,
    /// Create and activate a new device.
    Create {
        /// Device size, e.g. 512M or 2G. Defaults to `swap_size`.
        #[arg(short, long)]
        size: Option<String>,
        /// Compression algorithm. Defaults to `compression_algo`.
        #[arg(short, long)]
        algo: Option<String>,
    },
    /// Remove one device, or all of them when none is named.
    Remove {
        device: Option<String>,
    },
    /// Change a device's swap priority (-1 lets the kernel choose).
    Priority {
        device: String,
        #[arg(allow_negative_numbers = true)]
        prio: i64,
    },
    /// Tell whether removing a device (or all) is safe right now.
    CheckSafety {
        device: Option<String>,
    },
    /// Re-create the devices listed in the settings file.
    Restore,
}

impl Command {
    fn request(&self) -> Option<ActionRequest> {
        let request = match self {
            Command::Status | Command::History => return None,
            Command::Create { size, algo } => ActionRequest {
                size: size.clone(),
                algo: algo.clone(),
                ..ActionRequest::new(Action::Create)
            },
            Command::Remove { device } => ActionRequest {
                device: device.clone(),
                ..ActionRequest::new(Action::Remove)
            },
            Command::Priority { device, prio } => ActionRequest {
                device: Some(device.clone()),
                prio: Some(*prio),
                ..ActionRequest::new(Action::UpdatePriority)
            },
            Command::CheckSafety { device } => ActionRequest {
                device: device.clone(),
                ..ActionRequest::new(Action::CheckSafety)
            },
            Command::Restore => ActionRequest::new(Action::Restore),
        };
        Some(request)
    }
}

fn init_logging(verbose: u8, debug: bool) {
    let level = match verbose.saturating_add(debug as u8) {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("zramkit={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T, compact: bool) {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("zramkit: cannot serialize output: {}", e);
            process::exit(1);
        }
    }
}

/// 0 on success, 1 on failure, 2 when a device was left without swap.
fn exit_code(response: &ActionResponse) -> i32 {
    if response.critical {
        2
    } else if response.success {
        0
    } else {
        1
    }
}

fn main() {
    let args = Args::parse();

    let store = IniConfigStore::new(&args.config);
    let settings = match store.load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("zramkit: {}; using defaults", e);
            Settings::default()
        }
    };
    init_logging(args.verbose, settings.debug);

    let runner = SystemCommandRunner::new(settings.command_timeout());
    let fs = RealFs::new();

    match &args.command {
        Command::Status => {
            let aggregator = StatusAggregator::new(DeviceInventory::new(runner, fs, &args.sys_path));
            print_json(&aggregator.snapshot(), args.compact);
        }
        Command::History => match JsonHistoryStore::new(&args.history_file).load() {
            Ok(samples) => print_json(&samples, args.compact),
            Err(e) => {
                error!(error = %e, "cannot read history");
                process::exit(1);
            }
        },
        command => {
            let Some(request) = command.request() else {
                return;
            };
            let manager =
                DeviceManager::with_paths(runner, fs, store, &args.sys_path, &args.proc_path)
                    .configured(&settings);
            let response = api::dispatch(&manager, &settings, &request);
            print_json(&response, args.compact);
            process::exit(exit_code(&response));
        }
    }
}
