//! `tipsy-cli` – Tipsy Command Line Interface
//!
//! Runs the behavior engine headless against the simulated robot:
//!
//! 1. Loads `~/.tipsy/config.toml` (or defaults) and applies environment
//!    overrides.
//! 2. Builds a [`SimRobot`] with the configured base name and sensor count.
//! 3. Runs the [`Supervisor`] until **Ctrl-C** (or `--duration` elapses),
//!    printing motion faults as they happen.
//! 4. Stops the base and prints the shutdown report.

mod config;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tipsy_hal::SimRobot;
use tipsy_middleware::{LocomotionBus, Topic};
use tipsy_runtime::{Supervisor, SupervisorReport, init_tracing};
use tipsy_types::{LocomotionPayload, TipsyError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Run Tipsy's behavior engine against the simulated robot.
#[derive(Parser, Debug, PartialEq)]
#[command(name = "tipsy")]
#[command(about = "Behavior arbitration engine for the Tipsy robot", long_about = None)]
#[command(version)]
struct Args {
    /// Stop after SECS seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS", value_parser = parse_duration)]
    duration: Option<Duration>,

    /// Print the shutdown report as JSON
    #[arg(long)]
    json: bool,

    /// Write the current configuration to ~/.tipsy/config.toml and exit
    #[arg(long)]
    init: bool,
}

/// Non-negative, finite seconds.
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{raw}' is not a valid duration"))
}

fn main() -> ExitCode {
    let args = Args::parse();

    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters, TIPSY_LOG_FORMAT=json switches to JSON lines, and
    // OTEL_EXPORTER_OTLP_ENDPOINT enables span export.
    let _tracing = init_tracing("tipsy");

    if !args.json {
        print_banner();
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            if !args.json {
                println!(
                    "  Config loaded from {}",
                    config::config_path().display().to_string().bold()
                );
            }
            cfg
        }
        Ok(None) => config::from_env(),
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            config::from_env()
        }
    };

    if args.init {
        return match config::save(&cfg) {
            Ok(()) => {
                println!(
                    "  {} Config saved to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – stopping the base …".yellow().bold()
        );
        cancel_on_signal.cancel();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use --duration to bound the run");
    }

    if !args.json {
        println!(
            "  Running on simulated base {} with {} ranging sensor(s). Press {} to stop.\n",
            cfg.base_name.bold(),
            cfg.behavior.sensor_count,
            "Ctrl-C".bold().cyan()
        );
    }

    match runtime.block_on(run(cfg, args.duration, cancel)) {
        Ok(report) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("{}: {}", "Failed to encode report".red(), e),
                }
            } else {
                print_report(&report);
            }
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Failed to start Tipsy".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cfg: config::Config,
    duration: Option<Duration>,
    cancel: CancellationToken,
) -> Result<SupervisorReport, TipsyError> {
    let sim = SimRobot::builder()
        .with_base_id(cfg.base_name.clone())
        .with_ranging_sensors(cfg.behavior.sensor_count)
        .build();
    let bus = LocomotionBus::default();
    let supervisor = Supervisor::new(cfg.behavior, sim.robot(), bus.clone())?;

    let mut faults = bus.subscribe_topic(Topic::Faults);
    tokio::spawn(async move {
        while let Some(event) = faults.recv().await {
            if let LocomotionPayload::MotionFault { intent, error } = event.payload {
                eprintln!(
                    "  {} {} failed: {}",
                    "✗".red().bold(),
                    intent.kind(),
                    error.to_string().red()
                );
            }
        }
    });

    if let Some(duration) = duration {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            cancel.cancel();
        });
    }

    Ok(supervisor.run(cancel).await)
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"  _____ _                 "#.bold().cyan());
    println!("{}", r#" |_   _(_)_ __  ___ _   _ "#.bold().cyan());
    println!("{}", r#"   | | | | '_ \/ __| | | |"#.bold().cyan());
    println!("{}", r#"   | | | | |_) \__ \ |_| |"#.bold().cyan());
    println!("{}", r#"   |_| |_| .__/|___/\__, |"#.bold().cyan());
    println!("{}", r#"         |_|        |___/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Tipsy".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Behavior arbitration engine");
    println!();
}

fn print_report(report: &SupervisorReport) {
    println!();
    println!("{}", "  Shutdown report".bold());
    for outcome in &report.monitors {
        match &outcome.result {
            Ok(m) => println!(
                "    {:<20} ticks {:>6}  executed {:>4}  discarded {:>4}  preempted {:>3}  query errors {:>4}  motion errors {:>3}",
                outcome.monitor.name().bold(),
                m.ticks,
                m.executed,
                m.discarded,
                m.preempted,
                m.query_errors,
                m.motion_errors,
            ),
            Err(failure) => println!(
                "    {:<20} {}",
                outcome.monitor.name().bold(),
                failure.to_string().red()
            ),
        }
    }
    match &report.arbiter {
        Ok(a) => println!(
            "    {:<20} cycles {:>5}  executed {:>4}  coalesced {:>4}  preemptions {:>3}  races {:>3}  motion failures {:>3}",
            "arbiter".bold(),
            a.cycles,
            a.executed,
            a.coalesced,
            a.preemptions,
            a.preemption_races,
            a.motion_failures,
        ),
        Err(failure) => println!("    {:<20} {}", "arbiter".bold(), failure.to_string().red()),
    }
    println!();
    if report.is_clean() {
        println!("  {} Base stopped. Exiting Tipsy.", "✓".green().bold());
    } else {
        println!("  {} Base stopped with failed tasks.", "✗".red().bold());
    }
}
