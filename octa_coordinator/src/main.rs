//! # OCTA Coordinator
//!
//! Binary entry point: loads the TOML configuration, wires the
//! simulated rig to the arbiter and console sync tasks, and runs until
//! interrupted. `--full-scan` presses the scripted scan on the
//! simulated console and exits once it completes; `--print-status`
//! additionally prints every published status snapshot as a JSON line.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use octa_coordinator::arbiter::Arbiter;
use octa_coordinator::config::{CoordinatorConfig, load_config};
use octa_coordinator::sim::{SIM_Z_HEIGHT_PX, SimConsole, SimRig, StdoutConsole};
use octa_coordinator::state::ControlContext;
use octa_coordinator::sync::ConsoleSync;

/// OCTA Coordinator: robotic imaging probe orchestration
#[derive(Parser, Debug)]
#[command(name = "octa_coordinator")]
#[command(version)]
#[command(about = "Action arbiter and console sync for the OCTA probe")]
struct Args {
    /// Path to the coordinator configuration TOML.
    #[arg(default_value = "config/coordinator.toml")]
    config: PathBuf,

    /// Run the scripted full scan on the simulated rig, then exit.
    #[arg(long)]
    full_scan: bool,

    /// Print every published status snapshot as a JSON line.
    #[arg(long)]
    print_status: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("OCTA Coordinator v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args).await {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("OCTA Coordinator shutdown complete");
}

async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        warn!(
            "config {} not found, using built-in defaults",
            args.config.display()
        );
        CoordinatorConfig::default()
    };
    info!(
        "Config OK: tick={}ms, publish={}ms, frames/iteration={}",
        config.timing.tick_ms, config.timing.publish_ms, config.focus.frame_count
    );

    // Simulated rig: a slightly tilted surface a couple of millimetres
    // off the in-focus standoff, so the focus step has real work to do.
    let rig = SimRig::with_surface(1.5, -1.0, 2.0);
    let px_per_mm = config.focus.px_per_mm;
    let ctx = ControlContext::new(config);
    let console = SimConsole::new();

    tokio::spawn(ConsoleSync::new(ctx.clone(), console.clone()).run());
    if args.print_status {
        tokio::spawn(ConsoleSync::new(ctx.clone(), StdoutConsole).run());
    }
    tokio::spawn(Arbiter::new(ctx.clone(), rig.motion(), rig.vision(px_per_mm)).run());

    if args.full_scan {
        console.press(|cmd| {
            cmd.full_scan = true;
            cmd.z_height = SIM_Z_HEIGHT_PX;
            cmd.angle_tolerance = 0.5;
            cmd.z_tolerance = 0.5;
        });
        info!("full scan requested");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("interrupted"),
            _ = scan_finished(&console) => {
                info!(moves = rig.moves(), scans = console.scans(), "full scan finished");
            }
        }
    } else {
        tokio::signal::ctrl_c().await?;
        info!("received shutdown signal");
    }
    Ok(())
}

/// Resolve once the console has seen the scan completion message.
async fn scan_finished(console: &SimConsole) {
    loop {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let done = console
            .last_status()
            .is_some_and(|status| status.message == "Full Scan complete!");
        if done {
            return;
        }
    }
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

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
