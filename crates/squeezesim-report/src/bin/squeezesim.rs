//! CLI binary for SqueezeSim.
//!
//! Runs one simulated guest under a memory-limit controller and prints a
//! report, or runs every controller side by side.
//!
//! # Usage
//!
//! ```bash
//! # Default run: 64 pages, 10 000 ticks, mk2 controller, rotating workload
//! squeezesim run
//!
//! # Static limit of 10 pages over 100 000 ticks
//! squeezesim run -t 100000 -s static 10
//!
//! # Show the per-tick activity stream and save the report
//! squeezesim run -s mk4 --activity-log --json run.json
//!
//! # Compare every controller on the same workload
//! squeezesim compare -m 128 -t 50000 --workload busy
//! ```

use clap::{Parser, Subcommand};
use squeezesim_report::compare::{compare_all, format_comparison};
use squeezesim_report::export::save_report;
use squeezesim_report::report::{format_report, RunReport};
use squeezesim_vmm::config::{SimConfig, SqueezerKind, WorkloadKind};
use squeezesim_vmm::events::ActivityLog;
use squeezesim_vmm::host::Host;
use std::error::Error;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "squeezesim")]
#[command(about = "Simulate hypervisor memory reclaim under feedback-controlled limits")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation and print its report.
    Run {
        /// Guest memory in pages.
        #[arg(short, long, default_value = "64")]
        memory: usize,

        /// Ticks to simulate.
        #[arg(short, long, default_value = "10000")]
        ticks: u64,

        /// Controller: static, simple, mk1, mk2, mk3 or mk4.
        #[arg(short, long, default_value = "mk2")]
        squeezer: String,

        /// Random seed for reproducibility.
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Workload: idle, uniform, normal, busy, busy-uniform or rotate.
        #[arg(long, default_value = "rotate")]
        workload: String,

        /// Print the one-character-per-event activity stream.
        #[arg(long)]
        activity_log: bool,

        /// Save the report as JSON to this path.
        #[arg(long)]
        json: Option<PathBuf>,

        /// Controller parameter (the fixed limit for `static`).
        param: Option<u64>,
    },

    /// Run every controller against the same workload and seed.
    Compare {
        /// Guest memory in pages.
        #[arg(short, long, default_value = "64")]
        memory: usize,

        /// Ticks to simulate per controller.
        #[arg(short, long, default_value = "10000")]
        ticks: u64,

        /// Random seed for reproducibility.
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Workload: idle, uniform, normal, busy, busy-uniform or rotate.
        #[arg(long, default_value = "rotate")]
        workload: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            memory,
            ticks,
            squeezer,
            seed,
            workload,
            activity_log,
            json,
            param,
        } => cmd_run(
            memory,
            ticks,
            &squeezer,
            seed,
            &workload,
            activity_log,
            json,
            param,
        ),
        Commands::Compare {
            memory,
            ticks,
            seed,
            workload,
        } => cmd_compare(memory, ticks, seed, &workload),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    memory: usize,
    ticks: u64,
    squeezer: &str,
    seed: u64,
    workload: &str,
    activity_log: bool,
    json: Option<PathBuf>,
    param: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let config = SimConfig {
        total_pages: memory,
        ticks,
        seed,
        ..Default::default()
    };
    let kind = SqueezerKind::from_name(squeezer)?;
    let workload = WorkloadKind::from_name(workload)?;
    let mut host = Host::with_kinds(config, kind, param, workload)?;

    if activity_log {
        let mut sink = ActivityLog::new(io::stdout().lock());
        host.run_observed(&mut sink);
        drop(sink.into_inner());
        println!();
    } else {
        host.run();
    }

    let report = RunReport::from_host(&host);
    println!("{}", format_report(&report));

    if let Some(path) = json {
        save_report(&path, &report)?;
        println!("Report saved to {}", path.display());
    }

    println!("{}", report.summary_line());
    Ok(())
}

fn cmd_compare(memory: usize, ticks: u64, seed: u64, workload: &str) -> Result<(), Box<dyn Error>> {
    let config = SimConfig {
        total_pages: memory,
        ticks,
        seed,
        ..Default::default()
    };
    let workload = WorkloadKind::from_name(workload)?;
    let rows = compare_all(&config, workload)?;
    println!("{}", format_comparison(&rows));
    Ok(())
}
