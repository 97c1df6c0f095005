//! Command-line front end: subcommands, flags, and dispatch.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::{Result, SessionError};
use crate::scheduler::Scheduler;
use crate::session::run_session;
use crate::sim;

#[derive(Debug, Parser)]
#[command(
    name = "cafe_scheduler",
    about = "Multi-queue weighted round-robin café order scheduler",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read commands from stdin or a script (default).
    Session(SessionArgs),

    /// Replay the built-in demo script and print a summary.
    Demo,

    /// Time one synthetic unbounded run.
    Bench(BenchArgs),

    /// Sweep bench configurations and print CSV rows.
    Stress(StressArgs),
}

#[derive(Debug, Default, Args)]
pub struct SessionArgs {
    /// Script file to read instead of stdin.
    #[arg(long, short)]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BenchArgs {
    /// Number of lanes to create.
    #[arg(long, default_value_t = 4)]
    pub lanes: usize,

    /// Orders enqueued per lane; also the lane capacity.
    #[arg(long, default_value_t = 25)]
    pub tasks_per_lane: usize,

    /// Base service ticks per turn.
    #[arg(long, default_value_t = 2)]
    pub quantum: u64,

    /// Cross-check clock and task accounting after the run.
    #[arg(long)]
    pub validate: bool,
}

#[derive(Debug, Args)]
pub struct StressArgs {
    /// Comma-separated lane counts to sweep.
    #[arg(long, value_delimiter = ',', default_values_t = [1usize, 2, 4, 8])]
    pub lane_sets: Vec<usize>,

    /// Comma-separated orders-per-lane values to sweep.
    #[arg(long, value_delimiter = ',', default_values_t = [10usize, 25, 50])]
    pub task_sets: Vec<usize>,

    /// Comma-separated quanta to sweep.
    #[arg(long, value_delimiter = ',', default_values_t = [1u64, 2, 4])]
    pub quanta: Vec<u64>,

    /// Cross-check clock and task accounting after each run.
    #[arg(long)]
    pub validate: bool,
}

pub fn run_from_env() -> Result<()> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Commands::Session(SessionArgs::default())) {
        Commands::Session(args) => run_interactive(args),
        Commands::Demo => sim::run_demo(),
        Commands::Bench(args) => sim::run_benchmark(&args),
        Commands::Stress(args) => sim::run_stress(&args),
    }
}

fn run_interactive(args: SessionArgs) -> Result<()> {
    let mut scheduler = Scheduler::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.input {
        Some(path) => {
            let file = File::open(&path).map_err(|source| SessionError::Script { path, source })?;
            run_session(BufReader::new(file), &mut out, &mut scheduler)?;
        }
        None => {
            run_session(io::stdin().lock(), &mut out, &mut scheduler)?;
        }
    }
    Ok(())
}
