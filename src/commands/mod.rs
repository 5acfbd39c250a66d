use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lispzoo::{SimConfig, Simulation};
use tracing::info;

mod agent;
mod world;

use agent::{run_inspect, run_program};
use world::{run_simulation, run_view};

#[derive(Parser)]
#[command(
    name = "lispzoo",
    version,
    about = "Headless runner for the evolving Lisp zoo",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the simulation for a number of ticks and log progress
    Run {
        #[command(flatten)]
        world: WorldArgs,
        /// Number of ticks to run
        #[arg(short = 't', long, default_value_t = 1_000)]
        ticks: u64,
        /// Log a population summary every N ticks (0 disables)
        #[arg(long, default_value_t = 100)]
        report_every: u64,
        /// Write a JSON run report to this path when finished
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
    /// Print the world as a text map or a JSON snapshot
    View {
        #[command(flatten)]
        world: WorldArgs,
        /// Ticks to advance before rendering
        #[arg(short = 't', long, default_value_t = 0)]
        ticks: u64,
        /// Print the snapshot JSON instead of the text map
        #[arg(long)]
        json: bool,
    },
    /// Show agents after advancing the world
    Inspect {
        #[command(flatten)]
        world: WorldArgs,
        /// Ticks to advance before inspecting
        #[arg(short = 't', long, default_value_t = 0)]
        ticks: u64,
        /// Agent id to show in full (defaults to a listing)
        #[arg(long)]
        agent: Option<u64>,
        /// Number of agents to list, richest first
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Print the starting program, optionally after random mutations
    Program {
        /// Mutations to apply in sequence
        #[arg(short = 'm', long, default_value_t = 0)]
        mutations: usize,
        /// RNG seed for the mutation sequence
        #[arg(long)]
        seed: Option<u64>,
        /// Print the single-line form instead of the indented one
        #[arg(long)]
        compact: bool,
    },
}

/// World-building options shared by the simulation commands.
#[derive(Args, Debug, Clone)]
pub struct WorldArgs {
    /// JSON file with simulation settings
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// RNG seed (overrides the config file)
    #[arg(long)]
    pub seed: Option<u64>,
    /// Grid width (overrides the config file)
    #[arg(long)]
    pub width: Option<i32>,
    /// Grid height (overrides the config file)
    #[arg(long)]
    pub height: Option<i32>,
}

impl WorldArgs {
    pub fn load_config(&self) -> Result<SimConfig, String> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path).map_err(|e| e.to_string())?,
            None => SimConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }

    /// Builds a simulation and advances it `ticks` steps.
    pub fn simulate(&self, ticks: u64) -> Result<Simulation, String> {
        let config = self.load_config()?;
        let mut sim = Simulation::new(config).map_err(|e| e.to_string())?;
        sim.run(ticks, |_, _| {});
        if ticks > 0 {
            info!(
                tick = sim.world().tick(),
                population = sim.world().agents().len(),
                "world advanced"
            );
        }
        Ok(sim)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn dispatch(command: Command) -> Result<(), String> {
    match command {
        Command::Run {
            world,
            ticks,
            report_every,
            report,
        } => run_simulation(&world, ticks, report_every, report.as_deref()),
        Command::View { world, ticks, json } => run_view(&world, ticks, json),
        Command::Inspect {
            world,
            ticks,
            agent,
            top,
        } => run_inspect(&world, ticks, agent, top),
        Command::Program {
            mutations,
            seed,
            compact,
        } => run_program(mutations, seed, compact),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "lispzoo", "run", "--seed", "7", "--width", "30", "--height", "20", "-t", "5",
        ])
        .unwrap();
        let Command::Run { world, ticks, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(ticks, 5);
        let config = world.load_config().unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.width, 30);
        assert_eq!(config.height, 20);
    }

    #[test]
    fn invalid_override_is_reported() {
        let args = WorldArgs {
            config: None,
            seed: None,
            width: Some(0),
            height: None,
        };
        let err = args.load_config().unwrap_err();
        assert!(err.contains("invalid configuration"));
    }
}
