//! linklab
//!
//! Runs one of the link-registry simulations headless for a fixed number of
//! steps, logging progress and optionally writing an event log and a final
//! snapshot.

use bevy_ecs::prelude::*;
use clap::{Parser, Subcommand};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use lab_core::config::{ConfigError, LabConfig};
use lab_core::output::{self, OutputError};
use lab_core::systems::aco::tour_string;
use lab_core::systems::ca::grid_to_string;
use lab_core::systems::{
    build_schedule, AcoColony, CaWorld, LoopGa, PendingEvents, RunState, SimFailure,
};
use lab_core::{SimError, SimRng};
use lab_events::{generate_run_id, EventKind, EventLog, EventLogError, SimulationKind};

/// Event log file name inside the output directory
const EVENTS_FILE: &str = "events.jsonl";

/// Steps between progress lines
const PROGRESS_INTERVAL: u64 = 100;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "linklab")]
#[command(about = "Link registry simulations: ant colony TSP, closed-loop GA, 1-D automaton")]
struct Args {
    /// Config file (defaults to linklab.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Number of steps to simulate
    #[arg(long)]
    steps: Option<u64>,

    /// Directory for events.jsonl and snapshot.json
    #[arg(long)]
    output: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Ant colony TSP solver
    Aco,
    /// Closed-loop genetic algorithm
    Ga {
        /// Number of points in each loop
        #[arg(long)]
        cycle_length: Option<usize>,
    },
    /// Elementary 1-D cellular automaton
    Ca {
        /// Rule number, 0-255
        #[arg(long)]
        rule: Option<u8>,
    },
}

impl Command {
    fn simulation(&self) -> SimulationKind {
        match self {
            Command::Aco => SimulationKind::Aco,
            Command::Ga { .. } => SimulationKind::GaLoop,
            Command::Ca { .. } => SimulationKind::Ca,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("simulation: {0}")]
    Sim(#[from] SimError),

    #[error("event log: {0}")]
    Events(#[from] EventLogError),

    #[error("snapshot: {0}")]
    Output(#[from] OutputError),

    #[error("output directory: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise info, or debug with `--verbose`
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Config file, then command line overrides
fn load_config(args: &Args) -> Result<LabConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => LabConfig::from_file(path)?,
        None => LabConfig::load_or_default(),
    };

    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(steps) = args.steps {
        config.simulation.steps = steps;
    }
    match args.command {
        Command::Ga {
            cycle_length: Some(cycle_length),
        } => config.ga.cycle_length = cycle_length,
        Command::Ca { rule: Some(rule) } => config.ca.rule_nbr = rule,
        _ => {}
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), RunError> {
    let config = load_config(args)?;
    let simulation = args.command.simulation();
    let run_id = generate_run_id();
    let sim = &config.simulation;

    tracing::info!(
        "Starting {} run {} (seed {}, {} steps)",
        simulation.as_str(),
        run_id,
        sim.seed,
        sim.steps
    );

    let mut events = match &args.output {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            EventLog::create(dir.join(EVENTS_FILE), run_id.clone(), simulation)?
        }
        None => EventLog::null(run_id.clone(), simulation),
    };

    // Initialize the ECS world
    let mut world = World::new();
    world.insert_resource(RunState::new(sim.steps));
    world.insert_resource(PendingEvents::new());
    world.insert_resource(SimFailure::default());

    let mut rng = SmallRng::seed_from_u64(sim.seed);
    let board = sim.board();
    match simulation {
        SimulationKind::Aco => {
            world.insert_resource(AcoColony::setup(config.aco.clone(), board, &mut rng)?)
        }
        SimulationKind::GaLoop => {
            world.insert_resource(LoopGa::setup(config.ga.clone(), board, &mut rng)?)
        }
        SimulationKind::Ca => world.insert_resource(CaWorld::setup(config.ca.clone(), &mut rng)),
    }
    world.insert_resource(SimRng(rng));

    let mut schedule = build_schedule();

    // Main simulation loop
    while !world.resource::<RunState>().is_finished() {
        schedule.run(&mut world);

        let pending = world.resource_mut::<PendingEvents>().drain();
        for (step, kind) in pending {
            events.record(step, kind)?;
        }

        if let Some(e) = world.resource_mut::<SimFailure>().0.take() {
            return Err(e.into());
        }

        let step = world.resource::<RunState>().current_step;
        if step % PROGRESS_INTERVAL == 0 {
            tracing::info!("Step {} / {}", step, sim.steps);
        }
    }

    let steps = world.resource::<RunState>().current_step;
    events.record(steps, EventKind::RunCompleted { steps })?;
    events.flush()?;

    let patch_size = sim.patch_size;
    let snapshot = match simulation {
        SimulationKind::Aco => {
            let mut colony = world.resource_mut::<AcoColony>();
            if let Some(cities) = colony.best_tour_cities() {
                tracing::info!(
                    "Best tour {} (length {})",
                    tour_string(cities),
                    colony.best_tour_length()
                );
            }
            output::colony_snapshot(&mut colony, &config.display, patch_size, &run_id)
        }
        SimulationKind::GaLoop => {
            let ga = world.resource::<LoopGa>();
            if let Some(best) = ga.best() {
                tracing::info!(
                    "Best loop after {} generations: fitness {:.1}, discrepancy {:.1}",
                    ga.generation(),
                    best.fitness,
                    ga.discrepancy(best)
                );
            }
            output::loop_snapshot(ga, &config.display, patch_size, &run_id)
        }
        SimulationKind::Ca => {
            let ca = world.resource::<CaWorld>();
            let ca_config = ca.config();
            tracing::info!(
                "Rule {} {}: {} rows",
                ca.controls().rule_nbr(),
                ca.controls().binary_string(),
                ca.rows()
            );
            let grid = ca.render(
                ca_config.display_width,
                ca_config.display_rows,
                ca_config.justification,
            );
            println!("{}", grid_to_string(&grid));
            output::automaton_snapshot(ca, &run_id)
        }
    };

    if let Some(dir) = &args.output {
        output::write_snapshot_to_dir(&snapshot, dir)?;
        tracing::info!("Wrote {} events and a snapshot to {}", events.event_count(), dir.display());
    }

    tracing::info!("Run {} complete after {} steps", run_id, steps);
    Ok(())
}
