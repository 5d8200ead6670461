//! Snapshot Output
//!
//! Builds the end-of-run `GraphSnapshot` for each simulation and writes it as
//! pretty JSON.

use std::fs;
use std::path::Path;

use lab_events::{AgentSnapshot, GraphSnapshot, LinkSnapshot, SimulationKind};

use crate::components::SimWorld;
use crate::config::DisplayConfig;
use crate::render::{draw_world, FrameRecorder, Labelable, PositionLabel};
use crate::systems::aco::{AcoColony, AcoLabels};
use crate::systems::ca::{grid_to_string, CaWorld};
use crate::systems::ga_loop::LoopGa;

/// Snapshot file name inside the output directory
pub const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Agents and links of `world`, labeled by `labeler`
pub fn snapshot_world(
    world: &SimWorld,
    labeler: &dyn Labelable,
    run_id: &str,
    simulation: SimulationKind,
    step: u64,
) -> GraphSnapshot {
    let mut snapshot = GraphSnapshot::new(run_id, simulation, step);

    snapshot.agents = world
        .agents
        .iter()
        .map(|agent| AgentSnapshot {
            agent_id: agent.id.value(),
            x: agent.position.x,
            y: agent.position.y,
            label: labeler.agent_label(agent),
        })
        .collect();

    snapshot.links = world
        .links
        .iter()
        .map(|link| LinkSnapshot {
            agent_1: link.agent_1().value(),
            agent_2: link.agent_2().value(),
            directed: link.is_directed(),
            color: link.color().to_array(),
            width: link.width(),
            is_best: link.is_best(),
            label: labeler.link_label(link, world),
        })
        .collect();

    snapshot
}

pub fn colony_snapshot(
    colony: &mut AcoColony,
    display: &DisplayConfig,
    patch_size: f64,
    run_id: &str,
) -> GraphSnapshot {
    let mut frame = FrameRecorder::new();
    colony.draw(display, &mut frame, patch_size);

    let labels = AcoLabels {
        colony: &*colony,
        display,
    };
    let mut snapshot = snapshot_world(
        colony.world(),
        &labels,
        run_id,
        SimulationKind::Aco,
        colony.step_count(),
    );
    snapshot.frame = frame.into_commands();
    snapshot
}

pub fn loop_snapshot(
    ga: &LoopGa,
    display: &DisplayConfig,
    patch_size: f64,
    run_id: &str,
) -> GraphSnapshot {
    let labels = PositionLabel {
        show_positions: display.show_positions,
    };
    let mut frame = FrameRecorder::new();
    draw_world(ga.world(), &labels, &mut frame, patch_size, |_| true);

    let mut snapshot = snapshot_world(
        ga.world(),
        &labels,
        run_id,
        SimulationKind::GaLoop,
        ga.generation(),
    );
    snapshot.frame = frame.into_commands();
    snapshot
}

/// The automaton has no agents; its snapshot is the rendered grid as text rows
pub fn automaton_snapshot(ca: &CaWorld, run_id: &str) -> GraphSnapshot {
    let config = ca.config();
    let grid = ca.render(config.display_width, config.display_rows, config.justification);

    let mut snapshot = GraphSnapshot::new(
        run_id,
        SimulationKind::Ca,
        ca.rows().saturating_sub(1) as u64,
    );
    snapshot.rows = grid_to_string(&grid).lines().map(str::to_string).collect();
    snapshot
}

/// Write snapshot to file
pub fn write_snapshot(snapshot: &GraphSnapshot, path: impl AsRef<Path>) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write snapshot as `snapshot.json` under `dir`
pub fn write_snapshot_to_dir(
    snapshot: &GraphSnapshot,
    dir: impl AsRef<Path>,
) -> Result<(), OutputError> {
    write_snapshot(snapshot, dir.as_ref().join(SNAPSHOT_FILE))
}
