//! Snapshot Types
//!
//! Serialization structs for the final graph state of a run.

use serde::{Deserialize, Serialize};

use crate::event::SimulationKind;

/// Color as plain rgba bytes
pub type Rgba = [u8; 4];

/// Agent snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: u64,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Link snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub agent_1: u64,
    pub agent_2: u64,
    pub directed: bool,
    pub color: Rgba,
    pub width: u32,
    #[serde(default)]
    pub is_best: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One recorded drawing primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Line {
        from: (f64, f64),
        to: (f64, f64),
        color: Rgba,
        width: u32,
    },
    Label {
        text: String,
        text_center: (f64, f64),
        anchor: (f64, f64),
        color: Rgba,
    },
}

/// Complete graph state at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub run_id: String,
    pub simulation: SimulationKind,
    pub step: u64,
    #[serde(default)]
    pub agents: Vec<AgentSnapshot>,
    #[serde(default)]
    pub links: Vec<LinkSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub frame: Vec<DrawCommand>,
    /// Text rows for grid simulations such as the automaton
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<String>,
}

impl GraphSnapshot {
    pub fn new(run_id: impl Into<String>, simulation: SimulationKind, step: u64) -> Self {
        Self {
            run_id: run_id.into(),
            simulation,
            step,
            agents: Vec::new(),
            links: Vec::new(),
            frame: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Number of links flagged as part of the best solution
    pub fn best_link_count(&self) -> usize {
        self.links.iter().filter(|l| l.is_best).count()
    }
}
