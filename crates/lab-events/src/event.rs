//! Event Types
//!
//! Events emitted by the simulations. One event is one JSON line in `events.jsonl`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates an event ID with the given sequence number.
pub fn generate_event_id(sequence: u64) -> String {
    format!("evt_{:08}", sequence)
}

/// Generates a fresh run ID.
pub fn generate_run_id() -> String {
    format!("run_{}", Uuid::new_v4().simple())
}

/// Which simulation produced an event or snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationKind {
    Aco,
    GaLoop,
    Ca,
}

impl SimulationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationKind::Aco => "aco",
            SimulationKind::GaLoop => "ga_loop",
            SimulationKind::Ca => "ca",
        }
    }
}

/// Primary event type categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BestTourChanged,
    GenerationBest,
    CaRowAppended,
    RunCompleted,
}

/// Event payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The ant colony settled on a different best tour
    BestTourChanged {
        /// City labels in canonical tour order
        cities: Vec<String>,
        length: f64,
    },
    /// Best individual after a GA generation
    GenerationBest {
        generation: u64,
        fitness: f64,
        discrepancy: f64,
        /// Agent ids of the best chromosome, in cycle order
        chromosome: Vec<u64>,
    },
    /// The automaton produced another row
    CaRowAppended {
        rows: usize,
        width: usize,
        live_cells: usize,
    },
    /// Final event of every run
    RunCompleted { steps: u64 },
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::BestTourChanged { .. } => EventType::BestTourChanged,
            EventKind::GenerationBest { .. } => EventType::GenerationBest,
            EventKind::CaRowAppended { .. } => EventType::CaRowAppended,
            EventKind::RunCompleted { .. } => EventType::RunCompleted,
        }
    }
}

/// A single recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabEvent {
    pub event_id: String,
    pub run_id: String,
    pub simulation: SimulationKind,
    pub step: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl LabEvent {
    pub fn new(
        event_id: impl Into<String>,
        run_id: impl Into<String>,
        simulation: SimulationKind,
        step: u64,
        kind: EventKind,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            run_id: run_id.into(),
            simulation,
            step,
            kind,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_event_id() {
        assert_eq!(generate_event_id(1), "evt_00000001");
        assert_eq!(generate_event_id(12345678), "evt_12345678");
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert!(a.starts_with("run_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_event_serializes_flat_with_type_tag() {
        let event = LabEvent::new(
            "evt_00000001",
            "run_x",
            SimulationKind::Aco,
            7,
            EventKind::BestTourChanged {
                cities: vec!["A".into(), "C".into(), "B".into()],
                length: 812.0,
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "best_tour_changed");
        assert_eq!(json["simulation"], "aco");
        assert_eq!(json["step"], 7);
        assert_eq!(json["cities"][1], "C");

        let back: LabEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.event_type(), EventType::BestTourChanged);
    }

    #[test]
    fn test_simulation_kind_names() {
        assert_eq!(SimulationKind::GaLoop.as_str(), "ga_loop");
        let json = serde_json::to_string(&SimulationKind::GaLoop).unwrap();
        assert_eq!(json, "\"ga_loop\"");
    }
}
