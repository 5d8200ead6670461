//! Shared event and snapshot types for linklab runs.
//!
//! This crate contains pure data structures with no simulation logic.
//! The simulation crate depends on it to record what happened during a run.

pub mod event;
pub mod log;
pub mod snapshot;

// Re-export event types
pub use event::{
    generate_event_id, generate_run_id, EventKind, EventType, LabEvent, SimulationKind,
};

// Re-export log types
pub use log::{EventLog, EventLogError};

// Re-export snapshot types
pub use snapshot::{AgentSnapshot, DrawCommand, GraphSnapshot, LinkSnapshot, Rgba};
