//! Event Log
//!
//! Append-only JSONL event logging.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::event::{generate_event_id, EventKind, LabEvent, SimulationKind};

/// Errors that can occur while writing events.
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes events for one run to a JSONL file
pub struct EventLog {
    writer: Option<BufWriter<File>>,
    run_id: String,
    simulation: SimulationKind,
    event_count: u64,
    next_event_id: u64,
}

impl EventLog {
    /// Create a log writing to the specified path, truncating any previous run
    pub fn create(
        path: impl AsRef<Path>,
        run_id: impl Into<String>,
        simulation: SimulationKind,
    ) -> Result<Self, EventLogError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            run_id: run_id.into(),
            simulation,
            event_count: 0,
            next_event_id: 1,
        })
    }

    /// Create a log that discards events
    pub fn null(run_id: impl Into<String>, simulation: SimulationKind) -> Self {
        Self {
            writer: None,
            run_id: run_id.into(),
            simulation,
            event_count: 0,
            next_event_id: 1,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Number of events recorded so far, including discarded ones
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Wrap a payload into a `LabEvent` with the next id and write it
    pub fn record(&mut self, step: u64, kind: EventKind) -> Result<LabEvent, EventLogError> {
        let event = LabEvent::new(
            generate_event_id(self.next_event_id),
            self.run_id.clone(),
            self.simulation,
            step,
            kind,
        );
        self.next_event_id += 1;
        self.log(&event)?;
        Ok(event)
    }

    /// Write an already built event
    pub fn log(&mut self, event: &LabEvent) -> Result<(), EventLogError> {
        self.event_count += 1;
        if let Some(ref mut writer) = self.writer {
            let json = serde_json::to_string(event)?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> Result<(), EventLogError> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!("Warning: Failed to flush event log: {}", e);
        }
    }
}
