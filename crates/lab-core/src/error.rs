//! Simulation Errors

use crate::components::{AgentId, LinkError};

/// Errors raised while setting up or stepping a simulation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("need at least {needed} cities, got {got}")]
    TooFewCities { needed: usize, got: usize },

    #[error("cycle length must be at least 2, got {0}")]
    CycleTooShort(usize),

    #[error("cycle length {cycle_length} needs at least as many points, got {points}")]
    NotEnoughPoints { cycle_length: usize, points: usize },

    #[error("no unvisited city is linked to {0}")]
    NoRoute(AgentId),

    #[error("population is empty")]
    EmptyPopulation,
}
