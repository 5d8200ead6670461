//! linklab simulation library
//!
//! Agents, the link registry, and the three teaching simulations built on it:
//! an ant-colony TSP solver, a closed-loop genetic algorithm, and a 1-D
//! cellular automaton.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod components;
pub mod config;
pub mod error;
pub mod output;
pub mod render;
pub mod systems;

pub use components::*;
pub use config::{ConfigError, LabConfig};
pub use error::SimError;

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
