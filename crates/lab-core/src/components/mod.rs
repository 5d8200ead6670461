//! Simulation Components
//!
//! Agents, links, and the world context that owns both.

pub mod agent;
pub mod link;
pub mod world;

pub use agent::*;
pub use link::*;
pub use world::*;
