//! Simulation Systems
//!
//! The three simulations built on the link registry, plus the ECS systems
//! that step them.

pub mod aco;
pub mod ca;
pub mod ga_loop;
pub mod runner;

pub use aco::{AcoColony, AcoLabels, BestTourChange, Tour, Trail};
pub use ca::{CaRow, CaWorld, Justification, RuleControls};
pub use ga_loop::{GenerationReport, Individual, LoopGa};
pub use runner::{
    advance_step, build_schedule, step_automaton, step_colony, step_loop_ga, PendingEvents,
    RunState, SimFailure,
};
