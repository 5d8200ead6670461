//! Step Systems
//!
//! Each simulation lives in the ECS world as a resource. Only the one for the
//! current run is inserted, so the other systems see `None` and do nothing.
//! Events produced during a step are queued in `PendingEvents` for the caller
//! to write out.

use bevy_ecs::prelude::*;
use lab_events::EventKind;

use super::aco::{city_label, AcoColony};
use super::ca::CaWorld;
use super::ga_loop::LoopGa;
use crate::error::SimError;
use crate::SimRng;

/// Run progress
#[derive(Resource, Debug, Default)]
pub struct RunState {
    pub current_step: u64,
    pub max_steps: u64,
}

impl RunState {
    pub fn new(max_steps: u64) -> Self {
        Self {
            current_step: 0,
            max_steps,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current_step >= self.max_steps
    }
}

/// Events raised this step, tagged with the step that raised them
#[derive(Resource, Debug, Default)]
pub struct PendingEvents {
    pub events: Vec<(u64, EventKind)>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: u64, kind: EventKind) {
        self.events.push((step, kind));
    }

    pub fn drain(&mut self) -> Vec<(u64, EventKind)> {
        std::mem::take(&mut self.events)
    }
}

/// First error a simulation hit; once set, stepping stops
#[derive(Resource, Debug, Default)]
pub struct SimFailure(pub Option<SimError>);

pub fn step_colony(
    state: Res<RunState>,
    colony: Option<ResMut<AcoColony>>,
    mut rng: ResMut<SimRng>,
    mut pending: ResMut<PendingEvents>,
    mut failure: ResMut<SimFailure>,
) {
    let Some(mut colony) = colony else {
        return;
    };
    if failure.0.is_some() {
        return;
    }

    match colony.step(&mut rng.0) {
        Ok(Some(change)) => pending.push(
            state.current_step,
            EventKind::BestTourChanged {
                cities: change.cities.iter().map(|&c| city_label(c)).collect(),
                length: change.length,
            },
        ),
        Ok(None) => {}
        Err(e) => failure.0 = Some(e),
    }
}

pub fn step_loop_ga(
    state: Res<RunState>,
    ga: Option<ResMut<LoopGa>>,
    mut rng: ResMut<SimRng>,
    mut pending: ResMut<PendingEvents>,
    mut failure: ResMut<SimFailure>,
) {
    let Some(mut ga) = ga else {
        return;
    };
    if failure.0.is_some() {
        return;
    }

    let previous = ga.best().map(|b| b.chromosome.clone());
    match ga.step(&mut rng.0) {
        Ok(report) => {
            // Only report generations that changed the best loop
            if previous.as_ref() != Some(&report.best.chromosome) {
                pending.push(
                    state.current_step,
                    EventKind::GenerationBest {
                        generation: report.generation,
                        fitness: report.best.fitness,
                        discrepancy: report.discrepancy,
                        chromosome: report.best.chromosome.iter().map(|id| id.value()).collect(),
                    },
                );
            }
        }
        Err(e) => failure.0 = Some(e),
    }
}

pub fn step_automaton(
    state: Res<RunState>,
    ca: Option<ResMut<CaWorld>>,
    mut pending: ResMut<PendingEvents>,
) {
    let Some(mut ca) = ca else {
        return;
    };

    let row = ca.step();
    pending.push(
        state.current_step,
        EventKind::CaRowAppended {
            rows: row.rows,
            width: row.width,
            live_cells: row.live_cells,
        },
    );
}

/// Runs after the simulation systems
pub fn advance_step(mut state: ResMut<RunState>) {
    state.current_step += 1;
}

/// Schedule with every step system, ordered before `advance_step`
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((step_colony, step_loop_ga, step_automaton).before(advance_step));
    schedule.add_systems(advance_step);
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Board;
    use crate::config::{AcoConfig, CaConfig, GaConfig};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn base_world(steps: u64) -> World {
        let mut world = World::new();
        world.insert_resource(RunState::new(steps));
        world.insert_resource(SimRng(SmallRng::seed_from_u64(42)));
        world.insert_resource(PendingEvents::new());
        world.insert_resource(SimFailure::default());
        world
    }

    fn run(world: &mut World) {
        let mut schedule = build_schedule();
        while !world.resource::<RunState>().is_finished() {
            schedule.run(world);
        }
    }

    #[test]
    fn test_automaton_system_queues_one_event_per_step() {
        let mut world = base_world(5);
        let ca = CaWorld::setup(CaConfig::default(), &mut SmallRng::seed_from_u64(1));
        world.insert_resource(ca);

        run(&mut world);

        assert_eq!(world.resource::<CaWorld>().rows(), 6);
        let events = world.resource_mut::<PendingEvents>().drain();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].0, 0);
        assert_eq!(events[4].0, 4);
        assert!(events
            .iter()
            .all(|(_, kind)| matches!(kind, EventKind::CaRowAppended { .. })));
    }

    #[test]
    fn test_colony_system_reports_first_best_tour() {
        let mut world = base_world(3);
        let colony = {
            let mut rng = world.resource_mut::<SimRng>();
            AcoColony::setup(AcoConfig::default(), Board::default(), &mut rng.0).unwrap()
        };
        world.insert_resource(colony);

        run(&mut world);

        assert_eq!(world.resource::<AcoColony>().step_count(), 3);
        assert!(world.resource::<SimFailure>().0.is_none());
        let events = world.resource_mut::<PendingEvents>().drain();
        match &events[0] {
            (0, EventKind::BestTourChanged { cities, .. }) => {
                assert_eq!(cities.len(), 7);
                assert_eq!(cities[0], "A");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_ga_system_advances_generations() {
        let mut world = base_world(10);
        let ga = {
            let mut rng = world.resource_mut::<SimRng>();
            LoopGa::setup(GaConfig::default(), Board::default(), &mut rng.0).unwrap()
        };
        world.insert_resource(ga);

        run(&mut world);

        assert_eq!(world.resource::<LoopGa>().generation(), 10);
        assert_eq!(world.resource::<RunState>().current_step, 10);
    }

    #[test]
    fn test_systems_without_simulation_are_noops() {
        let mut world = base_world(2);
        run(&mut world);
        assert!(world.resource::<PendingEvents>().events.is_empty());
        assert_eq!(world.resource::<RunState>().current_step, 2);
    }
}
