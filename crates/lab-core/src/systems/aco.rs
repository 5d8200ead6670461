//! Ant Colony TSP
//!
//! Cities are agents, and every pair of cities is joined by one undirected link.
//! Each link carries a pheromone trail. Tours follow links with probability
//! proportional to `pheromone^alpha / length^beta`; good tours reinforce their
//! links and every trail evaporates a little each step.
//!
//! Step order:
//! 1. Move cities (when `max_speed > 0`)
//! 2. Discount every trail
//! 3. Generate `tours_per_step` tours, reinforcing each one
//! 4. Normalize trails so the strongest is at 100
//! 5. Mark the best of a few greedy tours

use bevy_ecs::prelude::*;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

use crate::components::{Agent, AgentId, Board, Link, LinkKey, SimWorld, Velocity};
use crate::config::{AcoConfig, DisplayConfig};
use crate::error::SimError;
use crate::render::{draw_world, Canvas, Color, Labelable};

/// Pheromone on every link right after setup
pub const INITIAL_PHEROMONE: f64 = 50.0;
/// Ceiling that normalization scales to
pub const MAX_PHEROMONE: f64 = 100.0;
/// Greedy tours sampled when picking the best tour
const BEST_TOUR_SAMPLES: usize = 5;
/// Per-step chance that a moving city picks a new velocity
const VELOCITY_CHANGE_CHANCE: f64 = 0.001;

/// Pheromone state of one link
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trail {
    pub pheromone: f64,
    /// The link is undirected; these record which way a tour last used it
    pub from_city: Option<AgentId>,
    pub to_city: Option<AgentId>,
}

impl Default for Trail {
    fn default() -> Self {
        Self {
            pheromone: INITIAL_PHEROMONE,
            from_city: None,
            to_city: None,
        }
    }
}

/// A closed tour through every city
#[derive(Debug, Clone, PartialEq)]
pub struct Tour {
    /// Links in travel order, ending with the link back to the start
    pub links: Vec<LinkKey>,
    /// Departure city of each link, starting with the start city
    pub cities: Vec<AgentId>,
    pub length: f64,
}

/// Reported when the colony's best tour changes
#[derive(Debug, Clone, PartialEq)]
pub struct BestTourChange {
    /// Cities in canonical order (see [`order_elements`])
    pub cities: Vec<AgentId>,
    pub length: f64,
}

/// Resource: the colony, its cities, and their trails
#[derive(Resource, Debug)]
pub struct AcoColony {
    config: AcoConfig,
    board: Board,
    world: SimWorld,
    trails: BTreeMap<LinkKey, Trail>,
    best_tour_length: f64,
    best_tour_cities: Option<Vec<AgentId>>,
    step_count: u64,
}

impl AcoColony {
    /// Spawn the cities and join every pair with a link
    pub fn setup<R: Rng + ?Sized>(
        config: AcoConfig,
        board: Board,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        if config.nbr_cities < 3 {
            return Err(SimError::TooFewCities {
                needed: 3,
                got: config.nbr_cities,
            });
        }

        let mut world = SimWorld::new();
        let cities = world.agents.spawn_random(config.nbr_cities, &board, rng);
        for &city in &cities {
            let velocity = random_velocity(config.max_speed, rng);
            if let Some(agent) = world.agents.get_mut(city) {
                agent.set_velocity(velocity);
            }
        }

        let mut trails = BTreeMap::new();
        for (i, &a) in cities.iter().enumerate() {
            for &b in &cities[i + 1..] {
                let key = world.link(a, b, false)?;
                trails.insert(key, Trail::default());
            }
        }

        // Upper-bound guess: n links of average length
        let total = world.total_length(trails.keys());
        let best_tour_length = (cities.len() as f64 * total / trails.len() as f64).round();

        tracing::debug!(
            "Colony set up: {} cities, {} links, initial bound {}",
            cities.len(),
            trails.len(),
            best_tour_length
        );

        Ok(Self {
            config,
            board,
            world,
            trails,
            best_tour_length,
            best_tour_cities: None,
            step_count: 0,
        })
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    pub fn config(&self) -> &AcoConfig {
        &self.config
    }

    pub fn trail(&self, key: &LinkKey) -> Option<&Trail> {
        self.trails.get(key)
    }

    pub fn pheromone(&self, key: &LinkKey) -> Option<f64> {
        self.trails.get(key).map(|t| t.pheromone)
    }

    pub fn best_tour_length(&self) -> f64 {
        self.best_tour_length
    }

    pub fn best_tour_cities(&self) -> Option<&[AgentId]> {
        self.best_tour_cities.as_deref()
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Run one full colony step
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Option<BestTourChange>, SimError> {
        self.move_cities(rng);
        self.discount_pheromone_values();

        for _ in 0..self.config.tours_per_step {
            let tour = self.generate_a_tour(false, rng)?;
            self.update_pheromone_levels(&tour);
        }

        self.normalize_pheromone_levels();
        let change = self.mark_best_tour(rng)?;
        self.step_count += 1;

        if let Some(ref change) = change {
            tracing::info!(
                "Step {}: best tour {} (length {})",
                self.step_count,
                tour_string(&change.cities),
                change.length
            );
        }
        Ok(change)
    }

    /// Move every city by its velocity. Speed limits apply only when a new
    /// velocity is drawn.
    pub fn move_cities<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let max_speed = self.config.max_speed;
        if max_speed <= 0.0 {
            return;
        }
        let board = self.board;
        for city in self.world.agents.iter_mut() {
            city.move_by_velocity(&board);
            if rng.gen::<f64>() < VELOCITY_CHANGE_CHANCE {
                city.set_velocity(random_velocity(max_speed, rng));
            }
        }
    }

    /// Evaporation: older information is worth less
    pub fn discount_pheromone_values(&mut self) {
        let discount = (100.0 - self.config.discount_factor) / 100.0;
        let min_pheromone = self.config.min_pheromone;
        for trail in self.trails.values_mut() {
            trail.pheromone = min_pheromone.max(discount * trail.pheromone);
        }
    }

    /// Scale trails so the strongest sits at `MAX_PHEROMONE`
    pub fn normalize_pheromone_levels(&mut self) {
        let max_level = self
            .trails
            .values()
            .map(|t| t.pheromone)
            .fold(f64::MIN, f64::max);
        if max_level <= 0.0 {
            return;
        }
        let factor = MAX_PHEROMONE / max_level;
        let min_pheromone = self.config.min_pheromone;
        for trail in self.trails.values_mut() {
            trail.pheromone = min_pheromone.max(factor * trail.pheromone);
        }
    }

    /// Build a tour from a random start city.
    ///
    /// With `best` the heaviest link is always taken; otherwise links are
    /// drawn by weight. The closing link back to the start already exists and
    /// is looked up by key.
    pub fn generate_a_tour<R: Rng + ?Sized>(
        &mut self,
        best: bool,
        rng: &mut R,
    ) -> Result<Tour, SimError> {
        let (alpha, beta) = (self.config.alpha, self.config.beta);
        let cities: Vec<AgentId> = self.world.agents.ids().collect();
        let start = *cities.choose(rng).ok_or(SimError::TooFewCities {
            needed: 3,
            got: 0,
        })?;

        let mut unvisited: BTreeSet<AgentId> =
            cities.iter().copied().filter(|&c| c != start).collect();
        let mut tour = Tour {
            links: Vec::with_capacity(cities.len()),
            cities: vec![start],
            length: 0.0,
        };
        let mut current = start;

        while !unvisited.is_empty() {
            let weighted: Vec<(LinkKey, AgentId, f64)> = self
                .world
                .links
                .links_of(current)
                .filter_map(|link| {
                    let next = link.other_side(current)?;
                    if !unvisited.contains(&next) {
                        return None;
                    }
                    let key = link.key();
                    let length = self.world.link_length(&key)?;
                    let pheromone = self.trails.get(&key)?.pheromone;
                    Some((key, next, pheromone.powf(alpha) / length.max(1.0).powf(beta)))
                })
                .collect();

            let choice = if best {
                strongest(&weighted)
            } else {
                weighted_choice(&weighted, rng)
            };
            let &(key, next, _) = choice.ok_or(SimError::NoRoute(current))?;

            self.mark_direction(key, current, next);
            tour.links.push(key);
            unvisited.remove(&next);
            current = next;
            tour.cities.push(next);
        }

        let final_key = self
            .world
            .links
            .find(current, start, false)
            .map(Link::key)
            .ok_or(SimError::NoRoute(current))?;
        self.mark_direction(final_key, current, start);
        tour.links.push(final_key);

        tour.length = self.world.total_length(&tour.links);
        let rounded = tour.length.round();
        if rounded < self.best_tour_length {
            self.best_tour_length = rounded;
        }
        Ok(tour)
    }

    /// Reinforce the links of `tour`, more for tours close to the best.
    ///
    /// A single tour may add at most `update_increment_step` percent of a
    /// trail's remaining headroom below `MAX_PHEROMONE`.
    pub fn update_pheromone_levels(&mut self, tour: &Tour) {
        let tour_length = tour.length.round().max(1.0);
        let raw_increment = self.config.update_weight * self.best_tour_length / tour_length;
        let step = self.config.update_increment_step;

        for key in &tour.links {
            if let Some(trail) = self.trails.get_mut(key) {
                let max_increment = (MAX_PHEROMONE - trail.pheromone) * step / 100.0;
                trail.pheromone += max_increment.min(raw_increment);
            }
        }
    }

    /// Pick the shortest of a few greedy tours and flag its links.
    ///
    /// Returns the new tour only when its canonical city order differs from
    /// the previous best.
    pub fn mark_best_tour<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Option<BestTourChange>, SimError> {
        let mut best: Option<Tour> = None;
        for _ in 0..BEST_TOUR_SAMPLES {
            let tour = self.generate_a_tour(true, rng)?;
            if best.as_ref().map_or(true, |b| tour.length < b.length) {
                best = Some(tour);
            }
        }
        let Some(best) = best else {
            return Ok(None);
        };

        self.best_tour_length = best.length.round();
        let cities = order_elements(&best.cities);
        if self.best_tour_cities.as_ref() == Some(&cities) {
            return Ok(None);
        }

        for link in self.world.links.iter_mut() {
            link.set_best(false);
        }
        for key in &best.links {
            if let Some(link) = self.world.links.get_mut(key) {
                link.set_best(true);
            }
        }

        self.best_tour_cities = Some(cities.clone());
        Ok(Some(BestTourChange {
            cities,
            length: self.best_tour_length,
        }))
    }

    /// Color and width of every link from its trail and best-tour flag
    pub fn restyle_links(&mut self) {
        let min_pheromone = self.config.min_pheromone;
        for link in self.world.links.iter_mut() {
            if link.is_best() {
                link.set_color(Color::BEST_LINK);
                link.set_width(4);
            } else if let Some(trail) = self.trails.get(&link.key()) {
                link.set_color(pheromone_color(trail.pheromone, min_pheromone));
                link.set_width(1);
            }
        }
    }

    /// Best links are always shown; others only above the display threshold
    pub fn is_link_visible(&self, link: &Link, display: &DisplayConfig) -> bool {
        link.is_best()
            || self
                .pheromone(&link.key())
                .map_or(false, |p| p >= display.min_display_level)
    }

    /// Restyle, then draw visible links and city labels
    pub fn draw(&mut self, display: &DisplayConfig, canvas: &mut dyn Canvas, patch_size: f64) {
        self.restyle_links();
        let labels = AcoLabels {
            colony: self,
            display,
        };
        draw_world(&self.world, &labels, canvas, patch_size, |link| {
            self.is_link_visible(link, display)
        });
    }

    fn mark_direction(&mut self, key: LinkKey, from: AgentId, to: AgentId) {
        if let Some(trail) = self.trails.get_mut(&key) {
            trail.from_city = Some(from);
            trail.to_city = Some(to);
        }
    }
}

/// City letters and pheromone levels, each behind its display switch
pub struct AcoLabels<'a> {
    pub colony: &'a AcoColony,
    pub display: &'a DisplayConfig,
}

impl Labelable for AcoLabels<'_> {
    fn link_label(&self, link: &Link, _world: &SimWorld) -> Option<String> {
        if !self.display.show_pheromone_levels {
            return None;
        }
        self.colony
            .pheromone(&link.key())
            .map(|p| (p.round() as i64).to_string())
    }

    fn agent_label(&self, agent: &Agent) -> Option<String> {
        self.display.show_labels.then(|| city_label(agent.id))
    }
}

/// `A` for city 0, `B` for city 1, and so on; the number past `Z`
pub fn city_label(id: AgentId) -> String {
    match u8::try_from(id.value()) {
        Ok(n) if n < 26 => char::from(b'A' + n).to_string(),
        _ => id.to_string(),
    }
}

pub fn tour_string(cities: &[AgentId]) -> String {
    cities.iter().map(|&c| city_label(c)).collect()
}

/// Canonical form of a cyclic tour: rotated to start at the smallest city,
/// then oriented so the second city is smaller than the last
pub fn order_elements(cities: &[AgentId]) -> Vec<AgentId> {
    let Some(min_pos) = cities
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| **c)
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };

    let mut ordered: Vec<AgentId> = cities[min_pos..]
        .iter()
        .chain(&cities[..min_pos])
        .copied()
        .collect();
    let n = ordered.len();
    if n > 2 && ordered[n - 1] < ordered[1] {
        ordered[1..].reverse();
    }
    ordered
}

/// Red for weak trails shading to green for strong ones
pub fn pheromone_color(level: f64, min_pheromone: f64) -> Color {
    let range = MAX_PHEROMONE - min_pheromone;
    if range <= 0.0 {
        return Color::rgb(0, 100, 0);
    }
    let red = (150.0 * (range - (level - min_pheromone)) / range)
        .round()
        .clamp(0.0, 255.0) as u8;
    let green = (255.0 * (level - min_pheromone) / range)
        .round()
        .clamp(0.0, 100.0) as u8;
    Color::rgb(red, green, 0)
}

/// Velocity with each component uniform in `(-max_speed/100, max_speed/100)`
pub fn random_velocity<R: Rng + ?Sized>(max_speed: f64, rng: &mut R) -> Velocity {
    let limit = max_speed / 100.0;
    if limit <= 0.0 {
        return Velocity::default();
    }
    Velocity::new(rng.gen_range(-limit..limit), rng.gen_range(-limit..limit))
}

fn weighted_choice<'a, R: Rng + ?Sized>(
    weighted: &'a [(LinkKey, AgentId, f64)],
    rng: &mut R,
) -> Option<&'a (LinkKey, AgentId, f64)> {
    match WeightedIndex::new(weighted.iter().map(|w| w.2)) {
        Ok(dist) => weighted.get(dist.sample(rng)),
        // Every weight is zero: fall back to a uniform pick
        Err(_) => weighted.choose(rng),
    }
}

/// Highest-weight candidate; the first one wins a tie
fn strongest(weighted: &[(LinkKey, AgentId, f64)]) -> Option<&(LinkKey, AgentId, f64)> {
    weighted.iter().reduce(|a, b| if b.2 > a.2 { b } else { a })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FrameRecorder;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn colony(nbr_cities: usize, seed: u64) -> (AcoColony, SmallRng) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let config = AcoConfig {
            nbr_cities,
            tours_per_step: 10,
            ..AcoConfig::default()
        };
        let colony = AcoColony::setup(config, Board::default(), &mut rng).unwrap();
        (colony, rng)
    }

    #[test]
    fn test_setup_builds_complete_graph() {
        let (colony, _) = colony(7, 1);

        assert_eq!(colony.world().agents.len(), 7);
        assert_eq!(colony.world().links.len(), 21);
        assert!(colony
            .world()
            .links
            .keys()
            .all(|k| colony.pheromone(&k) == Some(INITIAL_PHEROMONE)));
        assert!(colony.best_tour_length() > 0.0);
    }

    #[test]
    fn test_setup_rejects_too_few_cities() {
        let mut rng = SmallRng::seed_from_u64(1);
        let config = AcoConfig {
            nbr_cities: 2,
            ..AcoConfig::default()
        };
        let err = AcoColony::setup(config, Board::default(), &mut rng).unwrap_err();
        assert_eq!(err, SimError::TooFewCities { needed: 3, got: 2 });
    }

    #[test]
    fn test_tour_visits_every_city_once_and_closes() {
        let (mut colony, mut rng) = colony(8, 2);

        for best in [false, true] {
            let tour = colony.generate_a_tour(best, &mut rng).unwrap();

            assert_eq!(tour.links.len(), 8);
            assert_eq!(tour.cities.len(), 8);
            let distinct: BTreeSet<_> = tour.cities.iter().collect();
            assert_eq!(distinct.len(), 8);

            let links: BTreeSet<_> = tour.links.iter().collect();
            assert_eq!(links.len(), 8);

            // The last link returns to the start
            let last = tour.links.last().unwrap();
            assert!(last.includes(tour.cities[0]));

            let total = colony.world().total_length(&tour.links);
            assert!((tour.length - total).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tour_records_direction_of_travel() {
        let (mut colony, mut rng) = colony(5, 3);
        let tour = colony.generate_a_tour(false, &mut rng).unwrap();

        let first = colony.trail(&tour.links[0]).unwrap();
        assert_eq!(first.from_city, Some(tour.cities[0]));
        assert_eq!(first.to_city, Some(tour.cities[1]));

        let last = colony.trail(tour.links.last().unwrap()).unwrap();
        assert_eq!(last.to_city, Some(tour.cities[0]));
    }

    #[test]
    fn test_discount_respects_floor() {
        let (mut colony, _) = colony(4, 4);
        for _ in 0..50 {
            colony.discount_pheromone_values();
        }
        let min = colony.config().min_pheromone;
        assert!(colony
            .world()
            .links
            .keys()
            .all(|k| colony.pheromone(&k) == Some(min)));
    }

    #[test]
    fn test_update_then_normalize_caps_at_max() {
        let (mut colony, mut rng) = colony(6, 5);
        for _ in 0..20 {
            let tour = colony.generate_a_tour(false, &mut rng).unwrap();
            colony.update_pheromone_levels(&tour);
        }
        colony.normalize_pheromone_levels();

        let levels: Vec<f64> = colony
            .world()
            .links
            .keys()
            .filter_map(|k| colony.pheromone(&k))
            .collect();
        let max = levels.iter().cloned().fold(f64::MIN, f64::max);
        assert!((max - MAX_PHEROMONE).abs() < 1e-9);
        assert!(levels.iter().all(|&p| p >= colony.config().min_pheromone));
    }

    #[test]
    fn test_reinforcement_never_exceeds_headroom() {
        let (mut colony, mut rng) = colony(5, 6);
        let tour = colony.generate_a_tour(false, &mut rng).unwrap();
        for _ in 0..200 {
            colony.update_pheromone_levels(&tour);
        }
        assert!(tour
            .links
            .iter()
            .all(|k| colony.pheromone(k).unwrap() <= MAX_PHEROMONE));
    }

    #[test]
    fn test_step_flags_exactly_one_tour() {
        let (mut colony, mut rng) = colony(7, 7);
        let change = colony.step(&mut rng).unwrap();

        // The first step always establishes a best tour
        let change = change.expect("first step should report a best tour");
        assert_eq!(change.cities.len(), 7);
        assert_eq!(change.cities[0], AgentId(0));

        let best_links = colony.world().links.iter().filter(|l| l.is_best()).count();
        assert_eq!(best_links, 7);
        assert_eq!(colony.best_tour_cities(), Some(change.cities.as_slice()));
        assert_eq!(colony.step_count(), 1);
    }

    #[test]
    fn test_strongest_keeps_first_of_equal_weights() {
        let key = |a, b| LinkKey::new(AgentId(a), AgentId(b), false);
        let weighted = vec![
            (key(0, 1), AgentId(1), 2.0),
            (key(0, 2), AgentId(2), 5.0),
            (key(0, 3), AgentId(3), 5.0),
            (key(0, 4), AgentId(4), 1.0),
        ];

        assert_eq!(strongest(&weighted).map(|w| w.1), Some(AgentId(2)));
        assert!(strongest(&[]).is_none());
    }

    #[test]
    fn test_order_elements_canonical_form() {
        let ids = |v: &[u64]| v.iter().map(|&i| AgentId(i)).collect::<Vec<_>>();

        assert_eq!(order_elements(&ids(&[2, 0, 3, 1])), ids(&[0, 2, 1, 3]));
        assert_eq!(order_elements(&ids(&[1, 3, 0, 2])), ids(&[0, 2, 1, 3]));
        assert_eq!(order_elements(&ids(&[0, 1])), ids(&[0, 1]));
        assert!(order_elements(&[]).is_empty());
    }

    #[test]
    fn test_pheromone_color_range() {
        assert_eq!(pheromone_color(100.0, 30.0), Color::rgb(0, 100, 0));
        assert_eq!(pheromone_color(30.0, 30.0), Color::rgb(150, 0, 0));
        assert_eq!(pheromone_color(65.0, 30.0), Color::rgb(75, 100, 0));
    }

    #[test]
    fn test_city_labels() {
        assert_eq!(city_label(AgentId(0)), "A");
        assert_eq!(city_label(AgentId(25)), "Z");
        assert_eq!(city_label(AgentId(26)), "26");
        assert_eq!(tour_string(&[AgentId(0), AgentId(2), AgentId(1)]), "ACB");
    }

    #[test]
    fn test_draw_hides_weak_links_and_labels_cities() {
        let (mut colony, _) = colony(4, 8);
        let display = DisplayConfig {
            min_display_level: 60.0,
            ..DisplayConfig::default()
        };

        // Every trail starts at 50, below the threshold
        let mut frame = FrameRecorder::new();
        colony.draw(&display, &mut frame, 11.0);
        let commands = frame.into_commands();

        assert_eq!(commands.len(), 4);
        assert!(commands.iter().all(|c| matches!(
            c,
            lab_events::DrawCommand::Label { .. }
        )));
    }
}
