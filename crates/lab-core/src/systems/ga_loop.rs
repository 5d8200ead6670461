//! Closed-Loop GA
//!
//! Evolves closed loops through a fixed set of points. A chromosome is a cycle
//! of distinct point agents and its fitness is the loop's length. The goal is
//! not the shortest loop but one whose length matches `fitness_target`, so
//! individuals are ranked by discrepancy `|fitness_target - fitness|`.
//!
//! Each step is one steady-state generation: two tournament winners mate, the
//! child mutates, and it replaces the worst individual if it beats it. The
//! world's links always show the current best loop.

use bevy_ecs::prelude::*;
use rand::seq::{index, SliceRandom};
use rand::Rng;
use std::collections::BTreeSet;

use crate::components::{AgentId, AgentRegistry, Board, SimWorld};
use crate::config::GaConfig;
use crate::error::SimError;

pub type Chromosome = Vec<AgentId>;

/// Positions tried when inserting or removing a gene
const SAMPLED_POSITIONS: usize = 3;

/// One candidate loop
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub chromosome: Chromosome,
    pub fitness: f64,
}

impl Individual {
    pub fn new(agents: &AgentRegistry, chromosome: Chromosome) -> Self {
        let fitness = chromosome_fitness(agents, &chromosome);
        Self { chromosome, fitness }
    }

    pub fn discrepancy(&self, target: f64) -> f64 {
        (target - self.fitness).abs()
    }
}

/// Result of a trial edit to a chromosome
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub chromosome: Chromosome,
    pub fitness: f64,
    pub discrepancy: f64,
}

/// Best individual after a generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub generation: u64,
    pub best: Individual,
    pub discrepancy: f64,
}

/// Closed-loop length: consecutive genes plus the hop from last back to first
pub fn chromosome_fitness(agents: &AgentRegistry, chromosome: &[AgentId]) -> f64 {
    let len = chromosome.len();
    (0..len)
        .filter_map(|i| agents.distance(chromosome[i], chromosome[(i + 1) % len]))
        .sum()
}

fn dist(agents: &AgentRegistry, a: AgentId, b: AgentId) -> f64 {
    agents.distance(a, b).unwrap_or(0.0)
}

/// What the chromosome would look like, and score, with `new_gene` placed
/// between positions `pos` and `pos + 1`.
///
/// Fitness is updated incrementally from `current_fitness`. This also works
/// for a one-gene chromosome, where both neighbors are the same gene.
pub fn trial_insertion(
    agents: &AgentRegistry,
    target: f64,
    current_fitness: f64,
    chromosome: &[AgentId],
    pos: usize,
    new_gene: AgentId,
) -> Trial {
    let len = chromosome.len();
    let gene_at_pos = chromosome[pos];
    let gene_at_pos_plus_1 = chromosome[(pos + 1) % len];
    let fitness = current_fitness - dist(agents, gene_at_pos, gene_at_pos_plus_1)
        + dist(agents, gene_at_pos, new_gene)
        + dist(agents, new_gene, gene_at_pos_plus_1);

    let mut new_chrom = Vec::with_capacity(len + 1);
    new_chrom.extend_from_slice(&chromosome[..=pos]);
    new_chrom.push(new_gene);
    new_chrom.extend_from_slice(&chromosome[pos + 1..]);

    Trial {
        chromosome: new_chrom,
        fitness,
        discrepancy: (target - fitness).abs(),
    }
}

/// Insert `gene` at whichever of a few sampled positions gives the lowest
/// discrepancy
pub fn add_gene_to_chromosome<R: Rng + ?Sized>(
    agents: &AgentRegistry,
    target: f64,
    fitness: f64,
    gene: AgentId,
    chromosome: &[AgentId],
    rng: &mut R,
) -> Trial {
    let len = chromosome.len();
    if len == 0 {
        return Trial {
            chromosome: vec![gene],
            fitness: 0.0,
            discrepancy: target.abs(),
        };
    }

    let mut best: Option<Trial> = None;
    for pos in index::sample(rng, len, SAMPLED_POSITIONS.min(len)).into_iter() {
        let trial = trial_insertion(agents, target, fitness, chromosome, pos, gene);
        if best.as_ref().map_or(true, |b| trial.discrepancy < b.discrepancy) {
            best = Some(trial);
        }
    }
    // At least one position was sampled
    best.unwrap_or_else(|| trial_insertion(agents, target, fitness, chromosome, 0, gene))
}

/// Swap one gene for a better one.
///
/// For a few sampled positions, remove the gene there and try re-inserting
/// either it or one of a few unused genes. Keeps the lowest discrepancy.
pub fn replace_gene_in_chromosome<R: Rng + ?Sized>(
    agents: &AgentRegistry,
    target: f64,
    original_fitness: f64,
    chromosome: &[AgentId],
    rng: &mut R,
) -> Trial {
    let len = chromosome.len();
    let in_use: BTreeSet<AgentId> = chromosome.iter().copied().collect();
    let available: Vec<AgentId> = agents.ids().filter(|id| !in_use.contains(id)).collect();

    let mut best: Option<Trial> = None;
    for i in index::sample(rng, len, SAMPLED_POSITIONS.min(len)).into_iter() {
        let gene_before = chromosome[(i + len - 1) % len];
        let removed_gene = chromosome[i];
        let gene_after = chromosome[(i + 1) % len];
        let fitness_after_removal = original_fitness
            - dist(agents, gene_before, removed_gene)
            - dist(agents, removed_gene, gene_after)
            + dist(agents, gene_before, gene_after);

        let sample_size = (if len == 2 { 5 } else { 4 }).min(available.len());
        let mut candidates: Vec<AgentId> = available
            .choose_multiple(rng, sample_size)
            .copied()
            .collect();
        candidates.push(removed_gene);

        let mut remaining = chromosome.to_vec();
        remaining.remove(i);

        for gene in candidates {
            let trial = add_gene_to_chromosome(
                agents,
                target,
                fitness_after_removal,
                gene,
                &remaining,
                rng,
            );
            if best.as_ref().map_or(true, |b| trial.discrepancy < b.discrepancy) {
                best = Some(trial);
            }
        }
    }

    best.unwrap_or_else(|| Trial {
        chromosome: chromosome.to_vec(),
        fitness: original_fitness,
        discrepancy: (target - original_fitness).abs(),
    })
}

/// Reverse a random contiguous stretch of the chromosome
pub fn reverse_subseq<R: Rng + ?Sized>(chromosome: &[AgentId], rng: &mut R) -> Chromosome {
    let mut result = chromosome.to_vec();
    let len = result.len();
    if len < 2 {
        return result;
    }
    let a = rng.gen_range(0..len);
    let b = rng.gen_range(0..len);
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    result[lo..=hi].reverse();
    result
}

/// Crossover that keeps every gene distinct.
///
/// Position by position the child takes a gene from either parent at random,
/// skipping genes it already has. When both parents' genes at a position are
/// taken, it uses the first unused gene from either parent.
pub fn cx_all_diff<R: Rng + ?Sized>(
    parent_1: &[AgentId],
    parent_2: &[AgentId],
    rng: &mut R,
) -> Chromosome {
    let mut used = BTreeSet::new();
    let mut child = Vec::with_capacity(parent_1.len());

    for i in 0..parent_1.len() {
        let candidates: Vec<AgentId> = [Some(parent_1[i]), parent_2.get(i).copied()]
            .into_iter()
            .flatten()
            .filter(|g| !used.contains(g))
            .collect();

        let gene = match candidates.choose(rng) {
            Some(&gene) => Some(gene),
            None => parent_1
                .iter()
                .chain(parent_2)
                .copied()
                .find(|g| !used.contains(g)),
        };
        if let Some(gene) = gene {
            used.insert(gene);
            child.push(gene);
        }
    }
    child
}

/// Resource: the GA population and the points it draws genes from
#[derive(Resource, Debug)]
pub struct LoopGa {
    config: GaConfig,
    world: SimWorld,
    individuals: Vec<Individual>,
    best: Option<Individual>,
    generation: u64,
}

impl LoopGa {
    /// Spawn the points and a random initial population
    pub fn setup<R: Rng + ?Sized>(
        config: GaConfig,
        board: Board,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        if config.cycle_length < 2 {
            return Err(SimError::CycleTooShort(config.cycle_length));
        }
        if config.nbr_points < config.cycle_length {
            return Err(SimError::NotEnoughPoints {
                cycle_length: config.cycle_length,
                points: config.nbr_points,
            });
        }
        if config.pop_size == 0 {
            return Err(SimError::EmptyPopulation);
        }

        let mut world = SimWorld::new();
        world.agents.spawn_random(config.nbr_points, &board, rng);

        let mut ga = Self {
            config,
            world,
            individuals: Vec::new(),
            best: None,
            generation: 0,
        };
        ga.individuals = (0..ga.config.pop_size)
            .map(|_| ga.gen_individual(rng))
            .collect();
        ga.set_results()?;

        tracing::debug!(
            "GA set up: {} points, population {}, cycle length {}",
            ga.config.nbr_points,
            ga.config.pop_size,
            ga.config.cycle_length
        );
        Ok(ga)
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn best(&self) -> Option<&Individual> {
        self.best.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn discrepancy(&self, individual: &Individual) -> f64 {
        individual.discrepancy(self.config.fitness_target)
    }

    /// A random cycle of `cycle_length` distinct points
    pub fn gen_individual<R: Rng + ?Sized>(&self, rng: &mut R) -> Individual {
        let ids: Vec<AgentId> = self.world.agents.ids().collect();
        let mut chromosome: Chromosome = ids
            .choose_multiple(rng, self.config.cycle_length)
            .copied()
            .collect();
        chromosome.shuffle(rng);
        Individual::new(&self.world.agents, chromosome)
    }

    /// One generation
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<GenerationReport, SimError> {
        let parent_1 = self.tournament(rng)?.chromosome.clone();
        let parent_2 = self.tournament(rng)?.chromosome.clone();

        let chromosome = cx_all_diff(&parent_1, &parent_2, rng);
        let child = Individual::new(&self.world.agents, chromosome);
        let child = self.mutate(child, rng);

        let target = self.config.fitness_target;
        let worst = self
            .individuals
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.discrepancy(target).total_cmp(&b.discrepancy(target)))
            .map(|(i, _)| i)
            .ok_or(SimError::EmptyPopulation)?;
        if child.discrepancy(target) < self.individuals[worst].discrepancy(target) {
            self.individuals[worst] = child;
        }

        self.generation += 1;
        let best = self.set_results()?;
        let discrepancy = best.discrepancy(target);
        tracing::debug!(
            "Generation {}: best fitness {:.1} (discrepancy {:.1})",
            self.generation,
            best.fitness,
            discrepancy
        );

        Ok(GenerationReport {
            generation: self.generation,
            best,
            discrepancy,
        })
    }

    /// Apply the two mutations, each with its configured chance
    pub fn mutate<R: Rng + ?Sized>(&self, mut individual: Individual, rng: &mut R) -> Individual {
        let agents = &self.world.agents;
        let target = self.config.fitness_target;

        if rng.gen_range(0..100) < self.config.replace_gene {
            let trial = replace_gene_in_chromosome(
                agents,
                target,
                individual.fitness,
                &individual.chromosome,
                rng,
            );
            individual.chromosome = trial.chromosome;
            individual.fitness = trial.fitness;
        }

        if rng.gen_range(0..100) < self.config.reverse_subseq {
            individual.chromosome = reverse_subseq(&individual.chromosome, rng);
            individual.fitness = chromosome_fitness(agents, &individual.chromosome);
        }

        individual
    }

    /// Change the loop size of every individual.
    ///
    /// Longer chromosomes are truncated; shorter ones grow one unused gene at a
    /// time through [`add_gene_to_chromosome`].
    pub fn set_cycle_length<R: Rng + ?Sized>(
        &mut self,
        cycle_length: usize,
        rng: &mut R,
    ) -> Result<(), SimError> {
        if cycle_length < 2 {
            return Err(SimError::CycleTooShort(cycle_length));
        }
        if cycle_length > self.world.agents.len() {
            return Err(SimError::NotEnoughPoints {
                cycle_length,
                points: self.world.agents.len(),
            });
        }
        if cycle_length == self.config.cycle_length {
            return Ok(());
        }

        self.world.links.clear();
        self.config.cycle_length = cycle_length;
        let target = self.config.fitness_target;
        let agents = &self.world.agents;

        for ind in self.individuals.iter_mut() {
            if cycle_length < ind.chromosome.len() {
                ind.chromosome.truncate(cycle_length);
                ind.fitness = chromosome_fitness(agents, &ind.chromosome);
                continue;
            }

            let in_use: BTreeSet<AgentId> = ind.chromosome.iter().copied().collect();
            let available: Vec<AgentId> = agents.ids().filter(|id| !in_use.contains(id)).collect();
            let new_genes: Vec<AgentId> = available
                .choose_multiple(rng, cycle_length - ind.chromosome.len())
                .copied()
                .collect();
            for gene in new_genes {
                let trial =
                    add_gene_to_chromosome(agents, target, ind.fitness, gene, &ind.chromosome, rng);
                ind.chromosome = trial.chromosome;
                ind.fitness = trial.fitness;
            }
        }

        tracing::info!("Cycle length changed to {}", cycle_length);
        self.set_results()?;
        Ok(())
    }

    /// Lowest-discrepancy individual of `tournament_size` random picks
    fn tournament<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&Individual, SimError> {
        let target = self.config.fitness_target;
        (0..self.config.tournament_size.max(1))
            .filter_map(|_| self.individuals.choose(rng))
            .min_by(|a, b| a.discrepancy(target).total_cmp(&b.discrepancy(target)))
            .ok_or(SimError::EmptyPopulation)
    }

    /// Record the best individual and redraw its loop as the world's links
    fn set_results(&mut self) -> Result<Individual, SimError> {
        let target = self.config.fitness_target;
        let best = self
            .individuals
            .iter()
            .min_by(|a, b| a.discrepancy(target).total_cmp(&b.discrepancy(target)))
            .cloned()
            .ok_or(SimError::EmptyPopulation)?;

        self.world.links.clear();
        link_best_chromosome(&mut self.world, &best.chromosome)?;
        self.best = Some(best.clone());
        Ok(best)
    }
}

/// Link consecutive genes, closing the loop. A two-gene loop is one link.
pub fn link_best_chromosome(world: &mut SimWorld, chromosome: &[AgentId]) -> Result<(), SimError> {
    let len = chromosome.len();
    for i in 0..len {
        world.link(chromosome[i], chromosome[(i + 1) % len], false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Xy;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    /// Four points on the corners of a 100x100 square
    fn square() -> (AgentRegistry, Vec<AgentId>) {
        let mut agents = AgentRegistry::new();
        let ids = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]
            .into_iter()
            .map(|(x, y)| agents.spawn(Xy::new(x, y)))
            .collect();
        (agents, ids)
    }

    fn is_distinct(chromosome: &[AgentId]) -> bool {
        chromosome.iter().collect::<BTreeSet<_>>().len() == chromosome.len()
    }

    #[test]
    fn test_chromosome_fitness_closes_loop() {
        let (agents, ids) = square();
        assert_eq!(chromosome_fitness(&agents, &ids), 400.0);
        assert_eq!(chromosome_fitness(&agents, &ids[..2]), 200.0);
        assert_eq!(chromosome_fitness(&agents, &ids[..1]), 0.0);
    }

    #[test]
    fn test_trial_insertion_matches_full_recompute() {
        let (agents, ids) = square();
        let chrom = vec![ids[0], ids[1], ids[2]];
        let fitness = chromosome_fitness(&agents, &chrom);

        for pos in 0..chrom.len() {
            let trial = trial_insertion(&agents, 0.0, fitness, &chrom, pos, ids[3]);
            assert_eq!(trial.chromosome.len(), 4);
            assert_eq!(trial.chromosome[pos + 1], ids[3]);
            let full = chromosome_fitness(&agents, &trial.chromosome);
            assert!((trial.fitness - full).abs() < 1e-9);
            assert_eq!(trial.discrepancy, trial.fitness);
        }
    }

    #[test]
    fn test_add_gene_keeps_fitness_consistent() {
        let (agents, ids) = square();
        let mut rng = SmallRng::seed_from_u64(3);
        let chrom = vec![ids[0], ids[2]];
        let fitness = chromosome_fitness(&agents, &chrom);

        let trial = add_gene_to_chromosome(&agents, 400.0, fitness, ids[1], &chrom, &mut rng);
        assert_eq!(trial.chromosome.len(), 3);
        assert!(is_distinct(&trial.chromosome));
        let full = chromosome_fitness(&agents, &trial.chromosome);
        assert!((trial.fitness - full).abs() < 1e-9);
    }

    #[test]
    fn test_replace_gene_keeps_length_and_distinctness() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut agents = AgentRegistry::new();
        agents.spawn_random(12, &Board::default(), &mut rng);
        let chrom: Chromosome = agents.ids().take(5).collect();
        let fitness = chromosome_fitness(&agents, &chrom);

        for _ in 0..20 {
            let trial = replace_gene_in_chromosome(&agents, 900.0, fitness, &chrom, &mut rng);
            assert_eq!(trial.chromosome.len(), 5);
            assert!(is_distinct(&trial.chromosome));
            let full = chromosome_fitness(&agents, &trial.chromosome);
            assert!((trial.fitness - full).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cx_all_diff_produces_distinct_genes() {
        let mut rng = SmallRng::seed_from_u64(5);
        let ids: Vec<AgentId> = (0..6).map(AgentId).collect();
        let p1 = vec![ids[0], ids[1], ids[2], ids[3]];
        let p2 = vec![ids[1], ids[0], ids[4], ids[5]];

        for _ in 0..50 {
            let child = cx_all_diff(&p1, &p2, &mut rng);
            assert_eq!(child.len(), 4);
            assert!(is_distinct(&child));
            assert!(child.iter().all(|g| p1.contains(g) || p2.contains(g)));
        }
    }

    #[test]
    fn test_reverse_subseq_is_a_permutation() {
        let mut rng = SmallRng::seed_from_u64(9);
        let chrom: Chromosome = (0..8).map(AgentId).collect();
        let reversed = reverse_subseq(&chrom, &mut rng);

        let mut sorted = reversed.clone();
        sorted.sort();
        assert_eq!(sorted, chrom);
    }

    #[test]
    fn test_setup_links_best_loop() {
        let mut rng = SmallRng::seed_from_u64(21);
        let ga = LoopGa::setup(GaConfig::default(), Board::default(), &mut rng).unwrap();

        assert_eq!(ga.individuals().len(), 40);
        assert!(ga
            .individuals()
            .iter()
            .all(|ind| ind.chromosome.len() == 10 && is_distinct(&ind.chromosome)));

        let best = ga.best().unwrap();
        assert_eq!(ga.world().links.len(), 10);
        for i in 0..10 {
            let a = best.chromosome[i];
            let b = best.chromosome[(i + 1) % 10];
            assert!(ga.world().links.find(b, a, false).is_some());
        }
    }

    #[test]
    fn test_two_gene_loop_is_one_link() {
        let (agents, ids) = square();
        let mut world = SimWorld {
            agents,
            ..SimWorld::default()
        };
        link_best_chromosome(&mut world, &ids[..2]).unwrap();
        assert_eq!(world.links.len(), 1);
    }

    #[test]
    fn test_step_never_worsens_best() {
        let mut rng = SmallRng::seed_from_u64(33);
        let mut ga = LoopGa::setup(GaConfig::default(), Board::default(), &mut rng).unwrap();
        let mut previous = ga.discrepancy(ga.best().unwrap());

        for expected_generation in 1..=30 {
            let report = ga.step(&mut rng).unwrap();
            assert_eq!(report.generation, expected_generation);
            assert!(report.discrepancy <= previous + 1e-9);
            previous = report.discrepancy;
        }
        assert_eq!(ga.generation(), 30);
    }

    #[test]
    fn test_set_cycle_length_resizes_population() {
        let mut rng = SmallRng::seed_from_u64(44);
        let mut ga = LoopGa::setup(GaConfig::default(), Board::default(), &mut rng).unwrap();

        ga.set_cycle_length(6, &mut rng).unwrap();
        assert!(ga.individuals().iter().all(|i| i.chromosome.len() == 6));
        assert_eq!(ga.world().links.len(), 6);

        ga.set_cycle_length(14, &mut rng).unwrap();
        assert!(ga
            .individuals()
            .iter()
            .all(|i| i.chromosome.len() == 14 && is_distinct(&i.chromosome)));
        assert_eq!(ga.config().cycle_length, 14);

        assert_eq!(
            ga.set_cycle_length(1, &mut rng),
            Err(SimError::CycleTooShort(1))
        );
        assert!(matches!(
            ga.set_cycle_length(50, &mut rng),
            Err(SimError::NotEnoughPoints { .. })
        ));
    }

    #[test]
    fn test_setup_rejects_impossible_cycle() {
        let mut rng = SmallRng::seed_from_u64(1);
        let config = GaConfig {
            nbr_points: 4,
            cycle_length: 6,
            ..GaConfig::default()
        };
        assert_eq!(
            LoopGa::setup(config, Board::default(), &mut rng).unwrap_err(),
            SimError::NotEnoughPoints {
                cycle_length: 6,
                points: 4
            }
        );
    }
}
