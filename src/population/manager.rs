use std::sync::Arc;

use tracing::{debug, warn};

use crate::chromosome::Chromosome;
use crate::constraints::ConstraintManager;
use crate::error::{GeneticError, Result};
use crate::population::individual::{Individual, Origin};
use crate::population::population::Population;
use crate::rng::RandomNumberGenerator;

/// Random genomes tried per missing slot before initialization gives up.
const ATTEMPTS_PER_SLOT: usize = 100;

/// Owns the policies that create and replace populations.
#[derive(Debug, Clone)]
pub struct PopulationManager<G: Chromosome> {
    shape: G::Shape,
    population_size: usize,
    elite_count: usize,
    seeds: Vec<G>,
    constraints: Option<Arc<ConstraintManager<G>>>,
}

impl<G: Chromosome> PopulationManager<G> {
    /// `elite_count` is the number of individuals carried over unchanged; pass 0
    /// to disable elitism.
    pub fn new(shape: G::Shape, population_size: usize, elite_count: usize) -> Self {
        Self {
            shape,
            population_size,
            elite_count: elite_count.min(population_size),
            seeds: Vec::new(),
            constraints: None,
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<G>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_constraints(mut self, constraints: Arc<ConstraintManager<G>>) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn population_size(&self) -> usize {
        self.population_size
    }

    pub fn elite_count(&self) -> usize {
        self.elite_count
    }

    pub fn shape(&self) -> &G::Shape {
        &self.shape
    }

    /// Number of offspring needed per generation.
    pub fn offspring_count(&self) -> usize {
        self.population_size - self.elite_count
    }

    /// Creates the first population: seeds first, then random genomes.
    ///
    /// Candidates that fail validation are discarded and replaced. Returns
    /// [`GeneticError::MaxAttemptsReached`] rather than a short population when
    /// valid genomes cannot be found.
    pub fn initialize(&self, rng: &mut RandomNumberGenerator) -> Result<Population<G>> {
        if self.population_size == 0 {
            return Err(GeneticError::EmptyPopulation);
        }

        let mut individuals = Vec::with_capacity(self.population_size);
        for seed in &self.seeds {
            if individuals.len() == self.population_size {
                break;
            }
            let mut genome = seed.clone();
            if self.accept(&mut genome, rng) {
                individuals.push(Individual::new(genome, Origin::Seeded, 0));
            } else {
                warn!("Discarding invalid seed genome");
            }
        }

        self.fill(&mut individuals, 0, rng)?;
        Ok(Population::new(individuals, 0))
    }

    /// Builds the population of `generation` from the scored `current` population
    /// and freshly bred, unevaluated `offspring`.
    ///
    /// The best `elite_count` individuals are copied with their fitness. The
    /// remaining slots are taken by offspring; surplus offspring are dropped and a
    /// shortfall is filled with random genomes, so the result always has exactly
    /// `population_size` individuals.
    pub fn next_generation(
        &self,
        current: &Population<G>,
        offspring: Vec<G>,
        generation: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Population<G>> {
        let mut individuals = Vec::with_capacity(self.population_size);

        individuals.extend(
            current
                .stats()
                .ranked
                .iter()
                .rev()
                .filter_map(|&i| current.get(i))
                .filter(|ind| ind.is_evaluated())
                .take(self.elite_count)
                .map(|ind| ind.clone().carried_over(Origin::Elite)),
        );

        let open = self.population_size - individuals.len();
        if offspring.len() < open {
            debug!(
                "Only {} offspring for {} open slots in generation {}",
                offspring.len(),
                open,
                generation
            );
        }
        individuals.extend(
            offspring
                .into_iter()
                .take(open)
                .map(|genome| Individual::new(genome, Origin::Offspring, generation)),
        );

        self.fill(&mut individuals, generation, rng)?;
        Ok(Population::new(individuals, generation))
    }

    /// Tops `population` up to `population_size` with random genomes.
    pub fn refill(
        &self,
        population: &mut Population<G>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        let generation = population.generation();
        let mut extra = Vec::new();
        let missing = self.population_size.saturating_sub(population.len());
        self.fill_n(&mut extra, missing, generation, rng)?;
        for individual in extra {
            population.push(individual);
        }
        population.refresh_statistics();
        Ok(())
    }

    fn fill(
        &self,
        individuals: &mut Vec<Individual<G>>,
        generation: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        let missing = self.population_size.saturating_sub(individuals.len());
        self.fill_n(individuals, missing, generation, rng)
    }

    fn fill_n(
        &self,
        individuals: &mut Vec<Individual<G>>,
        missing: usize,
        generation: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        let max_attempts = missing * ATTEMPTS_PER_SLOT;
        let mut attempts = 0;
        let mut added = 0;

        while added < missing {
            if attempts >= max_attempts {
                return Err(GeneticError::MaxAttemptsReached(format!(
                    "Generated {} of {} valid genomes in {} attempts",
                    added, missing, attempts
                )));
            }
            attempts += 1;

            let mut genome = G::random(&self.shape, rng);
            if self.accept(&mut genome, rng) {
                individuals.push(Individual::new(genome, Origin::Random, generation));
                added += 1;
            }
        }
        Ok(())
    }

    /// Repairs the genome and reports whether it passes domain validation and
    /// every hard constraint.
    fn accept(&self, genome: &mut G, rng: &mut RandomNumberGenerator) -> bool {
        if !genome.is_valid() {
            genome.repair(rng);
        }
        if let Some(constraints) = &self.constraints {
            constraints.repair_all(genome, rng);
            if !constraints.is_valid(genome) {
                return false;
            }
        }
        genome.is_valid()
    }
}
