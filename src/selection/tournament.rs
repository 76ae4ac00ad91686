use serde::{Deserialize, Serialize};

use crate::chromosome::Chromosome;
use crate::error::{GeneticError, Result};
use crate::evolution::options::EvolutionOptions;
use crate::population::Population;
use crate::rng::RandomNumberGenerator;
use crate::selection::selection_strategy::SelectionStrategy;

/// A selection strategy that selects individuals through tournament selection.
///
/// Each selection draws `tournament_size` indices uniformly with replacement and
/// returns the fittest of them. Ties go to the first drawn contestant. A selection
/// costs `O(tournament_size)` regardless of the population size.
///
/// - Smaller tournament sizes lead to more exploration (more random selection)
/// - Larger tournament sizes lead to more exploitation (more focus on the best individuals)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentSelection {
    tournament_size: usize,
}

impl TournamentSelection {
    /// Creates a new TournamentSelection strategy with the specified tournament size.
    ///
    /// # Errors
    ///
    /// Returns an error if `tournament_size` is 0.
    pub fn new(tournament_size: usize) -> Result<Self> {
        if tournament_size < 1 {
            return Err(GeneticError::Configuration(
                "Tournament size must be at least 1".to_string(),
            ));
        }
        Ok(Self { tournament_size })
    }

    /// Uses the tournament size configured in `options`.
    pub fn from_options(options: &EvolutionOptions) -> Result<Self> {
        Self::new(options.get_tournament_size())
    }

    pub fn tournament_size(&self) -> usize {
        self.tournament_size
    }
}

impl Default for TournamentSelection {
    fn default() -> Self {
        Self { tournament_size: 2 }
    }
}

impl<G> SelectionStrategy<G> for TournamentSelection
where
    G: Chromosome,
{
    fn select_index(
        &self,
        population: &Population<G>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<usize> {
        if population.is_empty() {
            return Err(GeneticError::EmptyPopulation);
        }

        let mut best_idx = rng.gen_index(population.len());
        let mut best_fitness = population.fitness_of(best_idx);

        for _ in 1..self.tournament_size {
            let idx = rng.gen_index(population.len());
            let fitness = population.fitness_of(idx);
            if fitness > best_fitness {
                best_idx = idx;
                best_fitness = fitness;
            }
        }

        Ok(best_idx)
    }

    fn sample_size(&self) -> Option<usize> {
        Some(self.tournament_size)
    }
}
