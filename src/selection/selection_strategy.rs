use std::fmt::Debug;

use crate::chromosome::Chromosome;
use crate::error::Result;
use crate::population::Population;
use crate::rng::RandomNumberGenerator;

/// Trait for parent selection strategies.
///
/// Selection strategies choose parents from a scored population. They never modify
/// the population: they return the index of the chosen individual, which stays owned
/// by the population.
///
/// # Examples
///
/// ```
/// use genopt::genome::BitVector;
/// use genopt::population::{Individual, Origin, Population};
/// use genopt::rng::RandomNumberGenerator;
/// use genopt::selection::{SelectionStrategy, TournamentSelection};
///
/// let individuals = (0..4)
///     .map(|i| {
///         let mut ind = Individual::new(BitVector::new(vec![i % 2 == 0]), Origin::Random, 0);
///         ind.set_fitness(i as f64);
///         ind
///     })
///     .collect();
/// let population = Population::new(individuals, 0);
///
/// let selection = TournamentSelection::new(4).unwrap();
/// let mut rng = RandomNumberGenerator::from_seed(7);
/// let index = selection.select_index(&population, &mut rng).unwrap();
/// assert!(index < 4);
/// ```
pub trait SelectionStrategy<G>: Debug + Send + Sync
where
    G: Chromosome,
{
    /// Selects one individual and returns its index in `population`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::GeneticError::EmptyPopulation`] if the population is empty.
    fn select_index(
        &self,
        population: &Population<G>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<usize>;

    /// Selects two parents. They may be the same individual.
    fn select_pair(
        &self,
        population: &Population<G>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<(usize, usize)> {
        let first = self.select_index(population, rng)?;
        let second = self.select_index(population, rng)?;
        Ok((first, second))
    }

    /// Individuals drawn per selection, for strategies that sample a fixed number.
    fn sample_size(&self) -> Option<usize> {
        None
    }
}
