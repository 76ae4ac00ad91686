use serde::{Deserialize, Serialize};

use crate::chromosome::Chromosome;
use crate::error::{GeneticError, Result};
use crate::population::Population;
use crate::rng::RandomNumberGenerator;
use crate::selection::selection_strategy::SelectionStrategy;

/// A selection strategy that selects individuals through roulette wheel selection.
///
/// Roulette wheel selection (also known as fitness proportionate selection) selects
/// individuals with probability proportional to their fitness. It reads the
/// population's cumulative fitness array, computed once per generation, and finds
/// the drawn point by binary search in `O(log n)`.
///
/// Negative fitness values contribute nothing to the wheel. When the total fitness
/// is not positive the selection falls back to a uniform draw.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouletteWheelSelection;

impl RouletteWheelSelection {
    pub fn new() -> Self {
        Self
    }

    /// Index of the smallest cumulative value that is `>= point`.
    ///
    /// A point beyond the last value maps to the last index.
    pub fn index_for_point(cumulative: &[f64], point: f64) -> usize {
        let idx = cumulative.partition_point(|&c| c < point);
        idx.min(cumulative.len().saturating_sub(1))
    }
}

impl<G> SelectionStrategy<G> for RouletteWheelSelection
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

        let total = population.total_fitness();
        if total <= 0.0 || !total.is_finite() {
            return Ok(rng.gen_index(population.len()));
        }

        // Open at zero so zero-weight individuals at the front are never chosen.
        let point = total * (1.0 - rng.gen_f64());
        Ok(Self::index_for_point(population.cumulative_fitness(), point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::BitVector;
    use crate::population::{Individual, Origin};

    fn population(fitness: &[f64]) -> Population<BitVector> {
        let individuals = fitness
            .iter()
            .map(|&f| {
                let mut ind = Individual::new(BitVector::new(vec![false]), Origin::Random, 0);
                ind.set_fitness(f);
                ind
            })
            .collect();
        Population::new(individuals, 0)
    }

    #[test]
    fn test_boundary_convention() {
        let pop = population(&[1.0, 2.0, 3.0, 4.0]);
        let cumulative = pop.cumulative_fitness();
        assert_eq!(cumulative, &[1.0, 3.0, 6.0, 10.0]);
        assert_eq!(RouletteWheelSelection::index_for_point(cumulative, 5.5), 2);
        assert_eq!(RouletteWheelSelection::index_for_point(cumulative, 3.0), 1);
        assert_eq!(RouletteWheelSelection::index_for_point(cumulative, 3.0001), 2);
        assert_eq!(RouletteWheelSelection::index_for_point(cumulative, 0.2), 0);
        assert_eq!(RouletteWheelSelection::index_for_point(cumulative, 10.0), 3);
        assert_eq!(RouletteWheelSelection::index_for_point(cumulative, 11.0), 3);
    }

    #[test]
    fn test_zero_weight_never_selected() {
        let pop = population(&[0.0, -3.0, 5.0, 0.0]);
        let mut rng = RandomNumberGenerator::from_seed(1);
        for _ in 0..500 {
            assert_eq!(
                RouletteWheelSelection.select_index(&pop, &mut rng).unwrap(),
                2
            );
        }
    }

    #[test]
    fn test_all_zero_falls_back_to_uniform() {
        let pop = population(&[0.0, 0.0, -1.0, 0.0]);
        let mut rng = RandomNumberGenerator::from_seed(2);
        let mut seen = [0usize; 4];
        for _ in 0..400 {
            seen[RouletteWheelSelection.select_index(&pop, &mut rng).unwrap()] += 1;
        }
        assert!(seen.iter().all(|&count| count > 50));
    }

    #[test]
    fn test_proportional_frequencies() {
        let pop = population(&[1.0, 3.0]);
        let mut rng = RandomNumberGenerator::from_seed(3);
        let high = (0..4000)
            .filter(|_| RouletteWheelSelection.select_index(&pop, &mut rng).unwrap() == 1)
            .count();
        assert!(high > 2800 && high < 3200);
    }
}
