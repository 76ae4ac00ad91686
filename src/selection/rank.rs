use serde::{Deserialize, Serialize};

use crate::chromosome::Chromosome;
use crate::error::{GeneticError, Result};
use crate::population::Population;
use crate::rng::RandomNumberGenerator;
use crate::selection::selection_strategy::SelectionStrategy;

/// A selection strategy that selects individuals based on their rank in the population.
///
/// Linear ranking: the worst individual gets weight `2 - sp`, the best `sp`, where
/// `sp` is the selection pressure in `[1, 2]`. Because only ranks matter, this
/// works with negative fitness and is insensitive to a single outlier dominating
/// the wheel.
///
/// The cumulative weight of the first `k` ranks has a closed form, so a draw is a
/// binary search over ranks in `O(log n)` using the ranking kept by the population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankBasedSelection {
    selection_pressure: f64,
}

impl RankBasedSelection {
    /// # Errors
    ///
    /// Returns an error if `selection_pressure` is outside `[1, 2]`.
    pub fn new(selection_pressure: f64) -> Result<Self> {
        if !(1.0..=2.0).contains(&selection_pressure) {
            return Err(GeneticError::Configuration(format!(
                "Selection pressure must be in [1, 2], got {}",
                selection_pressure
            )));
        }
        Ok(Self { selection_pressure })
    }

    pub fn selection_pressure(&self) -> f64 {
        self.selection_pressure
    }

    /// Total weight of ranks `0..=rank` out of `n` (rank 0 is the worst).
    fn cumulative_weight(&self, rank: usize, n: usize) -> f64 {
        let sp = self.selection_pressure;
        let k = rank as f64 + 1.0;
        if n < 2 {
            return k;
        }
        let slope = 2.0 * (sp - 1.0) / (n as f64 - 1.0);
        k * (2.0 - sp) + slope * (k - 1.0) * k / 2.0
    }

    fn rank_for_point(&self, point: f64, n: usize) -> usize {
        let (mut lo, mut hi) = (0, n - 1);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.cumulative_weight(mid, n) < point {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

impl Default for RankBasedSelection {
    fn default() -> Self {
        Self {
            selection_pressure: 1.5,
        }
    }
}

impl<G> SelectionStrategy<G> for RankBasedSelection
where
    G: Chromosome,
{
    fn select_index(
        &self,
        population: &Population<G>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<usize> {
        let n = population.len();
        if n == 0 {
            return Err(GeneticError::EmptyPopulation);
        }

        // Weights sum to n.
        let point = n as f64 * (1.0 - rng.gen_f64());
        let rank = self.rank_for_point(point, n);
        Ok(population.stats().ranked[rank])
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
                let mut ind = Individual::new(BitVector::new(vec![true]), Origin::Random, 0);
                ind.set_fitness(f);
                ind
            })
            .collect();
        Population::new(individuals, 0)
    }

    #[test]
    fn test_pressure_validation() {
        assert!(RankBasedSelection::new(0.5).is_err());
        assert!(RankBasedSelection::new(2.5).is_err());
        assert!(RankBasedSelection::new(1.0).is_ok());
    }

    #[test]
    fn test_weights_sum_to_population_size() {
        let selection = RankBasedSelection::new(1.7).unwrap();
        let n = 9;
        assert!((selection.cumulative_weight(n - 1, n) - n as f64).abs() < 1e-9);
    }

    #[test]
    fn test_full_pressure_never_picks_worst() {
        let selection = RankBasedSelection::new(2.0).unwrap();
        // Worst has weight 0 at sp = 2.
        let pop = population(&[-10.0, 3.0, 1.0]);
        let mut rng = RandomNumberGenerator::from_seed(4);
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            counts[selection.select_index(&pop, &mut rng).unwrap()] += 1;
        }
        assert_eq!(counts[0], 0);
        // Best has twice the weight of the middle rank.
        assert!(counts[1] > counts[2]);
    }

    #[test]
    fn test_no_pressure_is_uniform() {
        let selection = RankBasedSelection::new(1.0).unwrap();
        let pop = population(&[1.0, 2.0, 3.0, 4.0]);
        let mut rng = RandomNumberGenerator::from_seed(5);
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            counts[selection.select_index(&pop, &mut rng).unwrap()] += 1;
        }
        assert!(counts.iter().all(|&c| c > 850 && c < 1150));
    }
}
