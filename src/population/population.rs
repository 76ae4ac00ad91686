use crate::chromosome::Chromosome;
use crate::population::individual::Individual;

/// Below this size diversity is computed over every pair.
const EXACT_DIVERSITY_LIMIT: usize = 64;
/// Number of neighbours each individual is compared with above the exact limit.
const DIVERSITY_NEIGHBOURS: usize = 8;

/// Statistics derived from the fitness of a population, recomputed in one pass
/// by [`Population::refresh_statistics`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationStats {
    /// Sum of the non-negative fitness values.
    pub total_fitness: f64,
    /// Prefix sums of `max(fitness, 0)`, non-decreasing.
    pub cumulative_fitness: Vec<f64>,
    pub best_index: Option<usize>,
    pub best_fitness: Option<f64>,
    pub average_fitness: f64,
    pub fitness_std: f64,
    /// Mean pairwise `1 - similarity`, in `[0, 1]`.
    pub diversity: f64,
    /// Indices ordered from worst to best fitness.
    pub ranked: Vec<usize>,
}

/// The individuals of one generation together with their derived statistics.
///
/// Unevaluated individuals take no part in the statistics: they add nothing to the
/// cumulative fitness and can never be the best. Infinite penalty scores count for
/// the ranking only.
#[derive(Debug, Clone)]
pub struct Population<G> {
    individuals: Vec<Individual<G>>,
    generation: usize,
    stats: PopulationStats,
}

impl<G: Chromosome> Population<G> {
    pub fn new(individuals: Vec<Individual<G>>, generation: usize) -> Self {
        let mut population = Self {
            individuals,
            generation,
            stats: PopulationStats::default(),
        };
        population.refresh_statistics();
        population
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn individuals(&self) -> &[Individual<G>] {
        &self.individuals
    }

    pub fn get(&self, index: usize) -> Option<&Individual<G>> {
        self.individuals.get(index)
    }

    pub fn into_individuals(self) -> Vec<Individual<G>> {
        self.individuals
    }

    pub fn stats(&self) -> &PopulationStats {
        &self.stats
    }

    /// Fitness used for comparisons. Unevaluated individuals rank below everything.
    pub fn fitness_of(&self, index: usize) -> f64 {
        self.individuals
            .get(index)
            .and_then(Individual::fitness)
            .unwrap_or(f64::NEG_INFINITY)
    }

    pub fn best(&self) -> Option<&Individual<G>> {
        self.stats.best_index.and_then(|i| self.individuals.get(i))
    }

    pub fn total_fitness(&self) -> f64 {
        self.stats.total_fitness
    }

    pub fn cumulative_fitness(&self) -> &[f64] {
        &self.stats.cumulative_fitness
    }

    pub fn diversity(&self) -> f64 {
        self.stats.diversity
    }

    /// Indices of individuals that still need a fitness value.
    pub fn unevaluated_indices(&self) -> Vec<usize> {
        self.individuals
            .iter()
            .enumerate()
            .filter(|(_, ind)| !ind.is_evaluated())
            .map(|(i, _)| i)
            .collect()
    }

    /// Mutable access to the individuals. Call [`Population::refresh_statistics`]
    /// after changing fitness values.
    pub fn individuals_mut(&mut self) -> &mut [Individual<G>] {
        &mut self.individuals
    }

    /// Removes and returns the individuals at `indices`.
    pub fn take(&mut self, indices: &[usize]) -> Vec<Individual<G>> {
        let mut sorted: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.individuals.len())
            .collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut taken = Vec::with_capacity(sorted.len());
        for &i in sorted.iter().rev() {
            taken.push(self.individuals.remove(i));
        }
        taken.reverse();
        self.refresh_statistics();
        taken
    }

    /// Puts `individual` in place of the one at `index`, returning the replaced one.
    pub fn replace(&mut self, index: usize, individual: Individual<G>) -> Option<Individual<G>> {
        let slot = self.individuals.get_mut(index)?;
        let old = std::mem::replace(slot, individual);
        Some(old)
    }

    pub fn push(&mut self, individual: Individual<G>) {
        self.individuals.push(individual);
    }

    /// Recomputes every statistic in `O(n)` plus the diversity estimate and the
    /// `O(n log n)` ranking.
    pub fn refresh_statistics(&mut self) {
        let n = self.individuals.len();
        let mut cumulative = Vec::with_capacity(n);
        let mut total = 0.0;
        let mut best: Option<(usize, f64)> = None;
        // Welford's running mean and variance; overflow safe for penalty scores.
        let mut count = 0usize;
        let mut mean = 0.0;
        let mut m2 = 0.0;

        for (i, individual) in self.individuals.iter().enumerate() {
            if let Some(f) = individual.fitness() {
                if f.is_finite() {
                    total += f.max(0.0);
                    count += 1;
                    let delta = f - mean;
                    mean += delta / count as f64;
                    m2 += delta * (f - mean);
                }
                if best.map_or(true, |(_, b)| f > b) {
                    best = Some((i, f));
                }
            }
            cumulative.push(total);
        }

        let mut ranked: Vec<usize> = (0..n).collect();
        ranked.sort_by(|&a, &b| self.fitness_of(a).total_cmp(&self.fitness_of(b)));

        self.stats = PopulationStats {
            total_fitness: total,
            cumulative_fitness: cumulative,
            best_index: best.map(|(i, _)| i),
            best_fitness: best.map(|(_, f)| f),
            average_fitness: if count == 0 { 0.0 } else { mean },
            fitness_std: if count == 0 {
                0.0
            } else {
                (m2 / count as f64).sqrt()
            },
            diversity: self.genome_diversity(),
            ranked,
        };
    }

    fn genome_diversity(&self) -> f64 {
        let n = self.individuals.len();
        if n < 2 {
            return 0.0;
        }

        let mut sum = 0.0;
        let mut pairs = 0usize;
        if n <= EXACT_DIVERSITY_LIMIT {
            for i in 0..n {
                for j in (i + 1)..n {
                    sum += self.distance(i, j);
                    pairs += 1;
                }
            }
        } else {
            for i in 0..n {
                for k in 1..=DIVERSITY_NEIGHBOURS {
                    sum += self.distance(i, (i + k) % n);
                    pairs += 1;
                }
            }
        }
        (sum / pairs as f64).clamp(0.0, 1.0)
    }

    fn distance(&self, a: usize, b: usize) -> f64 {
        1.0 - self.individuals[a]
            .genome()
            .similarity(self.individuals[b].genome())
    }
}
