//! # OrdinaryStrategy
//!
//! Selects pairs of parents, recombines them with probability `crossover_rate`,
//! mutates both children and runs the repair hooks.
use rayon::prelude::*;

use super::{BreedStrategy, BreedingPlan};
use crate::{
    chromosome::Chromosome,
    error::{GeneticError, Result},
    population::Population,
    rng::RandomNumberGenerator,
    selection::SelectionStrategy,
};

/// # OrdinaryStrategy
///
/// Every pair of children is bred with its own random stream derived from one draw
/// of the caller's generator, so the offspring are identical whether the pairs are
/// processed sequentially or in parallel.
#[derive(Debug, Clone, Default)]
pub struct OrdinaryStrategy;

impl OrdinaryStrategy {
    pub fn new() -> Self {
        Self
    }

    fn breed_pair<G: Chromosome>(
        parents: &Population<G>,
        selection: &dyn SelectionStrategy<G>,
        plan: &BreedingPlan<'_, G>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<[G; 2]> {
        let (a, b) = selection.select_pair(parents, rng)?;
        let (first, second) = match (parents.get(a), parents.get(b)) {
            (Some(first), Some(second)) => (first.genome(), second.genome()),
            _ => {
                return Err(GeneticError::Breeding(format!(
                    "Selection returned out-of-range parents ({}, {})",
                    a, b
                )))
            }
        };

        let (mut c1, mut c2) = if rng.gen_bool(plan.crossover_rate) {
            first.crossover(second, rng)?
        } else {
            (first.clone(), second.clone())
        };

        for child in [&mut c1, &mut c2] {
            child.mutate(rng, plan.mutation_rate)?;
            child.repair(rng);
            if let Some(constraints) = plan.constraints {
                constraints.repair_all(child, rng);
            }
        }
        Ok([c1, c2])
    }
}

impl<G> BreedStrategy<G> for OrdinaryStrategy
where
    G: Chromosome,
{
    /// ## Performance
    ///
    /// When `plan.offspring` reaches `plan.parallel_threshold` the pairs are bred
    /// with Rayon's parallel iterator.
    fn breed(
        &self,
        parents: &Population<G>,
        selection: &dyn SelectionStrategy<G>,
        plan: &BreedingPlan<'_, G>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<G>> {
        if parents.is_empty() {
            return Err(GeneticError::EmptyPopulation);
        }
        if plan.offspring == 0 {
            return Ok(Vec::new());
        }

        let pairs = (plan.offspring + 1) / 2;
        let base_seed = rng.gen_seed();
        let breed = |pair: usize| {
            let mut pair_rng = RandomNumberGenerator::derived(base_seed, pair as u64);
            Self::breed_pair(parents, selection, plan, &mut pair_rng)
        };

        let bred: Vec<[G; 2]> = if plan.offspring >= plan.parallel_threshold {
            (0..pairs).into_par_iter().map(breed).collect::<Result<_>>()?
        } else {
            (0..pairs).map(breed).collect::<Result<_>>()?
        };

        let mut children: Vec<G> = bred.into_iter().flatten().collect();
        children.truncate(plan.offspring);
        Ok(children)
    }
}
