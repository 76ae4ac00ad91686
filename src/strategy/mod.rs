//! # BreedStrategy
//!
//! The `BreedStrategy` trait defines the interface for strategies responsible for breeding
//! the offspring of a generation from a scored parent population.
pub mod ordinary;

use std::fmt::Debug;

use crate::{
    chromosome::Chromosome, constraints::ConstraintManager, error::Result,
    population::Population, rng::RandomNumberGenerator, selection::SelectionStrategy,
};

/// Per-generation breeding parameters handed to a [`BreedStrategy`].
#[derive(Debug)]
pub struct BreedingPlan<'a, G> {
    /// Number of children to produce.
    pub offspring: usize,
    pub mutation_rate: f64,
    /// Probability that a selected pair is recombined rather than cloned.
    pub crossover_rate: f64,
    /// Offspring counts at or above this are bred on the rayon pool.
    pub parallel_threshold: usize,
    pub constraints: Option<&'a ConstraintManager<G>>,
}

/// # BreedStrategy
///
/// Produces exactly `plan.offspring` unevaluated genomes from `parents`.
pub trait BreedStrategy<G: Chromosome>
where
    Self: Debug + Send + Sync,
{
    /// ## Errors
    ///
    /// This method can fail if:
    /// - The parent population is empty
    /// - A genome operator reports a contract violation (shape mismatch, invalid rate)
    fn breed(
        &self,
        parents: &Population<G>,
        selection: &dyn SelectionStrategy<G>,
        plan: &BreedingPlan<'_, G>,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<G>>;
}

pub use ordinary::OrdinaryStrategy;
