use serde::{Deserialize, Serialize};

/// How an individual entered its population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Supplied by the caller before the first generation.
    Seeded,
    /// Generated at random by the population manager.
    Random,
    /// Produced by crossover and mutation.
    Offspring,
    /// Copied unchanged from the previous generation.
    Elite,
    /// Received from another island.
    Immigrant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualMetadata {
    pub origin: Origin,
    pub birth_generation: usize,
    /// Message of the last failed evaluation, if the fitness is a penalty.
    pub evaluation_error: Option<String>,
}

/// A genome paired with its fitness.
///
/// The fitness is `None` until the genome has been evaluated. Any mutable access
/// to the genome through [`Individual::genome_mut`] clears it, so a stale score
/// can never be attached to a changed genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual<G> {
    genome: G,
    #[serde(with = "crate::checkpoint::float_repr::option")]
    fitness: Option<f64>,
    metadata: IndividualMetadata,
}

impl<G> Individual<G> {
    pub fn new(genome: G, origin: Origin, birth_generation: usize) -> Self {
        Self {
            genome,
            fitness: None,
            metadata: IndividualMetadata {
                origin,
                birth_generation,
                evaluation_error: None,
            },
        }
    }

    pub fn genome(&self) -> &G {
        &self.genome
    }

    /// Mutable access to the genome. Invalidates the fitness.
    pub fn genome_mut(&mut self) -> &mut G {
        self.fitness = None;
        self.metadata.evaluation_error = None;
        &mut self.genome
    }

    pub fn into_genome(self) -> G {
        self.genome
    }

    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
        self.metadata.evaluation_error = None;
    }

    /// Records a failed evaluation scored with `penalty`.
    pub fn set_failed(&mut self, penalty: f64, error: impl ToString) {
        self.fitness = Some(penalty);
        self.metadata.evaluation_error = Some(error.to_string());
    }

    pub fn metadata(&self) -> &IndividualMetadata {
        &self.metadata
    }

    pub fn origin(&self) -> Origin {
        self.metadata.origin
    }

    /// Re-labels an individual that moves into a new population unchanged.
    pub fn carried_over(mut self, origin: Origin) -> Self {
        self.metadata.origin = origin;
        self
    }
}
