use serde::{Deserialize, Serialize};

use crate::chromosome::{ensure_same_shape, validate_rate, Chromosome, GenomeKind};
use crate::error::Result;
use crate::operators;
use crate::rng::RandomNumberGenerator;

/// Crossover used by a [`Permutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermutationCrossover {
    Order,
    PartiallyMapped,
    EdgeRecombination,
}

/// Mutation used by a [`Permutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermutationMutation {
    Swap,
    Inversion,
}

/// Shape of a randomly generated [`Permutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermutationShape {
    pub len: usize,
    pub crossover: PermutationCrossover,
    pub mutation: PermutationMutation,
}

impl PermutationShape {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            crossover: PermutationCrossover::Order,
            mutation: PermutationMutation::Swap,
        }
    }

    pub fn with_crossover(mut self, crossover: PermutationCrossover) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn with_mutation(mut self, mutation: PermutationMutation) -> Self {
        self.mutation = mutation;
        self
    }
}

/// An ordering of `0..len`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permutation {
    order: Vec<usize>,
    crossover: PermutationCrossover,
    mutation: PermutationMutation,
}

impl Permutation {
    pub fn new(order: Vec<usize>, shape: &PermutationShape) -> Self {
        Self {
            order,
            crossover: shape.crossover,
            mutation: shape.mutation,
        }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn sibling(&self, order: Vec<usize>) -> Self {
        Self {
            order,
            crossover: self.crossover,
            mutation: self.mutation,
        }
    }
}

impl Chromosome for Permutation {
    type Shape = PermutationShape;

    fn random(shape: &PermutationShape, rng: &mut RandomNumberGenerator) -> Self {
        let mut order: Vec<usize> = (0..shape.len).collect();
        // Fisher-Yates
        for i in (1..order.len()).rev() {
            let j = rng.gen_index(i + 1);
            order.swap(i, j);
        }
        Self::new(order, shape)
    }

    fn crossover(&self, other: &Self, rng: &mut RandomNumberGenerator) -> Result<(Self, Self)> {
        ensure_same_shape(self.len(), other.len())?;
        let (a, b) = match self.crossover {
            PermutationCrossover::Order => operators::order_crossover(&self.order, &other.order, rng)?,
            PermutationCrossover::PartiallyMapped => {
                operators::partially_mapped(&self.order, &other.order, rng)?
            }
            PermutationCrossover::EdgeRecombination => {
                operators::edge_recombination(&self.order, &other.order, rng)?
            }
        };
        Ok((self.sibling(a), self.sibling(b)))
    }

    fn mutate(&mut self, rng: &mut RandomNumberGenerator, rate: f64) -> Result<()> {
        validate_rate(rate)?;
        match self.mutation {
            PermutationMutation::Swap => operators::swap(&mut self.order, rate, rng),
            PermutationMutation::Inversion => operators::inversion(&mut self.order, rate, rng),
        }
        Ok(())
    }

    /// Fraction of positions holding the same element.
    fn similarity(&self, other: &Self) -> f64 {
        let len = self.len().max(other.len());
        if len == 0 {
            return 1.0;
        }
        let same = self
            .order
            .iter()
            .zip(&other.order)
            .filter(|(a, b)| a == b)
            .count();
        same as f64 / len as f64
    }

    fn is_valid(&self) -> bool {
        let mut seen = vec![false; self.order.len()];
        for &v in &self.order {
            if v >= seen.len() || seen[v] {
                return false;
            }
            seen[v] = true;
        }
        true
    }

    fn kind() -> GenomeKind {
        GenomeKind::Permutation
    }
}
