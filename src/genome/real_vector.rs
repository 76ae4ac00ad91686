use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::chromosome::{ensure_same_shape, validate_rate, Chromosome, GenomeKind};
use crate::error::Result;
use crate::operators::{self, Bounds};
use crate::rng::RandomNumberGenerator;

/// Crossover used by a [`RealVector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RealCrossover {
    /// Simulated binary crossover with distribution index `eta`.
    SimulatedBinary { eta: f64 },
    /// Weighted average of both parents.
    Arithmetic { weight: f64 },
    /// Gene-wise exchange with probability 0.5.
    Uniform,
    /// Differential-evolution recombination: each child mixes its parent with the
    /// mutant `parent + weight * (mate - parent)` gene-wise with probability `rate`.
    Differential { weight: f64, rate: f64 },
}

/// Mutation used by a [`RealVector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RealMutation {
    /// Gaussian noise with standard deviation `sigma` relative to the bounds width.
    Gaussian { sigma: f64 },
    /// Polynomial mutation with distribution index `eta`.
    Polynomial { eta: f64 },
}

/// Shape of a randomly generated [`RealVector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealVectorShape {
    pub len: usize,
    pub bounds: Bounds,
    pub crossover: RealCrossover,
    pub mutation: RealMutation,
}

impl RealVectorShape {
    pub fn new(len: usize, bounds: Bounds) -> Self {
        Self {
            len,
            bounds,
            crossover: RealCrossover::SimulatedBinary { eta: 15.0 },
            mutation: RealMutation::Polynomial { eta: 20.0 },
        }
    }

    pub fn with_crossover(mut self, crossover: RealCrossover) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn with_mutation(mut self, mutation: RealMutation) -> Self {
        self.mutation = mutation;
        self
    }
}

/// Bounded vector of reals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealVector {
    genes: Vec<f64>,
    bounds: Bounds,
    crossover: RealCrossover,
    mutation: RealMutation,
}

impl RealVector {
    /// Creates a genome from explicit genes, clamping them into `shape.bounds`.
    pub fn from_genes(genes: Vec<f64>, shape: &RealVectorShape) -> Self {
        Self {
            genes: genes.into_iter().map(|g| shape.bounds.clamp(g)).collect(),
            bounds: shape.bounds,
            crossover: shape.crossover,
            mutation: shape.mutation,
        }
    }

    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    fn sibling(&self, genes: Vec<f64>) -> Self {
        Self {
            genes,
            bounds: self.bounds,
            crossover: self.crossover,
            mutation: self.mutation,
        }
    }
}

// Structural hash over the bit patterns so equal genomes share a cache entry.
impl Hash for RealVector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.genes.len().hash(state);
        for gene in &self.genes {
            gene.to_bits().hash(state);
        }
    }
}

impl Chromosome for RealVector {
    type Shape = RealVectorShape;

    fn random(shape: &RealVectorShape, rng: &mut RandomNumberGenerator) -> Self {
        let genes = (0..shape.len)
            .map(|_| rng.gen_range_f64(shape.bounds.min, shape.bounds.max))
            .collect();
        Self {
            genes,
            bounds: shape.bounds,
            crossover: shape.crossover,
            mutation: shape.mutation,
        }
    }

    fn crossover(&self, other: &Self, rng: &mut RandomNumberGenerator) -> Result<(Self, Self)> {
        ensure_same_shape(self.len(), other.len())?;
        let (a, b) = match self.crossover {
            RealCrossover::SimulatedBinary { eta } => {
                operators::simulated_binary(&self.genes, &other.genes, eta, 0.5, self.bounds, rng)?
            }
            RealCrossover::Arithmetic { weight } => {
                operators::arithmetic(&self.genes, &other.genes, weight)?
            }
            RealCrossover::Uniform => operators::uniform(&self.genes, &other.genes, 0.5, rng)?,
            RealCrossover::Differential { weight, rate } => {
                let mutant_a =
                    operators::differential(&self.genes, &other.genes, &self.genes, weight, self.bounds)?;
                let mutant_b =
                    operators::differential(&other.genes, &self.genes, &other.genes, weight, self.bounds)?;
                let (a, _) = operators::uniform(&self.genes, &mutant_a, rate, rng)?;
                let (b, _) = operators::uniform(&other.genes, &mutant_b, rate, rng)?;
                (a, b)
            }
        };
        Ok((self.sibling(a), self.sibling(b)))
    }

    fn mutate(&mut self, rng: &mut RandomNumberGenerator, rate: f64) -> Result<()> {
        validate_rate(rate)?;
        match self.mutation {
            RealMutation::Gaussian { sigma } => {
                operators::gaussian(&mut self.genes, rate, sigma, self.bounds, rng)?
            }
            RealMutation::Polynomial { eta } => {
                operators::polynomial(&mut self.genes, rate, eta, self.bounds, rng)
            }
        }
        Ok(())
    }

    fn similarity(&self, other: &Self) -> f64 {
        let width = self.bounds.width();
        if self.genes.is_empty() || width <= 0.0 {
            return if self.genes == other.genes { 1.0 } else { 0.0 };
        }
        if self.len() != other.len() {
            return 0.0;
        }
        let mean_gap = self
            .genes
            .iter()
            .zip(&other.genes)
            .map(|(a, b)| ((a - b).abs() / width).min(1.0))
            .sum::<f64>()
            / self.len() as f64;
        1.0 - mean_gap
    }

    fn is_valid(&self) -> bool {
        self.genes.iter().all(|g| g.is_finite() && self.bounds.contains(*g))
    }

    fn kind() -> GenomeKind {
        GenomeKind::RealValued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> RealVectorShape {
        RealVectorShape::new(6, Bounds::new(-2.0, 2.0))
    }

    #[test]
    fn test_random_within_bounds() {
        let mut rng = RandomNumberGenerator::from_seed(1);
        for _ in 0..50 {
            let genome = RealVector::random(&shape(), &mut rng);
            assert_eq!(genome.len(), 6);
            assert!(genome.is_valid());
        }
    }

    #[test]
    fn test_every_operator_keeps_bounds() {
        let mut rng = RandomNumberGenerator::from_seed(2);
        let crossovers = [
            RealCrossover::SimulatedBinary { eta: 2.0 },
            RealCrossover::Arithmetic { weight: 0.3 },
            RealCrossover::Uniform,
            RealCrossover::Differential { weight: 0.8, rate: 0.9 },
        ];
        let mutations = [
            RealMutation::Gaussian { sigma: 0.2 },
            RealMutation::Polynomial { eta: 5.0 },
        ];

        for crossover in crossovers {
            for mutation in mutations {
                let s = shape().with_crossover(crossover).with_mutation(mutation);
                let a = RealVector::random(&s, &mut rng);
                let b = RealVector::random(&s, &mut rng);
                let (mut c1, mut c2) = a.crossover(&b, &mut rng).unwrap();
                c1.mutate(&mut rng, 0.5).unwrap();
                c2.mutate(&mut rng, 0.5).unwrap();
                assert!(c1.is_valid() && c2.is_valid());
            }
        }
    }

    #[test]
    fn test_zero_rate_mutation_is_noop() {
        let mut rng = RandomNumberGenerator::from_seed(3);
        let genome = RealVector::random(&shape(), &mut rng);
        let mut mutated = genome.clone();
        mutated.mutate(&mut rng, 0.0).unwrap();
        assert_eq!(genome, mutated);
    }

    #[test]
    fn test_similarity_range() {
        let s = shape();
        let low = RealVector::from_genes(vec![-2.0; 6], &s);
        let high = RealVector::from_genes(vec![2.0; 6], &s);
        assert_eq!(low.similarity(&low), 1.0);
        assert_eq!(low.similarity(&high), 0.0);
        assert_eq!(low.similarity(&high), high.similarity(&low));
    }

    #[test]
    fn test_from_genes_clamps() {
        let genome = RealVector::from_genes(vec![5.0, -5.0], &shape());
        assert_eq!(genome.genes(), &[2.0, -2.0]);
    }
}
