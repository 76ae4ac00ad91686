use serde::{Deserialize, Serialize};

use crate::chromosome::{ensure_same_shape, validate_rate, Chromosome, GenomeKind};
use crate::error::Result;
use crate::operators;
use crate::rng::RandomNumberGenerator;

/// Crossover used by a [`BitVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitCrossover {
    SinglePoint,
    MultiPoint(usize),
    Uniform,
}

/// Shape of a randomly generated [`BitVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitVectorShape {
    pub len: usize,
    pub crossover: BitCrossover,
}

impl BitVectorShape {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            crossover: BitCrossover::Uniform,
        }
    }

    pub fn with_crossover(mut self, crossover: BitCrossover) -> Self {
        self.crossover = crossover;
        self
    }
}

/// Fixed-length bit string with bit-flip mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVector {
    bits: Vec<bool>,
    crossover: BitCrossover,
}

impl BitVector {
    pub fn new(bits: Vec<bool>) -> Self {
        Self {
            bits,
            crossover: BitCrossover::Uniform,
        }
    }

    pub fn with_crossover(mut self, crossover: BitCrossover) -> Self {
        self.crossover = crossover;
        self
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn hamming_distance(&self, other: &Self) -> usize {
        self.bits
            .iter()
            .zip(&other.bits)
            .filter(|(a, b)| a != b)
            .count()
            + self.bits.len().abs_diff(other.bits.len())
    }

    fn sibling(&self, bits: Vec<bool>) -> Self {
        Self {
            bits,
            crossover: self.crossover,
        }
    }
}

impl Chromosome for BitVector {
    type Shape = BitVectorShape;

    fn random(shape: &BitVectorShape, rng: &mut RandomNumberGenerator) -> Self {
        let bits = (0..shape.len).map(|_| rng.gen_bool(0.5)).collect();
        Self {
            bits,
            crossover: shape.crossover,
        }
    }

    fn crossover(&self, other: &Self, rng: &mut RandomNumberGenerator) -> Result<(Self, Self)> {
        ensure_same_shape(self.len(), other.len())?;
        let (a, b) = match self.crossover {
            BitCrossover::SinglePoint => operators::single_point(&self.bits, &other.bits, rng)?,
            BitCrossover::MultiPoint(points) => {
                operators::multi_point(&self.bits, &other.bits, points, rng)?
            }
            BitCrossover::Uniform => operators::uniform(&self.bits, &other.bits, 0.5, rng)?,
        };
        Ok((self.sibling(a), self.sibling(b)))
    }

    fn mutate(&mut self, rng: &mut RandomNumberGenerator, rate: f64) -> Result<()> {
        validate_rate(rate)?;
        operators::bit_flip(&mut self.bits, rate, rng);
        Ok(())
    }

    fn similarity(&self, other: &Self) -> f64 {
        let len = self.len().max(other.len());
        if len == 0 {
            return 1.0;
        }
        1.0 - self.hamming_distance(other) as f64 / len as f64
    }

    fn kind() -> GenomeKind {
        GenomeKind::Binary
    }
}
