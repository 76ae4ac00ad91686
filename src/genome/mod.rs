//! # Built-in Genomes
//!
//! Ready-made [`Chromosome`](crate::chromosome::Chromosome) implementations for the
//! three common genome shapes. Each genome carries its operator choice, which it
//! takes from its shape when generated, so the engine only ever calls
//! `crossover` and `mutate`.

pub mod bit_vector;
pub mod permutation;
pub mod real_vector;

pub use bit_vector::{BitCrossover, BitVector, BitVectorShape};
pub use permutation::{Permutation, PermutationCrossover, PermutationMutation, PermutationShape};
pub use real_vector::{RealCrossover, RealMutation, RealVector, RealVectorShape};
