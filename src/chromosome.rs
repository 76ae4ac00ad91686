//! # Chromosome Trait
//!
//! The `Chromosome` trait is the contract every solution representation satisfies.
//! The engine is generic over it and monomorphizes per genome type, so the
//! per-individual loop never dispatches on the kind of genome at runtime.
//!
//! ## Example
//!
//! ```rust
//! use genopt::chromosome::{validate_rate, Chromosome, GenomeKind};
//! use genopt::error::{GeneticError, Result};
//! use genopt::rng::RandomNumberGenerator;
//!
//! #[derive(Clone, Debug, PartialEq, Hash)]
//! struct Switches(Vec<bool>);
//!
//! impl Chromosome for Switches {
//!     type Shape = usize;
//!
//!     fn random(shape: &usize, rng: &mut RandomNumberGenerator) -> Self {
//!         Switches((0..*shape).map(|_| rng.gen_bool(0.5)).collect())
//!     }
//!
//!     fn crossover(&self, other: &Self, rng: &mut RandomNumberGenerator) -> Result<(Self, Self)> {
//!         if self.0.len() != other.0.len() {
//!             return Err(GeneticError::ShapeMismatch { expected: self.0.len(), actual: other.0.len() });
//!         }
//!         let cut = rng.gen_index(self.0.len() + 1);
//!         let mut a = self.0[..cut].to_vec();
//!         a.extend_from_slice(&other.0[cut..]);
//!         let mut b = other.0[..cut].to_vec();
//!         b.extend_from_slice(&self.0[cut..]);
//!         Ok((Switches(a), Switches(b)))
//!     }
//!
//!     fn mutate(&mut self, rng: &mut RandomNumberGenerator, rate: f64) -> Result<()> {
//!         validate_rate(rate)?;
//!         for bit in self.0.iter_mut() {
//!             if rate > 0.0 && rng.gen_bool(rate) {
//!                 *bit = !*bit;
//!             }
//!         }
//!         Ok(())
//!     }
//!
//!     fn similarity(&self, other: &Self) -> f64 {
//!         let same = self.0.iter().zip(&other.0).filter(|(a, b)| a == b).count();
//!         same as f64 / self.0.len().max(1) as f64
//!     }
//! }
//! ```

use std::fmt::Debug;

use crate::error::{GeneticError, Result};
use crate::rng::RandomNumberGenerator;

/// Declared representation of a genome. Genome types pick their specialised
/// operators from it; the engine itself never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum GenomeKind {
    Binary,
    RealValued,
    Permutation,
    Custom,
}

/// Trait for types that represent candidate solutions.
///
/// Types implementing this trait must also implement `Clone`, `Debug`, `Send` and
/// `Sync` so populations can be evaluated and bred in parallel.
pub trait Chromosome: Clone + Debug + Send + Sync {
    /// Everything needed to produce a random genome of the configured shape
    /// (length, bounds, operator choice, ...).
    type Shape: Clone + Debug + Send + Sync;

    /// Produces a uniformly plausible candidate. Must be reproducible for a seeded `rng`.
    fn random(shape: &Self::Shape, rng: &mut RandomNumberGenerator) -> Self;

    /// Combines two parents into two children.
    ///
    /// Parents of incompatible shape are a contract violation and fail with
    /// [`GeneticError::ShapeMismatch`].
    fn crossover(&self, other: &Self, rng: &mut RandomNumberGenerator) -> Result<(Self, Self)>;

    /// Applies a bounded random perturbation in place.
    ///
    /// `rate == 0.0` leaves the genome untouched; a rate outside `[0, 1]` fails with
    /// [`GeneticError::InvalidRate`] (see [`validate_rate`]).
    fn mutate(&mut self, rng: &mut RandomNumberGenerator, rate: f64) -> Result<()>;

    /// Symmetric similarity in `[0, 1]`, with `similarity(a, a) == 1.0`.
    fn similarity(&self, other: &Self) -> f64;

    /// Fixes constraint violations introduced by variation. Returns whether the
    /// genome changed. The default implementation does nothing.
    fn repair(&mut self, _rng: &mut RandomNumberGenerator) -> bool {
        false
    }

    /// Domain validation used while filling the initial population.
    fn is_valid(&self) -> bool {
        true
    }

    /// The declared representation of this genome type.
    fn kind() -> GenomeKind {
        GenomeKind::Custom
    }
}

/// Checks that a mutation rate lies in `[0, 1]`.
pub fn validate_rate(rate: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(GeneticError::InvalidRate(rate));
    }
    Ok(())
}

/// Checks that two genomes have the same length.
pub fn ensure_same_shape(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(GeneticError::ShapeMismatch { expected, actual });
    }
    Ok(())
}
