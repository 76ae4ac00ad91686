//! # Variation Operators
//!
//! Generic crossover and mutation operators over slices. The built-in genomes in
//! [`crate::genome`] pick from these according to their [`GenomeKind`](crate::chromosome::GenomeKind),
//! and custom chromosomes can reuse them directly.
//!
//! | Shape        | Crossover                                   | Mutation                          |
//! |--------------|---------------------------------------------|-----------------------------------|
//! | bit vector   | single-point, multi-point, uniform          | bit-flip                          |
//! | real vector  | SBX, arithmetic, uniform, differential      | Gaussian, polynomial              |
//! | permutation  | order (OX), partially mapped (PMX), edge    | swap, inversion                   |

pub mod crossover;
pub mod mutation;

use serde::{Deserialize, Serialize};

/// Closed interval that every gene of a real-valued genome must stay in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

pub use crossover::{
    arithmetic, edge_recombination, multi_point, order_crossover, partially_mapped,
    simulated_binary, single_point, uniform,
};
pub use mutation::{bit_flip, differential, gaussian, inversion, polynomial, swap};
