//! # Constraints Module
//!
//! Constraints describe requirements that a genome should satisfy beyond what its
//! representation guarantees by construction, such as "no two tasks share a slot"
//! in a scheduling genome.
//!
//! - `Constraint` trait: checks a genome and optionally repairs it in place
//! - `ConstraintKind`: hard constraints are repaired before soft (preference) ones
//! - `ConstraintViolation`: a single violation reported by a constraint
//! - `ConstraintManager`: holds the constraints of a run and applies them in order
//!
//! Violations of hard constraints that survive repair are not discarded. The
//! engine keeps the individual and subtracts a penalty proportional to the number
//! of remaining hard violations from its fitness, so the population size never
//! changes because of a constraint.
//!
//! ## Basic Usage
//!
//! ```rust
//! use genopt::constraints::{Constraint, ConstraintKind, ConstraintManager, ConstraintViolation};
//! use genopt::genome::{BitVector, BitVectorShape};
//! use genopt::rng::RandomNumberGenerator;
//!
//! // At most `limit` bits may be set.
//! #[derive(Debug)]
//! struct Budget {
//!     limit: usize,
//! }
//!
//! impl Constraint<BitVector> for Budget {
//!     fn name(&self) -> &str {
//!         "Budget"
//!     }
//!
//!     fn kind(&self) -> ConstraintKind {
//!         ConstraintKind::Hard
//!     }
//!
//!     fn check(&self, genome: &BitVector) -> Vec<ConstraintViolation> {
//!         let ones = genome.count_ones();
//!         if ones > self.limit {
//!             vec![ConstraintViolation::new(self.name(), format!("{} bits set", ones))]
//!         } else {
//!             Vec::new()
//!         }
//!     }
//! }
//!
//! let mut manager = ConstraintManager::new();
//! manager.add_constraint(Budget { limit: 2 });
//!
//! let genome = BitVector::new(vec![true, true, true, false]);
//! assert!(!manager.is_valid(&genome));
//! assert_eq!(manager.hard_violations(&genome), 1);
//! ```

use std::fmt::{Debug, Display};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::rng::RandomNumberGenerator;

/// Whether a constraint must hold or merely expresses a preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    Hard,
    Soft,
}

/// Represents a violation of a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    constraint_name: String,
    description: String,
    severity: Option<f64>,
}

impl ConstraintViolation {
    /// Creates a new constraint violation with the given name and description.
    pub fn new<S: Into<String>, D: Into<String>>(constraint_name: S, description: D) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            description: description.into(),
            severity: None,
        }
    }

    /// Creates a new constraint violation with the given name, description, and severity.
    pub fn with_severity<S: Into<String>, D: Into<String>>(
        constraint_name: S,
        description: D,
        severity: f64,
    ) -> Self {
        Self {
            constraint_name: constraint_name.into(),
            description: description.into(),
            severity: Some(severity),
        }
    }

    pub fn constraint_name(&self) -> &str {
        &self.constraint_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> Option<f64> {
        self.severity
    }
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Constraint '{}' violated: {}{}",
            self.constraint_name(),
            self.description(),
            self.severity()
                .map(|s| format!(" (severity: {})", s))
                .unwrap_or_default()
        )
    }
}

/// A requirement checked against genomes of type `G`.
pub trait Constraint<G>: Debug + Send + Sync {
    /// Name used in violation reports.
    fn name(&self) -> &str;

    /// Hard constraints are repaired first and penalised when unrepairable.
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Hard
    }

    /// Returns every violation of this constraint. Empty means satisfied.
    fn check(&self, genome: &G) -> Vec<ConstraintViolation>;

    /// Attempts to repair the genome in place. Returns whether a change was made.
    ///
    /// The default implementation does not perform any repair.
    fn repair(&self, _genome: &mut G, _rng: &mut RandomNumberGenerator) -> bool {
        false
    }

    /// Penalty for the given violations: the sum of their severities, with a
    /// missing severity counting as 1.
    fn penalty_score(&self, violations: &[ConstraintViolation]) -> f64 {
        violations.iter().map(|v| v.severity.unwrap_or(1.0)).sum()
    }
}

/// Manages multiple constraints and evaluates them against genomes.
#[derive(Debug, Clone)]
pub struct ConstraintManager<G> {
    constraints: Vec<Arc<dyn Constraint<G>>>,
}

impl<G> ConstraintManager<G> {
    /// Creates a new empty constraint manager.
    pub fn new() -> Self {
        Self {
            constraints: Vec::new(),
        }
    }

    /// Creates a new constraint manager builder.
    pub fn builder() -> ConstraintManagerBuilder<G> {
        ConstraintManagerBuilder::new()
    }

    /// Adds a constraint to the manager.
    pub fn add_constraint<C>(&mut self, constraint: C) -> &mut Self
    where
        C: Constraint<G> + 'static,
    {
        self.constraints.push(Arc::new(constraint));
        self
    }

    /// Returns every violation of every constraint.
    pub fn check_all(&self, genome: &G) -> Vec<ConstraintViolation> {
        self.constraints
            .iter()
            .flat_map(|c| c.check(genome))
            .collect()
    }

    /// Repairs hard constraints first, then soft ones. Returns whether any
    /// constraint changed the genome.
    pub fn repair_all(&self, genome: &mut G, rng: &mut RandomNumberGenerator) -> bool {
        let mut changed = false;
        for kind in [ConstraintKind::Hard, ConstraintKind::Soft] {
            for constraint in self.constraints.iter().filter(|c| c.kind() == kind) {
                if !constraint.check(genome).is_empty() && constraint.repair(genome, rng) {
                    changed = true;
                }
            }
        }
        changed
    }

    /// Number of violations reported by hard constraints.
    pub fn hard_violations(&self, genome: &G) -> usize {
        self.constraints
            .iter()
            .filter(|c| c.kind() == ConstraintKind::Hard)
            .map(|c| c.check(genome).len())
            .sum()
    }

    /// Sum of the penalty scores of all constraints, hard and soft.
    pub fn total_penalty_score(&self, genome: &G) -> f64 {
        self.constraints
            .iter()
            .map(|c| {
                let violations = c.check(genome);
                if violations.is_empty() {
                    0.0
                } else {
                    c.penalty_score(&violations)
                }
            })
            .sum()
    }

    /// Checks whether the genome satisfies every hard constraint.
    pub fn is_valid(&self, genome: &G) -> bool {
        self.hard_violations(genome) == 0
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl<G> Default for ConstraintManager<G> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating a constraint manager with a fluent API.
#[derive(Debug, Clone)]
pub struct ConstraintManagerBuilder<G> {
    constraints: Vec<Arc<dyn Constraint<G>>>,
}

impl<G> ConstraintManagerBuilder<G> {
    pub fn new() -> Self {
        Self {
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint<C>(mut self, constraint: C) -> Self
    where
        C: Constraint<G> + 'static,
    {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn build(self) -> ConstraintManager<G> {
        ConstraintManager {
            constraints: self.constraints,
        }
    }
}

impl<G> Default for ConstraintManagerBuilder<G> {
    fn default() -> Self {
        Self::new()
    }
}
