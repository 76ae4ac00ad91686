//! # Challenge
//!
//! A `Challenge` scores a genome. It is the only place user code runs per
//! individual, so it is fallible and must be safe to call from several threads
//! at once.
//!
//! Closures `Fn(&G) -> Result<f64, FitnessError>` are challenges:
//!
//! ```rust
//! use genopt::error::FitnessError;
//! use genopt::evolution::Challenge;
//! use genopt::genome::BitVector;
//!
//! let one_max = |genome: &BitVector| -> Result<f64, FitnessError> {
//!     Ok(genome.count_ones() as f64)
//! };
//! assert_eq!(one_max.score(&BitVector::new(vec![true, false, true])), Ok(2.0));
//! ```

use std::sync::Mutex;

use crate::error::{ApplicationError, FitnessError};

/// Scores a genome. Higher is better.
pub trait Challenge<G>: Send + Sync {
    fn score(&self, genome: &G) -> Result<f64, FitnessError>;
}

impl<G, F> Challenge<G> for F
where
    F: Fn(&G) -> Result<f64, FitnessError> + Send + Sync,
{
    fn score(&self, genome: &G) -> Result<f64, FitnessError> {
        self(genome)
    }
}

/// Applies a genome to a live, externally observable system.
pub trait SystemApplicator<G>: Send + Sync {
    fn apply(&self, genome: &G) -> Result<(), ApplicationError>;
}

impl<G, F> SystemApplicator<G> for F
where
    F: Fn(&G) -> Result<(), ApplicationError> + Send + Sync,
{
    fn apply(&self, genome: &G) -> Result<(), ApplicationError> {
        self(genome)
    }
}

/// A challenge for genomes that describe live configuration.
///
/// Each score applies the genome to the system and then measures it. The system
/// holds one configuration at a time, so apply and measure run under a lock and
/// concurrent evaluations are serialised. A failed apply is reported as
/// [`FitnessError::Application`] and the measurement is skipped.
#[derive(Debug)]
pub struct AppliedChallenge<A, M> {
    applicator: A,
    measure: M,
    lock: Mutex<()>,
}

impl<A, M> AppliedChallenge<A, M> {
    pub fn new(applicator: A, measure: M) -> Self {
        Self {
            applicator,
            measure,
            lock: Mutex::new(()),
        }
    }
}

impl<G, A, M> Challenge<G> for AppliedChallenge<A, M>
where
    A: SystemApplicator<G>,
    M: Challenge<G>,
{
    fn score(&self, genome: &G) -> Result<f64, FitnessError> {
        // A panic in a previous measurement leaves the system in whatever state the
        // next apply overwrites, so a poisoned lock is still usable.
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.applicator.apply(genome)?;
        self.measure.score(genome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_challenge() {
        let double = |x: &i64| -> Result<f64, FitnessError> { Ok(*x as f64 * 2.0) };
        assert_eq!(double.score(&4), Ok(8.0));
    }

    #[test]
    fn test_applied_challenge_measures_applied_state() {
        let system = Arc::new(AtomicI64::new(0));
        let applied = system.clone();
        let measured = system.clone();

        let challenge = AppliedChallenge::new(
            move |x: &i64| -> Result<(), ApplicationError> {
                applied.store(*x, Ordering::SeqCst);
                Ok(())
            },
            move |_: &i64| -> Result<f64, FitnessError> {
                Ok(measured.load(Ordering::SeqCst) as f64)
            },
        );

        assert_eq!(challenge.score(&7), Ok(7.0));
        assert_eq!(system.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_apply_failure_skips_measurement() {
        let measurements = Arc::new(AtomicUsize::new(0));
        let counter = measurements.clone();
        let challenge = AppliedChallenge::new(
            |_: &i64| -> Result<(), ApplicationError> { Err(ApplicationError::new("read-only")) },
            move |_: &i64| -> Result<f64, FitnessError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(1.0)
            },
        );

        assert!(matches!(challenge.score(&1), Err(FitnessError::Application(_))));
        assert_eq!(measurements.load(Ordering::SeqCst), 0);
    }
}
