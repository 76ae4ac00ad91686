//! # Fitness evaluation
//!
//! A [`FitnessEvaluator`] turns a slice of genomes into one fitness value per genome,
//! in input order. Failures of individual evaluations, including panics in the
//! fitness function, are caught at this boundary: the genome gets the configured
//! failure fitness and the error is listed in the report.
//!
//! - [`LocalEvaluator`]: sequential or rayon evaluation in the calling process.
//! - [`DistributedEvaluator`]: tasks with timeouts and retries dispatched to
//!   long-lived workers over channels.
//!
//! Caching is a property of the challenge, see [`crate::caching`].

pub mod distributed;
pub mod local;

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{FitnessError, Result};
use crate::evolution::Challenge;

pub use distributed::{DistributedConfig, DistributedEvaluator};
pub use local::LocalEvaluator;

/// Scores of one batch of genomes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// One value per input genome, in input order.
    pub fitness: Vec<f64>,
    /// Index and cause of every evaluation that received the failure fitness.
    pub failures: Vec<(usize, FitnessError)>,
}

impl EvaluationReport {
    pub fn len(&self) -> usize {
        self.fitness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fitness.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// True when there was something to evaluate and every evaluation failed.
    pub fn all_failed(&self) -> bool {
        !self.fitness.is_empty() && self.failures.len() == self.fitness.len()
    }

    /// Builds a report from per-genome outcomes, substituting `failure_fitness`
    /// for every error.
    pub fn from_outcomes<I>(outcomes: I, failure_fitness: f64) -> Self
    where
        I: IntoIterator<Item = std::result::Result<f64, FitnessError>>,
    {
        let mut report = Self::default();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(fitness) => report.fitness.push(fitness),
                Err(err) => {
                    tracing::warn!("Fitness evaluation {} failed: {}", index, err);
                    report.fitness.push(failure_fitness);
                    report.failures.push((index, err));
                }
            }
        }
        report
    }
}

/// Evaluates genomes in batches.
pub trait FitnessEvaluator<G>: Send + Sync {
    /// Returns exactly one fitness per genome, in the same order.
    ///
    /// # Errors
    ///
    /// Only for failures of the evaluator itself. Per-genome failures are part of
    /// the report.
    fn evaluate(&self, genomes: &[G]) -> Result<EvaluationReport>;
}

/// Scores one genome, converting panics and non-finite scores into errors.
pub(crate) fn score_guarded<G, C>(challenge: &C, genome: &G) -> std::result::Result<f64, FitnessError>
where
    C: Challenge<G> + ?Sized,
{
    match catch_unwind(AssertUnwindSafe(|| challenge.score(genome))) {
        Ok(Ok(score)) if score.is_finite() => Ok(score),
        Ok(Ok(score)) => Err(FitnessError::NonFinite(score)),
        Ok(Err(err)) => Err(err),
        Err(payload) => Err(FitnessError::Panicked(panic_message(payload))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
