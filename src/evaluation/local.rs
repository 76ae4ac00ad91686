use std::marker::PhantomData;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use super::{score_guarded, EvaluationReport, FitnessEvaluator};
use crate::error::{GeneticError, Result};
use crate::evolution::options::EvolutionOptions;
use crate::evolution::Challenge;

/// Smallest number of genomes handed to one rayon task.
const DEFAULT_CHUNK_FLOOR: usize = 4;

/// Evaluates genomes in the current process.
///
/// Sequential by default. With parallelism enabled, batches of at least
/// `parallel_threshold` genomes are scored with a rayon parallel iterator, on a
/// dedicated pool of `max_threads` threads when one is configured. Chunks hold at
/// least `len / threads` genomes and never fewer than the chunk floor.
#[derive(Debug)]
pub struct LocalEvaluator<G, C> {
    challenge: C,
    parallel: bool,
    parallel_threshold: usize,
    chunk_floor: usize,
    failure_fitness: f64,
    pool: Option<ThreadPool>,
    _marker: PhantomData<fn(&G)>,
}

impl<G, C> LocalEvaluator<G, C>
where
    G: Sync,
    C: Challenge<G>,
{
    /// A sequential evaluator scoring failures with `f64::MIN`.
    pub fn new(challenge: C) -> Self {
        Self {
            challenge,
            parallel: false,
            parallel_threshold: 0,
            chunk_floor: DEFAULT_CHUNK_FLOOR,
            failure_fitness: f64::MIN,
            pool: None,
            _marker: PhantomData,
        }
    }

    /// Configures parallelism, pool size, threshold and failure fitness from `options`.
    pub fn from_options(challenge: C, options: &EvolutionOptions) -> Result<Self> {
        let mut evaluator = Self::new(challenge)
            .with_failure_fitness(options.get_failure_fitness())
            .with_parallel_threshold(options.get_parallel_threshold());
        if options.get_parallel_fitness() {
            evaluator = evaluator.with_thread_pool(options.get_max_threads())?;
        }
        Ok(evaluator)
    }

    /// Evaluates in parallel on rayon's global pool.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Evaluates in parallel on a dedicated pool of `max_threads` threads.
    pub fn with_thread_pool(mut self, max_threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_threads)
            .thread_name(|i| format!("genopt-eval-{}", i))
            .build()
            .map_err(|e| {
                GeneticError::Configuration(format!("Failed to build evaluation pool: {}", e))
            })?;
        self.parallel = true;
        self.pool = Some(pool);
        Ok(self)
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_chunk_floor(mut self, floor: usize) -> Self {
        self.chunk_floor = floor.max(1);
        self
    }

    pub fn with_failure_fitness(mut self, failure_fitness: f64) -> Self {
        self.failure_fitness = failure_fitness;
        self
    }

    pub fn challenge(&self) -> &C {
        &self.challenge
    }

    fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, ThreadPool::current_num_threads)
    }

    /// Genomes per rayon task for a batch of `len`.
    pub fn chunk_size(&self, len: usize) -> usize {
        (len / self.threads().max(1)).max(self.chunk_floor)
    }
}

impl<G, C> FitnessEvaluator<G> for LocalEvaluator<G, C>
where
    G: Sync,
    C: Challenge<G>,
{
    fn evaluate(&self, genomes: &[G]) -> Result<EvaluationReport> {
        let outcomes: Vec<_> = if self.parallel && genomes.len() >= self.parallel_threshold {
            let chunk = self.chunk_size(genomes.len());
            debug!("Evaluating {} genomes in chunks of {}", genomes.len(), chunk);
            let run = || {
                genomes
                    .par_iter()
                    .with_min_len(chunk)
                    .map(|genome| score_guarded(&self.challenge, genome))
                    .collect()
            };
            match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            }
        } else {
            genomes
                .iter()
                .map(|genome| score_guarded(&self.challenge, genome))
                .collect()
        };

        Ok(EvaluationReport::from_outcomes(outcomes, self.failure_fitness))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitnessError;

    fn square(x: &u32) -> std::result::Result<f64, FitnessError> {
        match x {
            13 => Err(FitnessError::Evaluation("unlucky".to_string())),
            99 => panic!("ninety-nine"),
            _ => Ok((*x as f64).powi(2)),
        }
    }

    #[test]
    fn test_sequential_order_and_failures() {
        let evaluator = LocalEvaluator::<u32, _>::new(square).with_failure_fitness(-1.0);
        let report = evaluator.evaluate(&[1, 13, 3, 99]).unwrap();
        assert_eq!(report.fitness, vec![1.0, -1.0, 9.0, -1.0]);
        assert_eq!(report.failed_count(), 2);
        assert_eq!(report.failures[0].0, 1);
        assert!(matches!(report.failures[1].1, FitnessError::Panicked(_)));
    }

    #[test]
    fn test_parallel_preserves_order() {
        let genomes: Vec<u32> = (0..500).filter(|&x| x != 13 && x != 99).collect();
        let sequential = LocalEvaluator::<u32, _>::new(square).evaluate(&genomes).unwrap();
        let parallel = LocalEvaluator::<u32, _>::new(square)
            .with_thread_pool(4)
            .unwrap()
            .evaluate(&genomes)
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_below_threshold_stays_sequential() {
        let evaluator = LocalEvaluator::<u32, _>::new(square)
            .parallel()
            .with_parallel_threshold(1000);
        let report = evaluator.evaluate(&[2, 3]).unwrap();
        assert_eq!(report.fitness, vec![4.0, 9.0]);
    }

    #[test]
    fn test_parallel_fitness_option_spreads_work() {
        use std::collections::HashSet;
        use std::sync::Mutex;
        use std::thread::{self, ThreadId};
        use std::time::Duration;

        let seen: Mutex<HashSet<ThreadId>> = Mutex::new(HashSet::new());
        let challenge = |x: &u32| -> std::result::Result<f64, FitnessError> {
            seen.lock().unwrap().insert(thread::current().id());
            thread::sleep(Duration::from_millis(2));
            Ok(*x as f64)
        };
        let options = EvolutionOptions::builder()
            .population_size(100)
            .parallel_fitness(true)
            .max_threads(4)
            .build();
        let evaluator = LocalEvaluator::<u32, _>::from_options(challenge, &options).unwrap();

        let genomes: Vec<u32> = (0..100).collect();
        let report = evaluator.evaluate(&genomes).unwrap();
        assert_eq!(report.fitness, (0..100).map(|x| x as f64).collect::<Vec<_>>());
        assert!(seen.lock().unwrap().len() > 1);
    }

    #[test]
    fn test_chunk_floor() {
        let evaluator = LocalEvaluator::<u32, _>::new(square)
            .with_thread_pool(4)
            .unwrap()
            .with_chunk_floor(8);
        assert_eq!(evaluator.chunk_size(10), 8);
        assert_eq!(evaluator.chunk_size(400), 100);
    }

    #[test]
    fn test_zero_threads_rejected_by_options() {
        let options = EvolutionOptions::builder()
            .parallel_fitness(true)
            .max_threads(0)
            .build();
        assert!(options.validate().is_err());
    }
}
