//! # EvolutionOptions
//!
//! The `EvolutionOptions` struct represents the configuration of an evolution run:
//! population size, termination limits, mutation and crossover parameters,
//! parallelism and logging.
//!
//! Options are plain data. [`EvolutionOptions::validate`] rejects inconsistent
//! combinations and is called when an engine is built, so a running engine never
//! sees an invalid configuration.
//!
//! ## Example
//!
//! ```rust
//! use genopt::evolution::options::{EvolutionOptions, LogLevel};
//!
//! let options = EvolutionOptions::builder()
//!     .population_size(50)
//!     .max_generations(200)
//!     .elite_count(2)
//!     .log_level(LogLevel::Minimal)
//!     .seed(42)
//!     .build();
//! assert!(options.validate().is_ok());
//!
//! // Create a new EvolutionOptions instance with default parameters
//! let default_options = EvolutionOptions::default();
//! assert_eq!(default_options.get_population_size(), 100);
//! ```
//!
//! ### `LogLevel`
//!
//! - `Verbose`: logs every generation and every evaluated individual.
//! - `Minimal`: logs one line per generation.
//! - `None`: disables per-generation logging. Warnings and errors are always emitted.

use serde::{Deserialize, Serialize};

use crate::error::{GeneticError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Verbose,
    Minimal,
    None,
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone)]
pub struct EvolutionOptions {
    /// Number of individuals in every generation.
    population_size: usize,
    /// Upper bound on the number of generations run.
    max_generations: usize,
    /// Per-gene mutation probability at generation 0.
    initial_mutation_rate: f64,
    /// Whether the mutation rate follows population diversity.
    adaptive_mutation: bool,
    /// Whether the best individuals are copied unchanged into the next generation.
    elitism: bool,
    /// Number of individuals preserved by elitism.
    elite_count: usize,
    /// Best fitness at which the run counts as converged.
    convergence_threshold: f64,
    /// Generations without improvement before the run stops.
    stagnation_limit: usize,
    /// Whether fitness is evaluated on the rayon pool.
    parallel_fitness: bool,
    /// Size of the dedicated evaluation pool.
    max_threads: usize,
    /// Contestants per tournament. Reaches selection through
    /// `TournamentSelection::from_options`; the engine builder warns when a
    /// supplied strategy disagrees.
    tournament_size: usize,
    /// How much the engine logs per generation.
    log_level: LogLevel,
    /// Seed of the run. `None` draws one from the OS.
    seed: Option<u64>,
    /// Probability that a selected pair is recombined.
    crossover_rate: f64,
    /// Diversity the adaptive controller steers towards.
    target_diversity: f64,
    /// Proportional gain of the adaptive controller.
    adaptation_gain: f64,
    /// Lower bound of the adapted mutation rate.
    min_mutation_rate: f64,
    /// Upper bound of the adapted mutation rate.
    max_mutation_rate: f64,
    /// Fitness assigned to individuals whose evaluation failed.
    failure_fitness: f64,
    /// Smallest batch that is evaluated or bred in parallel. Batches below it run
    /// sequentially even when `parallel_fitness` is set.
    parallel_threshold: usize,
    /// Fitness subtracted per unrepaired hard constraint violation.
    constraint_penalty: f64,
}

impl EvolutionOptions {
    /// Creates options with the given size and generation limit; every other
    /// parameter takes its default.
    pub fn new(population_size: usize, max_generations: usize) -> Self {
        Self {
            population_size,
            max_generations,
            ..Self::default()
        }
    }

    pub fn get_population_size(&self) -> usize {
        self.population_size
    }

    pub fn get_max_generations(&self) -> usize {
        self.max_generations
    }

    pub fn get_initial_mutation_rate(&self) -> f64 {
        self.initial_mutation_rate
    }

    pub fn get_adaptive_mutation(&self) -> bool {
        self.adaptive_mutation
    }

    pub fn get_elitism(&self) -> bool {
        self.elitism
    }

    pub fn get_elite_count(&self) -> usize {
        self.elite_count
    }

    pub fn get_convergence_threshold(&self) -> f64 {
        self.convergence_threshold
    }

    pub fn get_stagnation_limit(&self) -> usize {
        self.stagnation_limit
    }

    pub fn get_parallel_fitness(&self) -> bool {
        self.parallel_fitness
    }

    pub fn get_max_threads(&self) -> usize {
        self.max_threads
    }

    pub fn get_tournament_size(&self) -> usize {
        self.tournament_size
    }

    pub fn get_log_level(&self) -> &LogLevel {
        &self.log_level
    }

    pub fn get_seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn get_crossover_rate(&self) -> f64 {
        self.crossover_rate
    }

    pub fn get_target_diversity(&self) -> f64 {
        self.target_diversity
    }

    pub fn get_adaptation_gain(&self) -> f64 {
        self.adaptation_gain
    }

    pub fn get_min_mutation_rate(&self) -> f64 {
        self.min_mutation_rate
    }

    pub fn get_max_mutation_rate(&self) -> f64 {
        self.max_mutation_rate
    }

    pub fn get_failure_fitness(&self) -> f64 {
        self.failure_fitness
    }

    pub fn get_parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    pub fn get_constraint_penalty(&self) -> f64 {
        self.constraint_penalty
    }

    /// Number of elites actually preserved: zero when elitism is disabled.
    pub fn effective_elite_count(&self) -> usize {
        if self.elitism {
            self.elite_count.min(self.population_size)
        } else {
            0
        }
    }

    pub fn set_population_size(&mut self, population_size: usize) {
        self.population_size = population_size;
    }

    pub fn set_max_generations(&mut self, max_generations: usize) {
        self.max_generations = max_generations;
    }

    pub fn set_initial_mutation_rate(&mut self, initial_mutation_rate: f64) {
        self.initial_mutation_rate = initial_mutation_rate;
    }

    pub fn set_adaptive_mutation(&mut self, adaptive_mutation: bool) {
        self.adaptive_mutation = adaptive_mutation;
    }

    pub fn set_elitism(&mut self, elitism: bool) {
        self.elitism = elitism;
    }

    pub fn set_elite_count(&mut self, elite_count: usize) {
        self.elite_count = elite_count;
    }

    pub fn set_convergence_threshold(&mut self, convergence_threshold: f64) {
        self.convergence_threshold = convergence_threshold;
    }

    pub fn set_stagnation_limit(&mut self, stagnation_limit: usize) {
        self.stagnation_limit = stagnation_limit;
    }

    pub fn set_parallel_fitness(&mut self, parallel_fitness: bool) {
        self.parallel_fitness = parallel_fitness;
    }

    pub fn set_max_threads(&mut self, max_threads: usize) {
        self.max_threads = max_threads;
    }

    pub fn set_tournament_size(&mut self, tournament_size: usize) {
        self.tournament_size = tournament_size;
    }

    pub fn set_log_level(&mut self, log_level: LogLevel) {
        self.log_level = log_level;
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.seed = seed;
    }

    pub fn set_crossover_rate(&mut self, crossover_rate: f64) {
        self.crossover_rate = crossover_rate;
    }

    pub fn set_target_diversity(&mut self, target_diversity: f64) {
        self.target_diversity = target_diversity;
    }

    pub fn set_adaptation_gain(&mut self, adaptation_gain: f64) {
        self.adaptation_gain = adaptation_gain;
    }

    pub fn set_min_mutation_rate(&mut self, min_mutation_rate: f64) {
        self.min_mutation_rate = min_mutation_rate;
    }

    pub fn set_max_mutation_rate(&mut self, max_mutation_rate: f64) {
        self.max_mutation_rate = max_mutation_rate;
    }

    pub fn set_failure_fitness(&mut self, failure_fitness: f64) {
        self.failure_fitness = failure_fitness;
    }

    pub fn set_parallel_threshold(&mut self, parallel_threshold: usize) {
        self.parallel_threshold = parallel_threshold;
    }

    pub fn set_constraint_penalty(&mut self, constraint_penalty: f64) {
        self.constraint_penalty = constraint_penalty;
    }

    /// Checks the options for inconsistent combinations.
    ///
    /// # Errors
    ///
    /// Returns [`GeneticError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(GeneticError::Configuration(msg));

        if self.population_size == 0 {
            return fail("Population size cannot be zero".to_string());
        }
        if self.max_generations == 0 {
            return fail("Maximum number of generations cannot be zero".to_string());
        }
        if self.elite_count > self.population_size {
            return fail(format!(
                "Elite count {} exceeds population size {}",
                self.elite_count, self.population_size
            ));
        }
        if self.tournament_size == 0 {
            return fail("Tournament size must be at least 1".to_string());
        }
        if self.stagnation_limit == 0 {
            return fail("Stagnation limit must be at least 1".to_string());
        }
        for (name, rate) in [
            ("Initial mutation rate", self.initial_mutation_rate),
            ("Minimum mutation rate", self.min_mutation_rate),
            ("Maximum mutation rate", self.max_mutation_rate),
            ("Crossover rate", self.crossover_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return fail(format!("{} {} must lie in [0, 1]", name, rate));
            }
        }
        if self.min_mutation_rate > self.max_mutation_rate {
            return fail(format!(
                "Minimum mutation rate {} exceeds maximum {}",
                self.min_mutation_rate, self.max_mutation_rate
            ));
        }
        if self.parallel_fitness && self.max_threads == 0 {
            return fail("Parallel fitness evaluation needs at least one thread".to_string());
        }
        if self.convergence_threshold.is_nan() {
            return fail("Convergence threshold cannot be NaN".to_string());
        }
        if self.failure_fitness.is_nan() {
            return fail("Failure fitness cannot be NaN".to_string());
        }
        if !self.adaptation_gain.is_finite() || !self.target_diversity.is_finite() {
            return fail("Adaptation gain and target diversity must be finite".to_string());
        }
        if !self.constraint_penalty.is_finite() || self.constraint_penalty < 0.0 {
            return fail(format!(
                "Constraint penalty {} must be finite and non-negative",
                self.constraint_penalty
            ));
        }
        Ok(())
    }

    /// Returns a builder for creating an `EvolutionOptions` instance.
    pub fn builder() -> EvolutionOptionsBuilder {
        EvolutionOptionsBuilder::default()
    }
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_generations: 100,
            initial_mutation_rate: 0.01,
            adaptive_mutation: false,
            elitism: true,
            elite_count: 2,
            convergence_threshold: f64::INFINITY,
            stagnation_limit: 50,
            parallel_fitness: false,
            max_threads: default_threads(),
            tournament_size: 3,
            log_level: LogLevel::None,
            seed: None,
            crossover_rate: 0.9,
            target_diversity: 0.3,
            adaptation_gain: 0.05,
            min_mutation_rate: 0.001,
            max_mutation_rate: 0.5,
            failure_fitness: f64::MIN,
            parallel_threshold: 16,
            constraint_penalty: 100.0,
        }
    }
}

/// Builder for `EvolutionOptions`.
///
/// Provides a fluent interface for constructing `EvolutionOptions` instances.
/// Unset fields take the values of [`EvolutionOptions::default`].
#[derive(Debug, Clone, Default)]
pub struct EvolutionOptionsBuilder {
    population_size: Option<usize>,
    max_generations: Option<usize>,
    initial_mutation_rate: Option<f64>,
    adaptive_mutation: Option<bool>,
    elitism: Option<bool>,
    elite_count: Option<usize>,
    convergence_threshold: Option<f64>,
    stagnation_limit: Option<usize>,
    parallel_fitness: Option<bool>,
    max_threads: Option<usize>,
    tournament_size: Option<usize>,
    log_level: Option<LogLevel>,
    seed: Option<u64>,
    crossover_rate: Option<f64>,
    target_diversity: Option<f64>,
    adaptation_gain: Option<f64>,
    min_mutation_rate: Option<f64>,
    max_mutation_rate: Option<f64>,
    failure_fitness: Option<f64>,
    parallel_threshold: Option<usize>,
    constraint_penalty: Option<f64>,
}

impl EvolutionOptionsBuilder {
    pub fn population_size(mut self, value: usize) -> Self {
        self.population_size = Some(value);
        self
    }

    pub fn max_generations(mut self, value: usize) -> Self {
        self.max_generations = Some(value);
        self
    }

    pub fn initial_mutation_rate(mut self, value: f64) -> Self {
        self.initial_mutation_rate = Some(value);
        self
    }

    pub fn adaptive_mutation(mut self, value: bool) -> Self {
        self.adaptive_mutation = Some(value);
        self
    }

    pub fn elitism(mut self, value: bool) -> Self {
        self.elitism = Some(value);
        self
    }

    pub fn elite_count(mut self, value: usize) -> Self {
        self.elite_count = Some(value);
        self
    }

    pub fn convergence_threshold(mut self, value: f64) -> Self {
        self.convergence_threshold = Some(value);
        self
    }

    pub fn stagnation_limit(mut self, value: usize) -> Self {
        self.stagnation_limit = Some(value);
        self
    }

    pub fn parallel_fitness(mut self, value: bool) -> Self {
        self.parallel_fitness = Some(value);
        self
    }

    pub fn max_threads(mut self, value: usize) -> Self {
        self.max_threads = Some(value);
        self
    }

    pub fn tournament_size(mut self, value: usize) -> Self {
        self.tournament_size = Some(value);
        self
    }

    pub fn log_level(mut self, value: LogLevel) -> Self {
        self.log_level = Some(value);
        self
    }

    pub fn seed(mut self, value: u64) -> Self {
        self.seed = Some(value);
        self
    }

    pub fn crossover_rate(mut self, value: f64) -> Self {
        self.crossover_rate = Some(value);
        self
    }

    pub fn target_diversity(mut self, value: f64) -> Self {
        self.target_diversity = Some(value);
        self
    }

    pub fn adaptation_gain(mut self, value: f64) -> Self {
        self.adaptation_gain = Some(value);
        self
    }

    pub fn min_mutation_rate(mut self, value: f64) -> Self {
        self.min_mutation_rate = Some(value);
        self
    }

    pub fn max_mutation_rate(mut self, value: f64) -> Self {
        self.max_mutation_rate = Some(value);
        self
    }

    pub fn failure_fitness(mut self, value: f64) -> Self {
        self.failure_fitness = Some(value);
        self
    }

    pub fn parallel_threshold(mut self, value: usize) -> Self {
        self.parallel_threshold = Some(value);
        self
    }

    pub fn constraint_penalty(mut self, value: f64) -> Self {
        self.constraint_penalty = Some(value);
        self
    }

    /// Builds the `EvolutionOptions` instance.
    pub fn build(self) -> EvolutionOptions {
        let defaults = EvolutionOptions::default();
        EvolutionOptions {
            population_size: self.population_size.unwrap_or(defaults.population_size),
            max_generations: self.max_generations.unwrap_or(defaults.max_generations),
            initial_mutation_rate: self.initial_mutation_rate.unwrap_or(defaults.initial_mutation_rate),
            adaptive_mutation: self.adaptive_mutation.unwrap_or(defaults.adaptive_mutation),
            elitism: self.elitism.unwrap_or(defaults.elitism),
            elite_count: self.elite_count.unwrap_or(defaults.elite_count),
            convergence_threshold: self.convergence_threshold.unwrap_or(defaults.convergence_threshold),
            stagnation_limit: self.stagnation_limit.unwrap_or(defaults.stagnation_limit),
            parallel_fitness: self.parallel_fitness.unwrap_or(defaults.parallel_fitness),
            max_threads: self.max_threads.unwrap_or(defaults.max_threads),
            tournament_size: self.tournament_size.unwrap_or(defaults.tournament_size),
            log_level: self.log_level.unwrap_or(defaults.log_level),
            seed: self.seed.or(defaults.seed),
            crossover_rate: self.crossover_rate.unwrap_or(defaults.crossover_rate),
            target_diversity: self.target_diversity.unwrap_or(defaults.target_diversity),
            adaptation_gain: self.adaptation_gain.unwrap_or(defaults.adaptation_gain),
            min_mutation_rate: self.min_mutation_rate.unwrap_or(defaults.min_mutation_rate),
            max_mutation_rate: self.max_mutation_rate.unwrap_or(defaults.max_mutation_rate),
            failure_fitness: self.failure_fitness.unwrap_or(defaults.failure_fitness),
            parallel_threshold: self.parallel_threshold.unwrap_or(defaults.parallel_threshold),
            constraint_penalty: self.constraint_penalty.unwrap_or(defaults.constraint_penalty),
        }
    }
}
