//! # EvolutionEngine
//!
//! Runs the generational loop over a population of genomes `G`:
//!
//! 1. evaluate every individual without a fitness
//! 2. record statistics and update the best individual
//! 3. check termination: converged, stagnated, generation limit, failed
//! 4. select parents and breed offspring
//! 5. replace the population in a single swap
//! 6. adapt the mutation rate
//!
//! The loop is single threaded; parallelism lives inside the evaluator and the
//! breed strategy. Cancellation is checked once per generation boundary.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::options::{EvolutionOptions, LogLevel};
use super::telemetry::{GenerationRecord, TelemetrySink};
use crate::adaptive::AdaptiveMutationController;
use crate::checkpoint::{CheckpointManager, EngineParameters, EvolutionCheckpoint};
use crate::chromosome::Chromosome;
use crate::constraints::ConstraintManager;
use crate::error::{CheckpointError, GeneticError, Result};
use crate::evaluation::FitnessEvaluator;
use crate::population::{Individual, Population, PopulationManager};
use crate::rng::RandomNumberGenerator;
use crate::selection::SelectionStrategy;
use crate::strategy::{BreedStrategy, BreedingPlan, OrdinaryStrategy};

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The best fitness reached the convergence threshold.
    Converged,
    /// The best fitness did not improve for `stagnation_limit` generations.
    Stagnated,
    MaxGenerationsReached,
    /// Every individual failed evaluation, or the evaluator itself failed.
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    /// Population created, not yet evaluated.
    Initialized,
    Running,
    /// Final. Only a checkpoint restore produces a runnable engine again.
    Terminated(TerminationReason),
}

/// Shared flag used to stop a run cooperatively.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of [`EvolutionEngine::run`].
#[derive(Debug, Clone)]
pub struct EvolutionResult<G> {
    /// Best individual of the whole run.
    pub best: Option<Individual<G>>,
    pub reason: TerminationReason,
    /// Index of the last evaluated generation.
    pub generation: usize,
    pub history: Vec<GenerationRecord>,
}

impl<G> EvolutionResult<G> {
    pub fn best_fitness(&self) -> Option<f64> {
        self.best.as_ref().and_then(Individual::fitness)
    }
}

pub(crate) type CheckpointWriter<G> =
    fn(&CheckpointManager, &EvolutionCheckpoint<G>) -> std::result::Result<PathBuf, CheckpointError>;

pub(crate) struct Autosave<G> {
    pub(crate) manager: CheckpointManager,
    pub(crate) write: CheckpointWriter<G>,
}

/// Drives the evolution of one population. Built with
/// [`crate::evolution::EvolutionEngineBuilder`].
pub struct EvolutionEngine<G, E, S, B = OrdinaryStrategy>
where
    G: Chromosome,
{
    pub(crate) options: EvolutionOptions,
    pub(crate) evaluator: E,
    pub(crate) selection: S,
    pub(crate) breeder: B,
    pub(crate) manager: PopulationManager<G>,
    pub(crate) constraints: Option<Arc<ConstraintManager<G>>>,
    pub(crate) mutation: AdaptiveMutationController,
    pub(crate) population: Population<G>,
    /// Index of the next generation to evaluate.
    pub(crate) generation: usize,
    pub(crate) best: Option<Individual<G>>,
    pub(crate) stagnation: usize,
    pub(crate) seed: u64,
    pub(crate) state: EngineState,
    pub(crate) history: Vec<GenerationRecord>,
    pub(crate) telemetry: Option<Arc<dyn TelemetrySink>>,
    pub(crate) autosave: Option<Autosave<G>>,
    pub(crate) cancellation: CancellationToken,
}

impl<G, E, S, B> EvolutionEngine<G, E, S, B>
where
    G: Chromosome,
    E: FitnessEvaluator<G>,
    S: SelectionStrategy<G>,
    B: BreedStrategy<G>,
{
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.state, EngineState::Terminated(_))
    }

    /// Index of the next generation to evaluate.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn population(&self) -> &Population<G> {
        &self.population
    }

    pub fn best(&self) -> Option<&Individual<G>> {
        self.best.as_ref()
    }

    pub fn best_fitness(&self) -> Option<f64> {
        self.best.as_ref().and_then(Individual::fitness)
    }

    pub fn history(&self) -> &[GenerationRecord] {
        &self.history
    }

    pub fn options(&self) -> &EvolutionOptions {
        &self.options
    }

    pub fn mutation_rate(&self) -> f64 {
        self.mutation.rate()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn population_manager(&self) -> &PopulationManager<G> {
        &self.manager
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Runs generations until a termination condition holds.
    ///
    /// # Errors
    ///
    /// Contract violations of genome operators and failed checkpoint writes. A
    /// failed checkpoint leaves the engine consistent; calling `run` again resumes.
    pub fn run(&mut self) -> Result<EvolutionResult<G>> {
        loop {
            if let Some(reason) = self.step()? {
                return Ok(self.result(reason));
            }
        }
    }

    fn result(&self, reason: TerminationReason) -> EvolutionResult<G> {
        EvolutionResult {
            best: self.best.clone(),
            reason,
            generation: self.history.last().map_or(0, |r| r.generation),
            history: self.history.clone(),
        }
    }

    /// Runs one generation. Returns the termination reason once the run is over.
    pub fn step(&mut self) -> Result<Option<TerminationReason>> {
        if let EngineState::Terminated(reason) = &self.state {
            return Ok(Some(reason.clone()));
        }
        if self.cancellation.is_cancelled() {
            info!("Evolution cancelled before generation {}", self.generation);
            return Ok(Some(self.terminate(TerminationReason::Cancelled)));
        }
        self.state = EngineState::Running;

        let started = Instant::now();
        let generation = self.generation;

        let failed = match self.evaluate() {
            Ok(failed) => failed,
            Err(e) => {
                error!("Evaluation of generation {} failed: {}", generation, e);
                let failed = self.population.unevaluated_indices().len();
                self.publish(generation, started, failed);
                return Ok(Some(self.terminate(TerminationReason::Failed(e.to_string()))));
            }
        };

        self.track_best();
        self.log_generation(generation);

        if let Some(reason) = self.check_termination(generation) {
            self.publish(generation, started, failed);
            return Ok(Some(self.terminate(reason)));
        }

        let observed_diversity = self.population.diversity();
        let next = match self.breed(generation) {
            Ok(next) => next,
            Err(e) => {
                self.publish(generation, started, failed);
                self.terminate(TerminationReason::Failed(e.to_string()));
                return Err(e);
            }
        };
        self.population = next;
        self.generation = generation + 1;
        self.publish(generation, started, failed);

        if self.options.get_adaptive_mutation() {
            let rate = self.mutation.update(observed_diversity);
            debug!("Mutation rate adapted to {:.5}", rate);
        }

        self.autosave()?;
        Ok(None)
    }

    /// Scores unevaluated individuals. Returns the number of failed evaluations.
    fn evaluate(&mut self) -> Result<usize> {
        let pending = self.population.unevaluated_indices();
        let genomes: Vec<G> = pending
            .iter()
            .filter_map(|&i| self.population.get(i))
            .map(|ind| ind.genome().clone())
            .collect();

        let report = self.evaluator.evaluate(&genomes)?;
        if report.len() != genomes.len() {
            return Err(GeneticError::Evaluator(format!(
                "Evaluator returned {} scores for {} genomes",
                report.len(),
                genomes.len()
            )));
        }

        let penalty = self.options.get_constraint_penalty();
        let mut failures = report.failures;
        failures.sort_by_key(|(index, _)| *index);
        let mut errors = failures.into_iter().peekable();
        let individuals = self.population.individuals_mut();
        for (k, (&index, &fitness)) in pending.iter().zip(&report.fitness).enumerate() {
            let individual = &mut individuals[index];
            let violations = self
                .constraints
                .as_ref()
                .map_or(0, |c| c.hard_violations(individual.genome()));
            let adjusted = fitness - penalty * violations as f64;

            match errors.next_if(|(failed, _)| *failed == k) {
                Some((_, err)) => individual.set_failed(adjusted, err),
                None => individual.set_fitness(adjusted),
            }
        }
        self.population.refresh_statistics();
        Ok(report_failed(&self.population, &pending))
    }

    fn track_best(&mut self) {
        let Some(candidate) = self.population.best() else {
            self.stagnation += 1;
            return;
        };
        let improved = match (candidate.fitness(), self.best_fitness()) {
            (Some(new), Some(old)) => new > old,
            (Some(_), None) => true,
            _ => false,
        };
        if improved {
            self.best = Some(candidate.clone());
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
        }
    }

    fn check_termination(&self, generation: usize) -> Option<TerminationReason> {
        let threshold = self.options.get_convergence_threshold();
        if self.best_fitness().is_some_and(|best| best - threshold >= 0.0) {
            return Some(TerminationReason::Converged);
        }
        if self.stagnation >= self.options.get_stagnation_limit() {
            return Some(TerminationReason::Stagnated);
        }
        if generation + 1 >= self.options.get_max_generations() {
            return Some(TerminationReason::MaxGenerationsReached);
        }
        let all_failed = !self.population.is_empty()
            && self
                .population
                .individuals()
                .iter()
                .all(|ind| ind.metadata().evaluation_error.is_some());
        if all_failed {
            return Some(TerminationReason::Failed(format!(
                "All {} individuals failed evaluation in generation {}",
                self.population.len(),
                generation
            )));
        }
        None
    }

    fn breed(&self, generation: usize) -> Result<Population<G>> {
        let mut rng = RandomNumberGenerator::for_generation(self.seed, generation);
        let plan = BreedingPlan {
            offspring: self.manager.offspring_count(),
            mutation_rate: self.mutation.rate(),
            crossover_rate: self.options.get_crossover_rate(),
            parallel_threshold: self.options.get_parallel_threshold(),
            constraints: self.constraints.as_deref(),
        };
        let offspring = self
            .breeder
            .breed(&self.population, &self.selection, &plan, &mut rng)?;
        self.manager
            .next_generation(&self.population, offspring, generation + 1, &mut rng)
    }

    fn terminate(&mut self, reason: TerminationReason) -> TerminationReason {
        if !matches!(self.options.get_log_level(), LogLevel::None) {
            info!(
                "Evolution terminated: {:?} (best fitness {:?})",
                reason,
                self.best_fitness()
            );
        }
        self.state = EngineState::Terminated(reason.clone());
        reason
    }

    fn publish(&mut self, generation: usize, started: Instant, failed: usize) {
        let stats = self.population.stats();
        let record = GenerationRecord {
            generation,
            best_fitness: stats.best_fitness.unwrap_or(f64::NEG_INFINITY),
            average_fitness: stats.average_fitness,
            diversity: stats.diversity,
            fitness_std: stats.fitness_std,
            mutation_rate: self.mutation.rate(),
            failed_evaluations: failed,
            elapsed: started.elapsed(),
        };
        if let Some(sink) = &self.telemetry {
            sink.record(&record);
        }
        self.history.push(record);
    }

    fn log_generation(&self, generation: usize) {
        let stats = self.population.stats();
        match self.options.get_log_level() {
            LogLevel::None => {}
            LogLevel::Minimal => info!(
                "Generation {}: best {:?}, average {:.4}, diversity {:.4}",
                generation, stats.best_fitness, stats.average_fitness, stats.diversity
            ),
            LogLevel::Verbose => {
                info!(
                    "Generation {}: best {:?}, average {:.4}, std {:.4}, diversity {:.4}, mutation rate {:.5}",
                    generation,
                    stats.best_fitness,
                    stats.average_fitness,
                    stats.fitness_std,
                    stats.diversity,
                    self.mutation.rate()
                );
                for (i, ind) in self.population.individuals().iter().enumerate() {
                    debug!(
                        "  #{} {:?} fitness {:?}: {:?}",
                        i,
                        ind.origin(),
                        ind.fitness(),
                        ind.genome()
                    );
                }
            }
        }
    }

    /// Snapshot of the engine between generations.
    pub fn checkpoint(&self) -> EvolutionCheckpoint<G> {
        EvolutionCheckpoint::new(
            self.generation,
            self.population.individuals().to_vec(),
            self.best.clone(),
            EngineParameters {
                seed: self.seed,
                mutation_rate: self.mutation.rate(),
                stagnation_counter: self.stagnation,
                best_fitness: self.best_fitness(),
            },
            self.history.clone(),
        )
    }

    fn autosave(&self) -> Result<()> {
        let Some(autosave) = &self.autosave else {
            return Ok(());
        };
        if !autosave.manager.is_due(self.generation) {
            return Ok(());
        }
        (autosave.write)(&autosave.manager, &self.checkpoint())?;
        Ok(())
    }

    /// Moves the individuals at `indices` out of the population and tops it up
    /// with random genomes, which are evaluated in the next generation.
    pub(crate) fn emigrate(
        &mut self,
        indices: &[usize],
        rng: &mut RandomNumberGenerator,
    ) -> Result<Vec<Individual<G>>> {
        let emigrants = self.population.take(indices);
        self.manager.refill(&mut self.population, rng)?;
        Ok(emigrants)
    }

    pub(crate) fn population_mut(&mut self) -> &mut Population<G> {
        &mut self.population
    }
}

fn report_failed<G: Chromosome>(population: &Population<G>, evaluated: &[usize]) -> usize {
    let failed = evaluated
        .iter()
        .filter_map(|&i| population.get(i))
        .filter(|ind| ind.metadata().evaluation_error.is_some())
        .count();
    if failed > 0 {
        warn!("{} of {} evaluations failed", failed, evaluated.len());
    }
    failed
}
