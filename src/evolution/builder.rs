use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::engine::{Autosave, CancellationToken, EngineState, EvolutionEngine};
use super::options::EvolutionOptions;
use super::telemetry::TelemetrySink;
use crate::{
    adaptive::AdaptiveMutationController,
    checkpoint::{CheckpointManager, EvolutionCheckpoint},
    chromosome::Chromosome,
    constraints::ConstraintManager,
    error::{GeneticError, Result},
    evaluation::FitnessEvaluator,
    population::{Population, PopulationManager},
    rng::RandomNumberGenerator,
    selection::SelectionStrategy,
    strategy::{BreedStrategy, OrdinaryStrategy},
};

/// RNG stream reserved for the initial population. Generation streams use the
/// generation index, so this one never collides with them.
const INITIALIZATION_STREAM: u64 = u64::MAX;

/// Assembles an [`EvolutionEngine`].
///
/// Genome shape, evaluator and selection strategy are required. The options are
/// validated in [`EvolutionEngineBuilder::build`].
pub struct EvolutionEngineBuilder<G, E, S, B = OrdinaryStrategy>
where
    G: Chromosome,
{
    options: EvolutionOptions,
    shape: Option<G::Shape>,
    evaluator: Option<E>,
    selection_strategy: Option<S>,
    breed_strategy: B,
    seed_genomes: Vec<G>,
    constraints: Option<Arc<ConstraintManager<G>>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    autosave: Option<Autosave<G>>,
    checkpoint: Option<EvolutionCheckpoint<G>>,
    cancellation: Option<CancellationToken>,
}

impl<G, E, S> EvolutionEngineBuilder<G, E, S, OrdinaryStrategy>
where
    G: Chromosome,
    E: FitnessEvaluator<G>,
    S: SelectionStrategy<G>,
{
    pub fn new() -> Self {
        Self {
            options: EvolutionOptions::default(),
            shape: None,
            evaluator: None,
            selection_strategy: None,
            breed_strategy: OrdinaryStrategy,
            seed_genomes: Vec::new(),
            constraints: None,
            telemetry: None,
            autosave: None,
            checkpoint: None,
            cancellation: None,
        }
    }
}

impl<G, E, S> Default for EvolutionEngineBuilder<G, E, S, OrdinaryStrategy>
where
    G: Chromosome,
    E: FitnessEvaluator<G>,
    S: SelectionStrategy<G>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<G, E, S, B> EvolutionEngineBuilder<G, E, S, B>
where
    G: Chromosome,
    E: FitnessEvaluator<G>,
    S: SelectionStrategy<G>,
    B: BreedStrategy<G>,
{
    pub fn with_options(mut self, options: EvolutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_shape(mut self, shape: G::Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_evaluator(mut self, evaluator: E) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_selection_strategy(mut self, selection_strategy: S) -> Self {
        self.selection_strategy = Some(selection_strategy);
        self
    }

    pub fn with_breed_strategy<B2: BreedStrategy<G>>(
        self,
        breed_strategy: B2,
    ) -> EvolutionEngineBuilder<G, E, S, B2> {
        EvolutionEngineBuilder {
            options: self.options,
            shape: self.shape,
            evaluator: self.evaluator,
            selection_strategy: self.selection_strategy,
            breed_strategy,
            seed_genomes: self.seed_genomes,
            constraints: self.constraints,
            telemetry: self.telemetry,
            autosave: self.autosave,
            checkpoint: self.checkpoint,
            cancellation: self.cancellation,
        }
    }

    /// Genomes placed in the initial population before random ones.
    pub fn with_seed_genomes(mut self, seeds: Vec<G>) -> Self {
        self.seed_genomes = seeds;
        self
    }

    pub fn with_constraints(mut self, constraints: ConstraintManager<G>) -> Self {
        self.constraints = Some(Arc::new(constraints));
        self
    }

    pub fn with_telemetry<T: TelemetrySink + 'static>(mut self, sink: T) -> Self {
        self.telemetry = Some(Arc::new(sink));
        self
    }

    /// Enables autosave at the manager's path and interval.
    pub fn with_checkpoint_manager(mut self, manager: CheckpointManager) -> Self
    where
        G: Serialize,
    {
        self.autosave = Some(Autosave {
            manager,
            write: CheckpointManager::save_to_file::<G>,
        });
        self
    }

    /// Resumes from `checkpoint` instead of creating a fresh population.
    pub fn with_checkpoint(mut self, checkpoint: EvolutionCheckpoint<G>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(self) -> Result<EvolutionEngine<G, E, S, B>> {
        self.options.validate()?;

        let shape = self
            .shape
            .ok_or_else(|| GeneticError::Configuration("Genome shape not specified".to_string()))?;
        let evaluator = self.evaluator.ok_or_else(|| {
            GeneticError::Configuration("Fitness evaluator not specified".to_string())
        })?;
        let selection = self.selection_strategy.ok_or_else(|| {
            GeneticError::Configuration("Selection strategy not specified".to_string())
        })?;
        if let Some(size) = selection.sample_size() {
            if size != self.options.get_tournament_size() {
                warn!(
                    "Selection strategy draws {} individuals, ignoring tournament_size {} from options",
                    size,
                    self.options.get_tournament_size()
                );
            }
        }

        let population_size = self.options.get_population_size();
        let mut manager = PopulationManager::new(
            shape,
            population_size,
            self.options.effective_elite_count(),
        )
        .with_seeds(self.seed_genomes);
        if let Some(constraints) = &self.constraints {
            manager = manager.with_constraints(Arc::clone(constraints));
        }
        let mut mutation = AdaptiveMutationController::from_options(&self.options)?;

        let mut engine = match self.checkpoint {
            Some(checkpoint) => {
                if checkpoint.population.len() != population_size {
                    return Err(GeneticError::Configuration(format!(
                        "Checkpoint population has {} individuals, options require {}",
                        checkpoint.population.len(),
                        population_size
                    )));
                }
                mutation.set_rate(checkpoint.params.mutation_rate);
                info!(
                    "Resuming evolution at generation {} with seed {}",
                    checkpoint.generation, checkpoint.params.seed
                );
                EvolutionEngine {
                    options: self.options,
                    evaluator,
                    selection,
                    breeder: self.breed_strategy,
                    manager,
                    constraints: self.constraints,
                    mutation,
                    population: Population::new(checkpoint.population, checkpoint.generation),
                    generation: checkpoint.generation,
                    best: checkpoint.best,
                    stagnation: checkpoint.params.stagnation_counter,
                    seed: checkpoint.params.seed,
                    state: EngineState::Initialized,
                    history: checkpoint.history,
                    telemetry: self.telemetry,
                    autosave: self.autosave,
                    cancellation: CancellationToken::new(),
                }
            }
            None => {
                let seed = self
                    .options
                    .get_seed()
                    .unwrap_or_else(|| RandomNumberGenerator::new().gen_seed());
                let mut rng = RandomNumberGenerator::derived(seed, INITIALIZATION_STREAM);
                let population = manager.initialize(&mut rng)?;
                info!(
                    "Initialized population of {} with seed {}",
                    population.len(),
                    seed
                );
                EvolutionEngine {
                    options: self.options,
                    evaluator,
                    selection,
                    breeder: self.breed_strategy,
                    manager,
                    constraints: self.constraints,
                    mutation,
                    population,
                    generation: 0,
                    best: None,
                    stagnation: 0,
                    seed,
                    state: EngineState::Initialized,
                    history: Vec::new(),
                    telemetry: self.telemetry,
                    autosave: self.autosave,
                    cancellation: CancellationToken::new(),
                }
            }
        };
        if let Some(token) = self.cancellation {
            engine.cancellation = token;
        }
        Ok(engine)
    }
}
