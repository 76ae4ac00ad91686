use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use genopt::{
    error::{FitnessError, GeneticError},
    evaluation::LocalEvaluator,
    evolution::{
        CancellationToken, EngineState, EvolutionEngine, EvolutionEngineBuilder,
        EvolutionOptions, GenerationRecord, LogLevel, TerminationReason,
    },
    genome::{BitVector, BitVectorShape, RealVector, RealVectorShape},
    operators::Bounds,
    population::Origin,
    selection::{RouletteWheelSelection, TournamentSelection},
};

type Score = fn(&BitVector) -> Result<f64, FitnessError>;
type BitEngine = EvolutionEngine<BitVector, LocalEvaluator<BitVector, Score>, TournamentSelection>;

fn onemax(genome: &BitVector) -> Result<f64, FitnessError> {
    Ok(genome.count_ones() as f64)
}

fn constant(_: &BitVector) -> Result<f64, FitnessError> {
    Ok(1.0)
}

fn onemax_options(seed: u64) -> EvolutionOptions {
    EvolutionOptions::builder()
        .population_size(20)
        .max_generations(100)
        .tournament_size(3)
        .elitism(true)
        .elite_count(2)
        .initial_mutation_rate(0.03)
        .convergence_threshold(32.0)
        .stagnation_limit(100)
        .log_level(LogLevel::None)
        .seed(seed)
        .build()
}

fn bit_engine(options: EvolutionOptions, score: Score, bits: usize) -> BitEngine {
    EvolutionEngineBuilder::<BitVector, _, _>::new()
        .with_shape(BitVectorShape::new(bits))
        .with_evaluator(LocalEvaluator::new(score).with_failure_fitness(options.get_failure_fitness()))
        .with_selection_strategy(TournamentSelection::from_options(&options).unwrap())
        .with_options(options)
        .build()
        .unwrap()
}

#[test]
fn test_onemax_reaches_all_ones() {
    for seed in 0..50 {
        let mut engine = bit_engine(onemax_options(seed), onemax, 32);
        let result = engine.run().unwrap();
        assert_eq!(
            result.reason,
            TerminationReason::Converged,
            "seed {} stopped at generation {}",
            seed,
            result.generation
        );
        assert_eq!(result.best_fitness(), Some(32.0));
        assert!(result.generation < 100);
    }
}

#[test]
fn test_population_size_is_invariant() {
    let mut engine = bit_engine(onemax_options(11), onemax, 32);
    assert_eq!(engine.state(), &EngineState::Initialized);
    assert_eq!(engine.population().len(), 20);

    for _ in 0..30 {
        if engine.step().unwrap().is_some() {
            break;
        }
        assert_eq!(engine.state(), &EngineState::Running);
        assert_eq!(engine.population().len(), 20);
    }
}

#[test]
fn test_elitism_keeps_best_fitness_monotonic() {
    let mut options = onemax_options(3);
    options.set_convergence_threshold(f64::INFINITY);
    options.set_max_generations(40);
    let mut engine = bit_engine(options, onemax, 64);
    let result = engine.run().unwrap();

    assert_eq!(result.reason, TerminationReason::MaxGenerationsReached);
    assert_eq!(result.history.len(), 40);
    for pair in result.history.windows(2) {
        assert!(pair[1].best_fitness >= pair[0].best_fitness);
    }
}

#[test]
fn test_same_seed_gives_same_run() {
    let best_sequence = |seed| {
        let mut options = onemax_options(seed);
        options.set_max_generations(25);
        let mut engine = bit_engine(options, onemax, 48);
        engine
            .run()
            .unwrap()
            .history
            .iter()
            .map(|r| r.best_fitness)
            .collect::<Vec<_>>()
    };

    assert_eq!(best_sequence(42), best_sequence(42));
}

#[test]
fn test_constant_fitness_stagnates_after_limit() {
    let mut options = onemax_options(1);
    options.set_stagnation_limit(5);
    let mut engine = bit_engine(options, constant, 16);
    let result = engine.run().unwrap();

    assert_eq!(result.reason, TerminationReason::Stagnated);
    assert_eq!(result.generation, 5);
    assert_eq!(result.history.len(), 6);
    assert_eq!(
        engine.state(),
        &EngineState::Terminated(TerminationReason::Stagnated)
    );
}

#[test]
fn test_terminated_engine_does_not_advance() {
    let mut options = onemax_options(1);
    options.set_max_generations(2);
    options.set_convergence_threshold(f64::INFINITY);
    let mut engine = bit_engine(options, onemax, 8);
    engine.run().unwrap();
    let generations = engine.history().len();

    assert_eq!(
        engine.step().unwrap(),
        Some(TerminationReason::MaxGenerationsReached)
    );
    assert_eq!(engine.history().len(), generations);
}

#[test]
fn test_invalid_options_are_rejected_at_build() {
    let options = EvolutionOptions::builder()
        .population_size(4)
        .elite_count(10)
        .build();
    let result = EvolutionEngineBuilder::<BitVector, _, _>::new()
        .with_shape(BitVectorShape::new(8))
        .with_evaluator(LocalEvaluator::new(onemax as Score))
        .with_selection_strategy(TournamentSelection::default())
        .with_options(options)
        .build();
    assert!(matches!(result, Err(GeneticError::Configuration(_))));
}

#[test]
fn test_missing_selection_strategy() {
    let result = EvolutionEngineBuilder::<BitVector, _, TournamentSelection>::new()
        .with_shape(BitVectorShape::new(8))
        .with_evaluator(LocalEvaluator::new(onemax as Score))
        .build();
    match result {
        Err(GeneticError::Configuration(message)) => {
            assert_eq!(message, "Selection strategy not specified")
        }
        _ => panic!("expected a configuration error"),
    }
}

#[test]
fn test_panicking_fitness_is_penalised() {
    fn fragile(genome: &BitVector) -> Result<f64, FitnessError> {
        if genome.bits()[0] {
            panic!("sensor offline");
        }
        Ok(genome.count_ones() as f64)
    }

    let mut options = onemax_options(8);
    options.set_failure_fitness(-1.0);
    options.set_max_generations(1);
    let mut engine = bit_engine(options, fragile, 16);
    let result = engine.run().unwrap();
    assert_eq!(result.reason, TerminationReason::MaxGenerationsReached);
    for individual in engine.population().individuals() {
        if individual.genome().bits()[0] {
            assert_eq!(individual.fitness(), Some(-1.0));
            let error = individual.metadata().evaluation_error.as_deref().unwrap();
            assert!(error.contains("sensor offline"));
        }
    }
    let failed = engine
        .population()
        .individuals()
        .iter()
        .filter(|ind| ind.genome().bits()[0])
        .count();
    assert!(failed > 0);
    assert_eq!(result.history[0].failed_evaluations, failed);
}

#[test]
fn test_all_failures_terminate_with_failed() {
    fn broken(_: &BitVector) -> Result<f64, FitnessError> {
        Err(FitnessError::Evaluation("backend down".to_string()))
    }

    let mut options = onemax_options(2);
    options.set_stagnation_limit(50);
    let mut engine = bit_engine(options, broken, 8);
    let result = engine.run().unwrap();

    assert!(matches!(result.reason, TerminationReason::Failed(_)));
    assert_eq!(result.generation, 0);
    assert_eq!(result.history[0].failed_evaluations, 20);
}

#[test]
fn test_cancellation_stops_at_generation_boundary() {
    let token = CancellationToken::new();
    let sink_token = token.clone();
    let seen = Arc::new(AtomicUsize::new(0));
    let sink_seen = Arc::clone(&seen);

    let mut options = onemax_options(5);
    options.set_convergence_threshold(f64::INFINITY);
    let mut engine = EvolutionEngineBuilder::<BitVector, _, _>::new()
        .with_shape(BitVectorShape::new(32))
        .with_evaluator(LocalEvaluator::new(onemax as Score))
        .with_selection_strategy(TournamentSelection::new(3).unwrap())
        .with_options(options)
        .with_cancellation_token(token)
        .with_telemetry(move |record: &GenerationRecord| {
            sink_seen.fetch_add(1, Ordering::SeqCst);
            if record.generation == 3 {
                sink_token.cancel();
            }
        })
        .build()
        .unwrap();

    let result = engine.run().unwrap();
    assert_eq!(result.reason, TerminationReason::Cancelled);
    assert_eq!(result.history.len(), 4);
    assert_eq!(seen.load(Ordering::SeqCst), 4);
    assert_eq!(engine.population().len(), 20);
    assert_eq!(engine.generation(), 4);
}

#[test]
fn test_elites_are_carried_with_fitness() {
    let mut engine = bit_engine(onemax_options(9), onemax, 32);
    engine.step().unwrap();

    let elites: Vec<_> = engine
        .population()
        .individuals()
        .iter()
        .filter(|ind| ind.origin() == Origin::Elite)
        .collect();
    assert_eq!(elites.len(), 2);
    assert!(elites.iter().all(|ind| ind.is_evaluated()));
    assert_eq!(engine.population().unevaluated_indices().len(), 18);
}

#[test]
fn test_real_vector_sphere_with_roulette() {
    fn sphere(genome: &RealVector) -> Result<f64, FitnessError> {
        let sum: f64 = genome.genes().iter().map(|x| x * x).sum();
        Ok(1.0 / (1.0 + sum))
    }

    let options = EvolutionOptions::builder()
        .population_size(40)
        .max_generations(150)
        .initial_mutation_rate(0.2)
        .adaptive_mutation(true)
        .stagnation_limit(150)
        .seed(17)
        .build();
    let mut engine = EvolutionEngineBuilder::<RealVector, _, _>::new()
        .with_shape(RealVectorShape::new(3, Bounds::new(-5.0, 5.0)))
        .with_evaluator(LocalEvaluator::new(sphere))
        .with_selection_strategy(RouletteWheelSelection::new())
        .with_options(options)
        .build()
        .unwrap();

    let first = {
        engine.step().unwrap();
        engine.history()[0].best_fitness
    };
    let result = engine.run().unwrap();
    let best = result.best_fitness().unwrap();
    assert!(best >= first);
    assert!(best > 0.25, "best fitness {}", best);
    assert!(result
        .history
        .iter()
        .all(|r| (0.001..=0.5).contains(&r.mutation_rate)));
}

#[test]
fn test_verbose_logging_run() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let mut options = onemax_options(4);
    options.set_log_level(LogLevel::Verbose);
    options.set_max_generations(3);
    let mut engine = bit_engine(options, onemax, 8);
    let result = engine.run().unwrap();

    assert!(matches!(
        result.reason,
        TerminationReason::MaxGenerationsReached | TerminationReason::Converged
    ));
}

#[derive(Clone, Default)]
struct CapturedLog(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_mismatched_tournament_size_is_reported() {
    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let options = onemax_options(2);
    let engine = tracing::subscriber::with_default(subscriber, || {
        EvolutionEngineBuilder::<BitVector, _, _>::new()
            .with_shape(BitVectorShape::new(8))
            .with_evaluator(LocalEvaluator::new(onemax as Score))
            .with_selection_strategy(TournamentSelection::new(7).unwrap())
            .with_options(options)
            .build()
    });

    assert!(engine.is_ok());
    let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("ignoring tournament_size 3"), "log: {}", output);
}
