use genopt::{
    error::{FitnessError, GeneticError},
    evaluation::LocalEvaluator,
    evolution::{EvolutionEngine, EvolutionEngineBuilder, EvolutionOptions, TerminationReason},
    genome::{BitVector, BitVectorShape},
    island::{BestMigration, IslandCoordinator, RandomMigration, Topology},
    population::Origin,
    selection::TournamentSelection,
};

type Score = fn(&BitVector) -> Result<f64, FitnessError>;
type Engine = EvolutionEngine<BitVector, LocalEvaluator<BitVector, Score>, TournamentSelection>;

fn onemax(genome: &BitVector) -> Result<f64, FitnessError> {
    Ok(genome.count_ones() as f64)
}

fn engine(seed: u64, max_generations: usize) -> Engine {
    let options = EvolutionOptions::builder()
        .population_size(20)
        .max_generations(max_generations)
        .stagnation_limit(1_000)
        .seed(seed)
        .build();
    EvolutionEngineBuilder::<BitVector, _, _>::new()
        .with_shape(BitVectorShape::new(32))
        .with_evaluator(LocalEvaluator::new(onemax as Score))
        .with_selection_strategy(TournamentSelection::new(3).unwrap())
        .with_options(options)
        .build()
        .unwrap()
}

#[test]
fn test_ring_migration_moves_individuals() {
    let engines = (0..3).map(|seed| engine(seed, 30)).collect();
    let mut coordinator =
        IslandCoordinator::new(engines, Topology::Ring, BestMigration::new(2), 2, 77).unwrap();
    assert_eq!(coordinator.islands()[2].connections(), &[0]);

    coordinator.run_round().unwrap();
    for island in coordinator.islands() {
        let population = island.engine().population();
        assert!(population
            .individuals()
            .iter()
            .all(|ind| ind.origin() != Origin::Immigrant));
    }

    coordinator.run_round().unwrap();
    for island in coordinator.islands() {
        let population = island.engine().population();
        assert_eq!(population.len(), 20);
        let immigrants = population
            .individuals()
            .iter()
            .filter(|ind| ind.origin() == Origin::Immigrant)
            .count();
        assert_eq!(immigrants, 2);
    }
}

#[test]
fn test_island_run_reports_every_island() {
    let engines = (10..14).map(|seed| engine(seed, 25)).collect();
    let mut coordinator = IslandCoordinator::new(
        engines,
        Topology::Star { hub: 0 },
        RandomMigration::new(5),
        1,
        5,
    )
    .unwrap();
    let result = coordinator.run().unwrap();

    assert_eq!(result.rounds, 25);
    assert_eq!(result.islands.len(), 4);
    for island in &result.islands {
        assert_eq!(island.reason, TerminationReason::MaxGenerationsReached);
        assert_eq!(island.history.len(), 25);
    }

    let best = result.best.and_then(|b| b.fitness()).unwrap();
    let island_best = result
        .islands
        .iter()
        .filter_map(|r| r.best_fitness())
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(best, island_best);
    for island in coordinator.islands() {
        assert_eq!(island.engine().population().len(), 20);
    }
}

#[test]
fn test_terminated_islands_stop_advancing() {
    let engines = vec![engine(1, 3), engine(2, 6)];
    let mut coordinator = IslandCoordinator::new(
        engines,
        Topology::FullyConnected,
        BestMigration::new(1),
        1,
        9,
    )
    .unwrap();
    let result = coordinator.run().unwrap();

    assert_eq!(result.rounds, 6);
    assert_eq!(result.islands[0].history.len(), 3);
    assert_eq!(result.islands[1].history.len(), 6);
}

#[test]
fn test_requires_an_island() {
    let result = IslandCoordinator::<BitVector, _, _, _, _>::new(
        Vec::<Engine>::new(),
        Topology::Ring,
        BestMigration::new(1),
        1,
        0,
    );
    assert!(matches!(result, Err(GeneticError::Configuration(_))));
}
