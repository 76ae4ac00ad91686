use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use genopt::{
    error::FitnessError,
    evaluation::{FitnessEvaluator, LocalEvaluator},
    genome::{RealVector, RealVectorShape},
    operators::Bounds,
    population::{Individual, Origin, Population},
    rng::RandomNumberGenerator,
    selection::TournamentSelection,
    strategy::{BreedStrategy, BreedingPlan, OrdinaryStrategy},
    Chromosome,
};

// Deliberately expensive so that parallel evaluation has work to split
fn rastrigin(genome: &RealVector) -> Result<f64, FitnessError> {
    let mut sum = 10.0 * genome.len() as f64;
    for _ in 0..50 {
        sum = 10.0 * genome.len() as f64;
        for x in genome.genes() {
            sum += x * x - 10.0 * (2.0 * std::f64::consts::PI * x).cos();
        }
    }
    Ok(-sum)
}

fn genomes(count: usize, rng: &mut RandomNumberGenerator) -> Vec<RealVector> {
    let shape = RealVectorShape::new(30, Bounds::new(-5.12, 5.12));
    (0..count).map(|_| RealVector::random(&shape, rng)).collect()
}

fn bench_fitness_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("fitness_evaluation");
    let mut rng = RandomNumberGenerator::from_seed(3);
    let sequential = LocalEvaluator::new(rastrigin);
    let parallel = LocalEvaluator::new(rastrigin).parallel();

    for size in [10, 100, 1000, 10000].iter() {
        let candidates = genomes(*size, &mut rng);

        group.bench_with_input(BenchmarkId::new("sequential", size), &candidates, |b, candidates| {
            b.iter(|| sequential.evaluate(black_box(candidates)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("parallel", size), &candidates, |b, candidates| {
            b.iter(|| parallel.evaluate(black_box(candidates)).unwrap())
        });
    }

    group.finish();
}

fn bench_breeding(c: &mut Criterion) {
    let mut group = c.benchmark_group("breeding");
    let mut rng = RandomNumberGenerator::from_seed(5);
    let selection = TournamentSelection::new(3).unwrap();
    let strategy = OrdinaryStrategy::new();

    for size in [100, 1000, 10000].iter() {
        let individuals = genomes(*size, &mut rng)
            .into_iter()
            .map(|genome| {
                let fitness = rastrigin(&genome).unwrap_or(f64::MIN);
                let mut individual = Individual::new(genome, Origin::Random, 0);
                individual.set_fitness(fitness);
                individual
            })
            .collect();
        let parents = Population::new(individuals, 0);

        for (name, threshold) in [("sequential", usize::MAX), ("parallel", 0)] {
            let plan = BreedingPlan {
                offspring: *size,
                mutation_rate: 0.05,
                crossover_rate: 0.9,
                parallel_threshold: threshold,
                constraints: None,
            };
            group.bench_with_input(BenchmarkId::new(name, size), &parents, |b, parents| {
                b.iter(|| {
                    strategy
                        .breed(black_box(parents), &selection, &plan, &mut rng)
                        .unwrap()
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_fitness_evaluation, bench_breeding);
criterion_main!(benches);
