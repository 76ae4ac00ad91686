//! # Island model
//!
//! Several [`EvolutionEngine`]s, each owning its own population, advance one
//! generation per round in parallel. Between rounds a [`MigrationPolicy`] moves
//! individuals along the edges of a [`Topology`]:
//!
//! - emigrants are taken out of the source population, which is topped up with
//!   random genomes
//! - they travel through the destination island's inbox channel
//! - every inbox is drained and merged after all islands have sent, so no island
//!   reads another island's population
//!
//! Islands that have terminated neither send nor receive.

use std::fmt::Debug;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    chromosome::Chromosome,
    error::{GeneticError, Result},
    evaluation::FitnessEvaluator,
    evolution::{EvolutionEngine, EvolutionResult, TerminationReason},
    population::{Individual, Origin, Population},
    rng::RandomNumberGenerator,
    selection::SelectionStrategy,
    strategy::BreedStrategy,
};

/// Which islands each island sends emigrants to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// Island `i` sends to `i + 1`, the last one to the first.
    #[default]
    Ring,
    FullyConnected,
    /// The hub sends to every island, the others send to the hub.
    Star { hub: usize },
}

impl Topology {
    pub fn targets(&self, source: usize, islands: usize) -> Vec<usize> {
        if islands < 2 {
            return Vec::new();
        }
        match *self {
            Topology::Ring => vec![(source + 1) % islands],
            Topology::FullyConnected => (0..islands).filter(|&i| i != source).collect(),
            Topology::Star { hub } => {
                let hub = hub.min(islands - 1);
                if source == hub {
                    (0..islands).filter(|&i| i != hub).collect()
                } else {
                    vec![hub]
                }
            }
        }
    }
}

/// Decides when migration happens, who leaves and how arrivals are merged.
pub trait MigrationPolicy<G: Chromosome>: Debug + Send + Sync {
    /// Called once per round with the number of completed rounds.
    fn should_migrate(&self, round: usize) -> bool;

    /// Indices of the individuals that leave `population`.
    fn select_emigrants(
        &self,
        population: &Population<G>,
        count: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Vec<usize>;

    /// Merges `immigrants` into `population` without changing its size.
    fn integrate_immigrants(
        &self,
        population: &mut Population<G>,
        immigrants: Vec<Individual<G>>,
        rng: &mut RandomNumberGenerator,
    );
}

/// Emigrates the fittest individuals; immigrants replace the worst.
#[derive(Debug, Clone)]
pub struct BestMigration {
    interval: usize,
}

impl BestMigration {
    /// Migrates every `interval` rounds. An interval of 0 disables migration.
    pub fn new(interval: usize) -> Self {
        Self { interval }
    }
}

impl<G: Chromosome> MigrationPolicy<G> for BestMigration {
    fn should_migrate(&self, round: usize) -> bool {
        self.interval > 0 && round > 0 && round % self.interval == 0
    }

    fn select_emigrants(
        &self,
        population: &Population<G>,
        count: usize,
        _rng: &mut RandomNumberGenerator,
    ) -> Vec<usize> {
        population
            .stats()
            .ranked
            .iter()
            .rev()
            .copied()
            .filter(|&i| population.get(i).is_some_and(Individual::is_evaluated))
            .take(count)
            .collect()
    }

    fn integrate_immigrants(
        &self,
        population: &mut Population<G>,
        immigrants: Vec<Individual<G>>,
        _rng: &mut RandomNumberGenerator,
    ) {
        let worst: Vec<usize> = population.stats().ranked.clone();
        for (slot, immigrant) in worst.into_iter().zip(immigrants) {
            population.replace(slot, immigrant);
        }
        population.refresh_statistics();
    }
}

/// Emigrates random individuals; immigrants take random slots.
#[derive(Debug, Clone)]
pub struct RandomMigration {
    interval: usize,
}

impl RandomMigration {
    pub fn new(interval: usize) -> Self {
        Self { interval }
    }
}

impl<G: Chromosome> MigrationPolicy<G> for RandomMigration {
    fn should_migrate(&self, round: usize) -> bool {
        self.interval > 0 && round > 0 && round % self.interval == 0
    }

    fn select_emigrants(
        &self,
        population: &Population<G>,
        count: usize,
        rng: &mut RandomNumberGenerator,
    ) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..population.len()).collect();
        let count = count.min(indices.len());
        // Partial Fisher-Yates
        for i in 0..count {
            let j = i + rng.gen_index(indices.len() - i);
            indices.swap(i, j);
        }
        indices.truncate(count);
        indices
    }

    fn integrate_immigrants(
        &self,
        population: &mut Population<G>,
        immigrants: Vec<Individual<G>>,
        rng: &mut RandomNumberGenerator,
    ) {
        let slots = self.select_emigrants(population, immigrants.len(), rng);
        for (slot, immigrant) in slots.into_iter().zip(immigrants) {
            population.replace(slot, immigrant);
        }
        population.refresh_statistics();
    }
}

pub struct Island<G, E, S, B>
where
    G: Chromosome,
{
    id: usize,
    engine: EvolutionEngine<G, E, S, B>,
    connections: Vec<usize>,
    inbox: Receiver<Individual<G>>,
}

impl<G, E, S, B> Island<G, E, S, B>
where
    G: Chromosome,
    E: FitnessEvaluator<G>,
    S: SelectionStrategy<G>,
    B: BreedStrategy<G>,
{
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn engine(&self) -> &EvolutionEngine<G, E, S, B> {
        &self.engine
    }

    pub fn connections(&self) -> &[usize] {
        &self.connections
    }
}

/// Result of [`IslandCoordinator::run`].
#[derive(Debug, Clone)]
pub struct IslandResult<G> {
    /// Best individual over all islands.
    pub best: Option<Individual<G>>,
    pub islands: Vec<EvolutionResult<G>>,
    pub rounds: usize,
}

/// Runs a set of engines as islands with periodic migration.
pub struct IslandCoordinator<G, E, S, B, M>
where
    G: Chromosome,
{
    islands: Vec<Island<G, E, S, B>>,
    outboxes: Vec<Sender<Individual<G>>>,
    policy: M,
    migrants: usize,
    seed: u64,
    round: usize,
}

impl<G, E, S, B, M> IslandCoordinator<G, E, S, B, M>
where
    G: Chromosome,
    E: FitnessEvaluator<G>,
    S: SelectionStrategy<G>,
    B: BreedStrategy<G>,
    M: MigrationPolicy<G>,
{
    /// Wires `engines` into islands along `topology`. `migrants` individuals leave
    /// every island per migration, split across its connections.
    pub fn new(
        engines: Vec<EvolutionEngine<G, E, S, B>>,
        topology: Topology,
        policy: M,
        migrants: usize,
        seed: u64,
    ) -> Result<Self> {
        if engines.is_empty() {
            return Err(GeneticError::Configuration(
                "Island model needs at least one island".to_string(),
            ));
        }
        let count = engines.len();
        let mut outboxes = Vec::with_capacity(count);
        let islands = engines
            .into_iter()
            .enumerate()
            .map(|(id, engine)| {
                let (tx, rx) = unbounded();
                outboxes.push(tx);
                Island {
                    id,
                    engine,
                    connections: topology.targets(id, count),
                    inbox: rx,
                }
            })
            .collect();

        Ok(Self {
            islands,
            outboxes,
            policy,
            migrants,
            seed,
            round: 0,
        })
    }

    pub fn islands(&self) -> &[Island<G, E, S, B>] {
        &self.islands
    }

    /// Completed rounds.
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn is_finished(&self) -> bool {
        self.islands.iter().all(|island| island.engine.is_terminated())
    }

    pub fn best(&self) -> Option<&Individual<G>> {
        self.islands
            .iter()
            .filter_map(|island| island.engine.best())
            .max_by(|a, b| {
                a.fitness()
                    .unwrap_or(f64::NEG_INFINITY)
                    .total_cmp(&b.fitness().unwrap_or(f64::NEG_INFINITY))
            })
    }

    /// Advances every live island by one generation, then migrates if due.
    pub fn run_round(&mut self) -> Result<()> {
        self.islands
            .par_iter_mut()
            .filter(|island| !island.engine.is_terminated())
            .map(|island| island.engine.step().map(|_| ()))
            .collect::<Result<Vec<()>>>()?;
        self.round += 1;

        if self.policy.should_migrate(self.round) {
            self.migrate()?;
        }
        Ok(())
    }

    pub fn run(&mut self) -> Result<IslandResult<G>> {
        while !self.is_finished() {
            self.run_round()?;
        }
        info!(
            "Island model finished after {} rounds, best fitness {:?}",
            self.round,
            self.best().and_then(Individual::fitness)
        );

        let mut islands = Vec::with_capacity(self.islands.len());
        for island in &mut self.islands {
            let reason = match island.engine.step()? {
                Some(reason) => reason,
                None => TerminationReason::Cancelled,
            };
            islands.push(EvolutionResult {
                best: island.engine.best().cloned(),
                reason,
                generation: island.engine.history().last().map_or(0, |r| r.generation),
                history: island.engine.history().to_vec(),
            });
        }
        Ok(IslandResult {
            best: self.best().cloned(),
            islands,
            rounds: self.round,
        })
    }

    fn migrate(&mut self) -> Result<()> {
        let mut rng = RandomNumberGenerator::derived(self.seed, self.round as u64);
        let live: Vec<bool> = self
            .islands
            .iter()
            .map(|island| !island.engine.is_terminated())
            .collect();

        for island in &mut self.islands {
            if !live[island.id] {
                continue;
            }
            let targets: Vec<usize> = island
                .connections
                .iter()
                .copied()
                .filter(|&t| live[t])
                .collect();
            if targets.is_empty() {
                continue;
            }

            let indices =
                self.policy
                    .select_emigrants(island.engine.population(), self.migrants, &mut rng);
            let emigrants = island.engine.emigrate(&indices, &mut rng)?;
            debug!(
                "Island {} sends {} emigrants to {:?}",
                island.id,
                emigrants.len(),
                targets
            );
            for (k, emigrant) in emigrants.into_iter().enumerate() {
                let target = targets[k % targets.len()];
                // Receivers live as long as the coordinator.
                let _ = self.outboxes[target].send(emigrant.carried_over(Origin::Immigrant));
            }
        }

        for island in &mut self.islands {
            let immigrants: Vec<Individual<G>> = island.inbox.try_iter().collect();
            if immigrants.is_empty() {
                continue;
            }
            self.policy
                .integrate_immigrants(island.engine.population_mut(), immigrants, &mut rng);
        }
        Ok(())
    }
}
