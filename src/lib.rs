pub mod adaptive;
pub mod caching;
pub mod checkpoint;
pub mod chromosome;
pub mod constraints;
pub mod error;
pub mod evaluation;
pub mod evolution;
pub mod genome;
pub mod island;
pub mod operators;
pub mod population;
pub mod rng;
pub mod selection;
pub mod strategy;

// Re-export commonly used types for convenience
pub use chromosome::Chromosome;
pub use error::{GeneticError, Result};
pub use evolution::{
    Challenge, EvolutionEngine, EvolutionEngineBuilder, EvolutionOptions, EvolutionResult,
    TerminationReason,
};
pub use population::Individual;
pub use selection::SelectionStrategy;
pub use strategy::BreedStrategy;
