//! # Error Types
//!
//! This module defines the error types of the optimization engine. Errors are split
//! by how far they are allowed to travel:
//!
//! - [`FitnessError`] belongs to a single individual. It is recorded, the individual
//!   receives the configured failure fitness and the generation carries on.
//! - [`ApplicationError`] is raised when a genome cannot be applied to a live system.
//!   It is folded into a [`FitnessError`].
//! - [`CheckpointError`] is raised while persisting or restoring engine state. It never
//!   touches the in-memory engine.
//! - [`GeneticError`] is the engine-level error. Contract violations such as
//!   [`GeneticError::ShapeMismatch`] and [`GeneticError::InvalidRate`] abort the run,
//!   invalid options are rejected as [`GeneticError::Configuration`] when the engine
//!   is built.
//!
//! ## Examples
//!
//! Using the `Result` type:
//!
//! ```rust
//! use genopt::error::{GeneticError, Result};
//!
//! fn some_function() -> Result<()> {
//!     Ok(())
//! }
//!
//! match some_function() {
//!     Ok(_) => println!("Success!"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```
//!
//! Contract violations carry enough detail to locate the caller's mistake:
//!
//! ```rust
//! use genopt::error::GeneticError;
//!
//! let err = GeneticError::ShapeMismatch { expected: 32, actual: 31 };
//! assert_eq!(err.to_string(), "Shape mismatch: expected 32, got 31");
//! ```

use thiserror::Error;

/// Represents engine-level errors.
#[derive(Error, Debug)]
pub enum GeneticError {
    /// Error that occurs when a breeding operation fails.
    #[error("Breeding error: {0}")]
    Breeding(String),

    /// Error that occurs when an invalid configuration is provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error that occurs when an empty population is encountered.
    #[error("Empty population error: Cannot operate on an empty population")]
    EmptyPopulation,

    /// Two genomes of incompatible shape were combined.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A mutation rate outside `[0, 1]` was requested.
    #[error("Invalid mutation rate {0}: must lie in [0, 1]")]
    InvalidRate(f64),

    /// The evaluator could not produce a result for the generation at all.
    #[error("Evaluator error: {0}")]
    Evaluator(String),

    /// Error that occurs when a maximum number of attempts is reached.
    #[error("Maximum attempts reached: {0}")]
    MaxAttemptsReached(String),

    /// Error that occurs while saving or restoring a checkpoint.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// An operating system resource, such as a worker thread, could not be acquired.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single fitness evaluation.
///
/// These never abort a generation: the individual is scored with the configured
/// failure fitness and the error is reported alongside the scores.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitnessError {
    /// The fitness function reported a failure.
    #[error("Fitness evaluation failed: {0}")]
    Evaluation(String),

    /// The fitness function returned NaN or an infinity.
    #[error("Non-finite fitness score: {0}")]
    NonFinite(f64),

    /// The fitness function panicked.
    #[error("Fitness function panicked: {0}")]
    Panicked(String),

    /// The genome could not be applied to the system under measurement.
    #[error(transparent)]
    Application(#[from] ApplicationError),

    /// A remote evaluation exceeded its deadline on every attempt.
    #[error("Evaluation task {task_id} timed out after {attempts} attempts")]
    Timeout { task_id: u64, attempts: u32 },

    /// No worker was able to accept the task.
    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),
}

/// Failure to apply a genome to an externally observable system.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to apply genome: {0}")]
pub struct ApplicationError(pub String);

impl ApplicationError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self(message.into())
    }
}

/// Errors raised while persisting or restoring engine state.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Version mismatch: expected at most {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    #[error("No checkpoint path configured")]
    MissingPath,
}

/// A specialized Result type for genetic algorithm operations.
///
/// This type is a convenience wrapper around `std::result::Result` with the error type
/// fixed to `GeneticError`.
pub type Result<T> = std::result::Result<T, GeneticError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_error_converts_into_fitness_error() {
        let err: FitnessError = ApplicationError::new("sysctl rejected value").into();
        assert!(matches!(err, FitnessError::Application(_)));
        assert!(err.to_string().contains("sysctl rejected value"));
    }

    #[test]
    fn test_checkpoint_error_converts_into_genetic_error() {
        let err: GeneticError = CheckpointError::MissingPath.into();
        assert!(matches!(err, GeneticError::Checkpoint(CheckpointError::MissingPath)));
    }

    #[test]
    fn test_io_error_converts_into_genetic_error() {
        fn spawn_failure() -> Result<()> {
            Err(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "thread limit reached",
            ))?;
            Ok(())
        }
        let err = spawn_failure().unwrap_err();
        assert!(matches!(err, GeneticError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: thread limit reached");
    }
}
