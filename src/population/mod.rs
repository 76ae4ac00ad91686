//! # Population
//!
//! Individuals, the per-generation population with its derived statistics, and the
//! manager that creates and replaces populations.

pub mod individual;
#[allow(clippy::module_inception)]
pub mod population;
pub mod manager;

pub use individual::{Individual, IndividualMetadata, Origin};
pub use manager::PopulationManager;
pub use population::{Population, PopulationStats};
