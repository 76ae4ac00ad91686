//! # Adaptive mutation
//!
//! A proportional controller that moves the mutation rate towards the value that
//! keeps population diversity at a target:
//!
//! `rate' = clamp(rate + gain * (target_diversity - observed_diversity), min_rate, max_rate)`
//!
//! Low diversity raises the rate, high diversity lowers it. The only state is the
//! current rate.

use serde::{Deserialize, Serialize};

use crate::error::{GeneticError, Result};
use crate::evolution::options::EvolutionOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveMutationController {
    rate: f64,
    gain: f64,
    target_diversity: f64,
    min_rate: f64,
    max_rate: f64,
}

impl AdaptiveMutationController {
    pub fn new(
        initial_rate: f64,
        gain: f64,
        target_diversity: f64,
        min_rate: f64,
        max_rate: f64,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&min_rate)
            || !(0.0..=1.0).contains(&max_rate)
            || min_rate > max_rate
        {
            return Err(GeneticError::Configuration(format!(
                "Invalid mutation rate bounds [{}, {}]",
                min_rate, max_rate
            )));
        }
        if !gain.is_finite() || !target_diversity.is_finite() {
            return Err(GeneticError::Configuration(
                "Adaptation gain and target diversity must be finite".to_string(),
            ));
        }
        Ok(Self {
            rate: initial_rate.clamp(min_rate, max_rate),
            gain,
            target_diversity,
            min_rate,
            max_rate,
        })
    }

    /// Builds the controller for a run. Without adaptive mutation the rate stays
    /// pinned at the initial rate.
    pub fn from_options(options: &EvolutionOptions) -> Result<Self> {
        let initial = options.get_initial_mutation_rate();
        if !options.get_adaptive_mutation() {
            return Self::new(initial, 0.0, options.get_target_diversity(), initial, initial);
        }
        Self::new(
            initial,
            options.get_adaptation_gain(),
            options.get_target_diversity(),
            options.get_min_mutation_rate(),
            options.get_max_mutation_rate(),
        )
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Restores a rate saved in a checkpoint, clamped into the configured bounds.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate.clamp(self.min_rate, self.max_rate);
    }

    /// Applies one controller step for the diversity observed this generation and
    /// returns the new rate. A non-finite observation leaves the rate unchanged.
    pub fn update(&mut self, observed_diversity: f64) -> f64 {
        if observed_diversity.is_finite() {
            let adjusted = self.rate + self.gain * (self.target_diversity - observed_diversity);
            self.rate = adjusted.clamp(self.min_rate, self.max_rate);
        }
        self.rate
    }
}
