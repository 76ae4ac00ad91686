//! # Checkpoints
//!
//! An [`EvolutionCheckpoint`] is a self-contained snapshot of an engine between two
//! generations: the index of the next generation to run, the population, the best
//! individual found so far and the adaptive parameters. Restoring it resumes the
//! run at exactly that generation with the same random streams.
//!
//! [`CheckpointManager`] serialises checkpoints as JSON. Writing to a file goes
//! through a temporary sibling that is renamed into place, so a reader only ever
//! sees a complete checkpoint.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::CheckpointError;
use crate::evolution::telemetry::GenerationRecord;
use crate::population::Individual;

/// Format version written by this build. Older versions are accepted.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Engine parameters that evolve during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParameters {
    pub seed: u64,
    pub mutation_rate: f64,
    /// Consecutive generations without improvement.
    pub stagnation_counter: usize,
    #[serde(with = "float_repr::option")]
    pub best_fitness: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionCheckpoint<G> {
    pub version: u32,
    /// Index of the next generation to run.
    pub generation: usize,
    pub population: Vec<Individual<G>>,
    pub best: Option<Individual<G>>,
    pub params: EngineParameters,
    pub history: Vec<GenerationRecord>,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

impl<G> EvolutionCheckpoint<G> {
    pub fn new(
        generation: usize,
        population: Vec<Individual<G>>,
        best: Option<Individual<G>>,
        params: EngineParameters,
        history: Vec<GenerationRecord>,
    ) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            version: CHECKPOINT_VERSION,
            generation,
            population,
            best,
            params,
            history,
            timestamp,
        }
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Where and how often checkpoints are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointManager {
    path: Option<PathBuf>,
    interval: usize,
}

impl CheckpointManager {
    /// A manager without a file; `save` and `restore` still work on bytes.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Autosave every `interval` generations. 0 disables autosave.
    pub fn with_interval(mut self, interval: usize) -> Self {
        self.interval = interval;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    /// Whether a checkpoint is due once `completed` generations have run.
    pub fn is_due(&self, completed: usize) -> bool {
        self.path.is_some() && self.interval > 0 && completed > 0 && completed % self.interval == 0
    }

    /// Serialises the checkpoint. The bytes are complete or an error is returned.
    pub fn save<G: Serialize>(
        &self,
        checkpoint: &EvolutionCheckpoint<G>,
    ) -> Result<Vec<u8>, CheckpointError> {
        serde_json::to_vec(checkpoint).map_err(|e| CheckpointError::Serialization(e.to_string()))
    }

    pub fn restore<G: DeserializeOwned>(
        &self,
        bytes: &[u8],
    ) -> Result<EvolutionCheckpoint<G>, CheckpointError> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| CheckpointError::Deserialization(e.to_string()))?;
        if probe.version > CHECKPOINT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: CHECKPOINT_VERSION,
                found: probe.version,
            });
        }
        serde_json::from_slice(bytes).map_err(|e| CheckpointError::Deserialization(e.to_string()))
    }

    /// Writes the checkpoint to the configured path via a temporary file and a rename.
    pub fn save_to_file<G: Serialize>(
        &self,
        checkpoint: &EvolutionCheckpoint<G>,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self.path.as_ref().ok_or(CheckpointError::MissingPath)?;
        let bytes = self.save(checkpoint)?;

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let written = File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(&bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, path));

        if let Err(e) = written {
            error!("Failed to write checkpoint to {}: {}", path.display(), e);
            let _ = fs::remove_file(&tmp);
            return Err(CheckpointError::Io(e));
        }

        debug!(
            "Checkpoint of generation {} written to {}",
            checkpoint.generation,
            path.display()
        );
        Ok(path.clone())
    }

    /// Reads the checkpoint at the configured path.
    pub fn load<G: DeserializeOwned>(&self) -> Result<EvolutionCheckpoint<G>, CheckpointError> {
        let path = self.path.as_ref().ok_or(CheckpointError::MissingPath)?;
        self.load_from(path)
    }

    pub fn load_from<G: DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<EvolutionCheckpoint<G>, CheckpointError> {
        if !path.exists() {
            return Err(CheckpointError::NotFound(path.display().to_string()));
        }
        let bytes = fs::read(path)?;
        self.restore(&bytes)
    }
}

/// Serde representation of `f64` that survives JSON for infinities and NaN,
/// which may appear as failure fitness.
pub(crate) mod float_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Special(String),
    }

    fn to_repr(value: f64) -> Repr {
        if value.is_finite() {
            Repr::Number(value)
        } else if value.is_nan() {
            Repr::Special("NaN".to_string())
        } else if value > 0.0 {
            Repr::Special("inf".to_string())
        } else {
            Repr::Special("-inf".to_string())
        }
    }

    fn from_repr<E: Error>(repr: Repr) -> Result<f64, E> {
        match repr {
            Repr::Number(value) => Ok(value),
            Repr::Special(s) => match s.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(E::custom(format!("invalid float {:?}", other))),
            },
        }
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        to_repr(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        from_repr(Repr::deserialize(deserializer)?)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<f64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.map(to_repr).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<f64>, D::Error> {
            Option::<Repr>::deserialize(deserializer)?
                .map(from_repr)
                .transpose()
        }
    }
}
