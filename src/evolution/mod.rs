pub mod builder;
pub mod caching_challenge;
pub mod challenge;
pub mod engine;
pub mod options;
pub mod telemetry;

pub use builder::EvolutionEngineBuilder;
pub use caching_challenge::CachingChallenge;
pub use challenge::{AppliedChallenge, Challenge, SystemApplicator};
pub use engine::{
    CancellationToken, EngineState, EvolutionEngine, EvolutionResult, TerminationReason,
};
pub use options::{EvolutionOptions, LogLevel};
pub use telemetry::{ChannelSink, GenerationRecord, TelemetrySink};

pub use crate::caching::CacheType;
