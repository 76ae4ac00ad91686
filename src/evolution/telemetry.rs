//! # Telemetry
//!
//! The engine reports one [`GenerationRecord`] per generation to an optional
//! [`TelemetrySink`]. Sinks must return quickly: they run on the evolution loop.
//! [`ChannelSink`] hands records to another thread through a bounded channel and
//! drops the oldest queued record when the consumer falls behind, so a slow
//! consumer never stalls evolution.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Statistics of one evaluated generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: usize,
    #[serde(with = "crate::checkpoint::float_repr")]
    pub best_fitness: f64,
    #[serde(with = "crate::checkpoint::float_repr")]
    pub average_fitness: f64,
    pub diversity: f64,
    #[serde(with = "crate::checkpoint::float_repr")]
    pub fitness_std: f64,
    /// Mutation rate used to breed the next generation.
    pub mutation_rate: f64,
    pub failed_evaluations: usize,
    /// Wall-clock time of the generation.
    pub elapsed: Duration,
}

/// Receives generation records.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: &GenerationRecord);
}

impl<F> TelemetrySink for F
where
    F: Fn(&GenerationRecord) + Send + Sync,
{
    fn record(&self, record: &GenerationRecord) {
        self(record)
    }
}

/// A sink that forwards records over a bounded channel, dropping the oldest
/// queued record on overflow.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<GenerationRecord>,
    // Held so the sink can evict the oldest record itself.
    rx: Receiver<GenerationRecord>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    /// Creates a sink with room for `capacity` records and the receiving end.
    pub fn bounded(capacity: usize) -> (Self, Receiver<GenerationRecord>) {
        let (tx, rx) = bounded(capacity.max(1));
        let sink = Self {
            tx,
            rx: rx.clone(),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    /// Number of records evicted because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl TelemetrySink for ChannelSink {
    fn record(&self, record: &GenerationRecord) {
        let mut pending = record.clone();
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if self.rx.try_recv().is_ok() {
                        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            "Telemetry channel full, dropped oldest record ({} dropped so far)",
                            dropped
                        );
                    }
                    pending = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn record(generation: usize) -> GenerationRecord {
        GenerationRecord {
            generation,
            best_fitness: generation as f64,
            average_fitness: 0.0,
            diversity: 0.5,
            fitness_std: 0.0,
            mutation_rate: 0.01,
            failed_evaluations: 0,
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_channel_sink_drops_oldest() {
        let (sink, rx) = ChannelSink::bounded(2);
        for g in 0..5 {
            sink.record(&record(g));
        }
        assert_eq!(sink.dropped(), 3);
        let received: Vec<usize> = rx.try_iter().map(|r| r.generation).collect();
        assert_eq!(received, vec![3, 4]);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let sink = move |r: &GenerationRecord| log.lock().unwrap().push(r.generation);
        sink.record(&record(1));
        sink.record(&record(2));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_record_serializes() {
        let json = serde_json::to_string(&record(3)).unwrap();
        let back: GenerationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record(3));
    }
}
