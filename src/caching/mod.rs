//! # Caching Module
//!
//! Bounded fitness caches keyed by a structural hash of the genome. Caching is
//! useful for expensive fitness functions, since elites and converged populations
//! present the same genomes again and again.
//!
//! A cache is an optimisation only: a miss or an eviction just re-runs the fitness
//! function. Failed evaluations are never cached.
//!
//! - [`ShardedFitnessCache`]: one LRU map per shard behind its own mutex, shared by
//!   all threads. A key always maps to the same shard, so unrelated evaluations
//!   rarely contend.
//! - [`ThreadLocalFitnessCache`]: one LRU map per thread, no locking, no sharing.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use thread_local::ThreadLocal;

use crate::error::FitnessError;
use crate::evolution::Challenge;

const DEFAULT_SHARDS: usize = 16;

/// The cache implementation used by a [`CachedChallenge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheType {
    /// A single cache shared by all threads, split into independently locked shards.
    Sharded,
    /// A separate cache per thread.
    ThreadLocal,
}

/// Hit and miss counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// A bounded map from genome hash to fitness, safe to use from many threads.
pub trait FitnessCache: Debug + Send + Sync {
    fn get(&self, key: u64) -> Option<f64>;
    fn insert(&self, key: u64, fitness: f64);
    /// Number of entries visible to the calling thread.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&self);
    fn stats(&self) -> CacheStats;
}

/// Structural hash used as cache key.
pub fn genome_hash<G: Hash>(genome: &G) -> u64 {
    let mut hasher = DefaultHasher::new();
    genome.hash(&mut hasher);
    hasher.finish()
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// A shared LRU cache split into shards.
#[derive(Debug)]
pub struct ShardedFitnessCache {
    shards: Vec<Mutex<LruCache<u64, f64>>>,
    counters: Counters,
}

impl ShardedFitnessCache {
    /// Creates a cache holding about `capacity` entries in the default number of shards.
    pub fn new(capacity: usize) -> Self {
        Self::with_shards(capacity, DEFAULT_SHARDS)
    }

    pub fn with_shards(capacity: usize, shards: usize) -> Self {
        let shards = shards.clamp(1, capacity.max(1));
        let per_shard = non_zero(capacity.div_ceil(shards));
        Self {
            shards: (0..shards)
                .map(|_| Mutex::new(LruCache::new(per_shard)))
                .collect(),
            counters: Counters::default(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, key: u64) -> MutexGuard<'_, LruCache<u64, f64>> {
        let shard = &self.shards[(key % self.shards.len() as u64) as usize];
        // Entries are plain numbers, so a poisoned shard is still consistent.
        shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FitnessCache for ShardedFitnessCache {
    fn get(&self, key: u64) -> Option<f64> {
        let value = self.shard(key).get(&key).copied();
        self.counters.record(value.is_some());
        value
    }

    fn insert(&self, key: u64, fitness: f64) {
        self.shard(key).put(key, fitness);
    }

    fn len(&self) -> usize {
        (0..self.shards.len() as u64).map(|i| self.shard(i).len()).sum()
    }

    fn clear(&self) {
        for i in 0..self.shards.len() as u64 {
            self.shard(i).clear();
        }
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

/// A per-thread LRU cache.
///
/// Each thread sees only the entries it inserted itself. `len` and `clear` act on
/// the calling thread's cache.
#[derive(Debug)]
pub struct ThreadLocalFitnessCache {
    cache: ThreadLocal<RefCell<LruCache<u64, f64>>>,
    capacity: NonZeroUsize,
    counters: Counters,
}

impl ThreadLocalFitnessCache {
    /// `capacity` is the bound of each thread's cache.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: ThreadLocal::new(),
            capacity: non_zero(capacity),
            counters: Counters::default(),
        }
    }

    fn local(&self) -> &RefCell<LruCache<u64, f64>> {
        self.cache.get_or(|| RefCell::new(LruCache::new(self.capacity)))
    }
}

impl FitnessCache for ThreadLocalFitnessCache {
    fn get(&self, key: u64) -> Option<f64> {
        let value = self
            .local()
            .try_borrow_mut()
            .ok()
            .and_then(|mut cache| cache.get(&key).copied());
        self.counters.record(value.is_some());
        value
    }

    fn insert(&self, key: u64, fitness: f64) {
        if let Ok(mut cache) = self.local().try_borrow_mut() {
            cache.put(key, fitness);
        }
    }

    fn len(&self) -> usize {
        self.cache
            .get()
            .and_then(|cell| cell.try_borrow().ok())
            .map_or(0, |cache| cache.len())
    }

    fn clear(&self) {
        if let Some(cell) = self.cache.get() {
            if let Ok(mut cache) = cell.try_borrow_mut() {
                cache.clear();
            }
        }
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

/// A wrapper around a challenge that caches successful fitness evaluations.
///
/// Keys are the structural hash of the genome, never its address, so equal genomes
/// in different individuals share an entry.
#[derive(Debug, Clone)]
pub struct CachedChallenge<G, C> {
    challenge: C,
    cache: Arc<dyn FitnessCache>,
    _marker: PhantomData<fn(&G)>,
}

impl<G, C> CachedChallenge<G, C>
where
    G: Hash,
    C: Challenge<G>,
{
    pub fn new(challenge: C, cache_type: CacheType, capacity: usize) -> Self {
        let cache: Arc<dyn FitnessCache> = match cache_type {
            CacheType::Sharded => Arc::new(ShardedFitnessCache::new(capacity)),
            CacheType::ThreadLocal => Arc::new(ThreadLocalFitnessCache::new(capacity)),
        };
        Self::with_cache(challenge, cache)
    }

    /// Wraps `challenge` with an existing, possibly shared, cache.
    pub fn with_cache(challenge: C, cache: Arc<dyn FitnessCache>) -> Self {
        Self {
            challenge,
            cache,
            _marker: PhantomData,
        }
    }

    pub fn inner(&self) -> &C {
        &self.challenge
    }

    pub fn cache(&self) -> &Arc<dyn FitnessCache> {
        &self.cache
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl<G, C> Challenge<G> for CachedChallenge<G, C>
where
    G: Hash,
    C: Challenge<G>,
{
    fn score(&self, genome: &G) -> Result<f64, FitnessError> {
        let key = genome_hash(genome);
        if let Some(fitness) = self.cache.get(key) {
            return Ok(fitness);
        }

        let fitness = self.challenge.score(genome)?;
        if fitness.is_finite() {
            self.cache.insert(key, fitness);
        }
        Ok(fitness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_sharded_lru_eviction() {
        let cache = ShardedFitnessCache::with_shards(2, 1);
        cache.insert(1, 1.0);
        cache.insert(2, 2.0);
        assert_eq!(cache.get(1), Some(1.0));
        cache.insert(3, 3.0);
        // 2 was least recently used.
        assert_eq!(cache.get(2), None);
        assert_eq!(cache.get(1), Some(1.0));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1 });
    }

    #[test]
    fn test_sharded_capacity_is_bounded() {
        let cache = ShardedFitnessCache::with_shards(64, 8);
        for key in 0..10_000u64 {
            cache.insert(key, key as f64);
        }
        assert!(cache.len() <= 64);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_thread_local_cache_is_per_thread() {
        let cache = Arc::new(ThreadLocalFitnessCache::new(8));
        cache.insert(7, 7.0);
        assert_eq!(cache.get(7), Some(7.0));

        let other = cache.clone();
        std::thread::spawn(move || {
            assert_eq!(other.get(7), None);
            assert!(other.is_empty());
        })
        .join()
        .unwrap();

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cached_challenge_skips_repeated_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let challenge = CachedChallenge::new(
            move |x: &Vec<u8>| -> Result<f64, FitnessError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(x.iter().map(|&b| b as f64).sum())
            },
            CacheType::Sharded,
            100,
        );

        let genome = vec![1, 2, 3];
        assert_eq!(challenge.score(&genome), Ok(6.0));
        assert_eq!(challenge.score(&genome.clone()), Ok(6.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(challenge.cache_stats().hits, 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let challenge = CachedChallenge::new(
            move |_: &u8| -> Result<f64, FitnessError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(FitnessError::Evaluation("flaky".to_string()))
            },
            CacheType::ThreadLocal,
            10,
        );
        assert!(challenge.score(&1).is_err());
        assert!(challenge.score(&1).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(challenge.cache_size(), 0);
    }
}
