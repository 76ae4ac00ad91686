use std::hash::Hash;

use crate::{
    caching::{CacheType, CachedChallenge},
    evolution::Challenge,
};

/// Trait for wrapping a challenge with caching functionality.
///
/// Implemented for every challenge over a hashable genome.
///
/// # Example
///
/// ```
/// use genopt::error::FitnessError;
/// use genopt::evolution::caching_challenge::CachingChallenge;
/// use genopt::evolution::Challenge;
/// use genopt::genome::BitVector;
///
/// let one_max = |g: &BitVector| -> Result<f64, FitnessError> { Ok(g.count_ones() as f64) };
/// let cached = one_max.with_sharded_cache(1024);
///
/// let genome = BitVector::new(vec![true, true, false]);
/// assert_eq!(cached.score(&genome), Ok(2.0));
/// assert_eq!(cached.score(&genome), Ok(2.0));
/// assert_eq!(cached.cache_stats().hits, 1);
/// ```
pub trait CachingChallenge<G: Hash>: Challenge<G> + Sized {
    /// Wraps this challenge with a cache shared by all threads.
    fn with_sharded_cache(self, capacity: usize) -> CachedChallenge<G, Self> {
        self.with_cache(CacheType::Sharded, capacity)
    }

    /// Wraps this challenge with a separate cache per evaluation thread.
    fn with_thread_local_cache(self, capacity: usize) -> CachedChallenge<G, Self> {
        self.with_cache(CacheType::ThreadLocal, capacity)
    }

    /// Wraps this challenge with a cache of the given type.
    fn with_cache(self, cache_type: CacheType, capacity: usize) -> CachedChallenge<G, Self> {
        CachedChallenge::new(self, cache_type, capacity)
    }
}

impl<G, C> CachingChallenge<G> for C
where
    G: Hash,
    C: Challenge<G>,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitnessError;

    #[test]
    fn test_wrappers_select_cache_type() {
        let sum = |x: &Vec<u32>| -> Result<f64, FitnessError> { Ok(x.iter().sum::<u32>() as f64) };
        let sharded = sum.with_sharded_cache(4);
        let local = sum.with_thread_local_cache(4);

        for challenge in [&sharded, &local] {
            assert_eq!(challenge.score(&vec![1, 2]), Ok(3.0));
            assert_eq!(challenge.score(&vec![1, 2]), Ok(3.0));
            assert_eq!(challenge.cache_stats().hits, 1);
        }
    }
}
