//! Kernel cache implementation
//!
//! Provides an LRU cache of kernel matrix rows. The SMO solver touches two
//! full rows per iteration (to update the gradient), so rows rather than
//! single entries are the unit of caching.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// A single cached row of the kernel matrix, K(x_i, x_t) for every t
pub type KernelRow = Arc<Vec<f64>>;

/// LRU cache for kernel matrix rows
pub struct KernelCache {
    cache: LruCache<usize, KernelRow>,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a new kernel cache holding at most `capacity` rows
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Create a kernel cache sized from a memory budget in bytes for rows
    /// of length `row_len`
    ///
    /// At least two rows are always kept, since every solver step needs a pair.
    pub fn with_memory_limit(memory_bytes: usize, row_len: usize) -> Self {
        let row_bytes = (row_len * std::mem::size_of::<f64>()).max(1);
        Self::new((memory_bytes / row_bytes).max(2))
    }

    /// Get a row from the cache, computing and inserting it on a miss
    pub fn get_or_compute<F>(&mut self, i: usize, compute: F) -> KernelRow
    where
        F: FnOnce() -> Vec<f64>,
    {
        if let Some(row) = self.cache.get(&i) {
            self.hits += 1;
            return Arc::clone(row);
        }
        self.misses += 1;
        let row = Arc::new(compute());
        self.cache.put(i, Arc::clone(&row));
        row
    }

    /// Get a row if it is cached
    pub fn get(&mut self, i: usize) -> Option<KernelRow> {
        if let Some(row) = self.cache.get(&i) {
            self.hits += 1;
            Some(Arc::clone(row))
        } else {
            self.misses += 1;
            None
        }
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.cache.cap().get(),
            size: self.cache.len(),
        }
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub size: usize,
}
