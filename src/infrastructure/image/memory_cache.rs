//! In-memory LRU image cache bounded by decoded size.

use lru::LruCache;
use tracing::{debug, trace};

use crate::domain::entities::{Image, ImageKey, decoded_size};

/// Default memory budget for decoded images (64 MiB).
pub const DEFAULT_MEMORY_BUDGET: usize = 64 * 1024 * 1024;

/// LRU cache of decoded images with a byte budget.
///
/// Cost of an entry is its decoded pixel buffer size. Inserting evicts the
/// least recently used entries until the total fits the budget; an image
/// larger than the whole budget is not cached. Not internally synchronized:
/// the loader keeps it behind its state lock.
pub struct MemoryImageCache {
    entries: LruCache<ImageKey, Image>,
    budget: usize,
    total_cost: usize,
    hits: u64,
    misses: u64,
}

impl MemoryImageCache {
    /// Creates a cache holding at most `budget` decoded bytes.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            budget,
            total_cost: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up an image and marks it most recently used.
    pub fn get(&mut self, key: &ImageKey) -> Option<Image> {
        if let Some(img) = self.entries.get(key) {
            self.hits += 1;
            trace!(key = %key, "Memory cache hit");
            Some(img.clone())
        } else {
            self.misses += 1;
            trace!(key = %key, "Memory cache miss");
            None
        }
    }

    /// Looks up an image without touching recency or counters.
    #[must_use]
    pub fn peek(&self, key: &ImageKey) -> Option<Image> {
        self.entries.peek(key).cloned()
    }

    /// Returns true if `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &ImageKey) -> bool {
        self.entries.contains(key)
    }

    /// Stores an image, evicting older entries to stay within budget.
    pub fn put(&mut self, key: ImageKey, image: Image) {
        let cost = decoded_size(&image);
        if cost > self.budget {
            debug!(key = %key, cost, budget = self.budget, "Image exceeds memory budget, not cached");
            self.remove(&key);
            return;
        }

        if let Some(old) = self.entries.put(key, image) {
            self.total_cost -= decoded_size(&old);
        }
        self.total_cost += cost;

        while self.total_cost > self.budget {
            let Some((evicted, img)) = self.entries.pop_lru() else {
                break;
            };
            self.total_cost -= decoded_size(&img);
            debug!(key = %evicted, "Evicted image from memory cache");
        }
    }

    /// Removes an image from the cache.
    pub fn remove(&mut self, key: &ImageKey) -> Option<Image> {
        let img = self.entries.pop(key)?;
        self.total_cost -= decoded_size(&img);
        Some(img)
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_cost = 0;
        debug!("Cleared memory image cache");
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total decoded bytes currently held.
    #[must_use]
    pub const fn total_cost(&self) -> usize {
        self.total_cost
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total > 0 {
            (self.hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            size: self.len(),
            bytes: self.total_cost,
        }
    }
}

impl Default for MemoryImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_BUDGET)
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Decoded bytes currently held.
    pub bytes: usize,
}

impl std::fmt::Display for CacheStats {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images ({:.1} MiB), {:.1}% hit rate ({} hits, {} misses)",
            self.size,
            self.bytes as f64 / (1024.0 * 1024.0),
            self.hit_rate,
            self.hits,
            self.misses
        )
    }
}
