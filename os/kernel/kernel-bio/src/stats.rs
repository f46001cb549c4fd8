//! Cache statistics for monitoring and debugging.

use core::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by [`BufferCache`](crate::BufferCache).
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered by a resident buffer.
    hits: AtomicU64,
    /// Lookups that had to claim a buffer.
    misses: AtomicU64,
    /// Claims that recycled a buffer previously holding another block.
    evictions: AtomicU64,
}

impl CacheStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Hits per lookup in percent, 0 before the first lookup.
    pub fn hit_percent(&self) -> u64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 { 0 } else { hits * 100 / total }
    }
}
