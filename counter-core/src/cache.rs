//! # Local Read Cache
//!
//! In-process `PageId -> CacheEntry` map with a short freshness window.
//! A single mutex guards the whole map: entries are small and the
//! critical section is hash-map-op-sized, so sharding the lock would
//! only add complexity without a measurable win here (unlike the
//! byte-accounted, sharded-lock engine this pattern is adapted from).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use counter_common::{Count, PageId};

/// A single cached count, stamped with the instant it was written.
#[derive(Debug, Clone, Copy)]
pub struct CacheEntry {
    pub count: Count,
    pub stamped_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.stamped_at) <= ttl
    }
}

/// Short-TTL local cache serving most reads without backend contact.
pub struct LocalCache {
    ttl: Duration,
    entries: Mutex<HashMap<PageId, CacheEntry>>,
}

impl LocalCache {
    pub fn new(ttl: Duration) -> Self {
        LocalCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the entry for `page` along with whether it is still fresh.
    pub fn get(&self, page: &PageId) -> Option<(CacheEntry, bool)> {
        let now = Instant::now();
        let entries = self.entries.lock();
        entries
            .get(page)
            .map(|entry| (*entry, entry.is_fresh(self.ttl, now)))
    }

    /// Overwrites the cached count for `page`, re-stamping freshness.
    pub fn put_count(&self, page: PageId, count: Count) {
        let mut entries = self.entries.lock();
        entries.insert(
            page,
            CacheEntry {
                count,
                stamped_at: Instant::now(),
            },
        );
    }

    /// Adds `delta` to the cached count for `page` (0 if absent),
    /// re-stamping freshness. Used on writes for read-after-write.
    pub fn bump_by(&self, page: PageId, delta: Count) {
        let mut entries = self.entries.lock();
        let existing = entries.get(&page).map(|e| e.count).unwrap_or(0);
        entries.insert(
            page,
            CacheEntry {
                count: existing + delta,
                stamped_at: Instant::now(),
            },
        );
    }
}
