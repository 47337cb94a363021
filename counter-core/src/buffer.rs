//! # Write-Coalescing Buffer
//!
//! Pending per-page deltas, merged additively and drained atomically
//! either in bulk (periodic flush) or one key at a time (read-through
//! miss). Never held across a backend call — drain first, release the
//! lock, then do I/O.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use counter_common::{Count, PageId};

struct Inner {
    pending: HashMap<PageId, Count>,
    last_flush_at: Instant,
}

pub struct WriteBuffer {
    inner: Mutex<Inner>,
}

impl WriteBuffer {
    pub fn new() -> Self {
        WriteBuffer {
            inner: Mutex::new(Inner {
                pending: HashMap::new(),
                last_flush_at: Instant::now(),
            }),
        }
    }

    /// Merges `delta` into the pending amount for `page`.
    pub fn add(&self, page: PageId, delta: Count) {
        let mut inner = self.inner.lock();
        *inner.pending.entry(page).or_insert(0) += delta;
    }

    /// Atomically takes the entire buffer, leaving it empty, and marks
    /// this instant as the last flush time.
    pub fn drain_all(&self) -> HashMap<PageId, Count> {
        let mut inner = self.inner.lock();
        inner.last_flush_at = Instant::now();
        std::mem::take(&mut inner.pending)
    }

    /// Atomically removes and returns the pending delta for `page`, or 0
    /// if there was none buffered.
    pub fn drain_one(&self, page: &PageId) -> Count {
        let mut inner = self.inner.lock();
        inner.pending.remove(page).unwrap_or(0)
    }

    /// Re-adds a previously drained delta, e.g. after a failed flush.
    pub fn rebuffer(&self, page: PageId, delta: Count) {
        self.add(page, delta);
    }

    pub fn size(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn contents(&self) -> HashMap<PageId, Count> {
        self.inner.lock().pending.clone()
    }

    pub fn age_since_last_flush(&self) -> Duration {
        let inner = self.inner.lock();
        Instant::now().saturating_duration_since(inner.last_flush_at)
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}
