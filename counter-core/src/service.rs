//! # Counter Service
//!
//! Orchestrates [`WriteBuffer`], [`LocalCache`], and a [`ShardRouter`] to
//! implement the public counting operations, plus the background flusher
//! that periodically drains the buffer to the backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use counter_common::{Count, CounterError, CounterResult, PageId};

use crate::backend::ShardRouter;
use crate::buffer::WriteBuffer;
use crate::cache::LocalCache;

/// `served_via` tag for a count returned straight from the local cache.
pub const SERVED_VIA_IN_MEMORY: &str = "in_memory";

/// Outcome of a `get` call: the count and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRead {
    pub count: Count,
    pub served_via: String,
}

/// Observability snapshot of the pending write buffer.
#[derive(Debug, Clone)]
pub struct BufferStatus {
    pub size: usize,
    pub contents: HashMap<PageId, Count>,
    pub age_since_last_flush: Duration,
}

/// Result of a full buffer flush: pages that failed, if any.
#[derive(Debug, Clone, Default)]
pub struct FlushOutcome {
    pub flushed: usize,
    pub failed: Vec<String>,
}

const FLUSHER_NOT_STARTED: u8 = 0;
const FLUSHER_RUNNING: u8 = 1;
const FLUSHER_STOPPED: u8 = 2;

/// Public counting engine: buffer + cache + shard router, and the one
/// background flusher task this process runs.
pub struct CounterService {
    router: Arc<dyn ShardRouter>,
    buffer: Arc<WriteBuffer>,
    cache: Arc<LocalCache>,
    flush_interval: Duration,
    flusher_state: AtomicU8,
    shutdown: Arc<Notify>,
    flusher_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CounterService {
    pub fn new(router: Arc<dyn ShardRouter>, cache_ttl: Duration, flush_interval: Duration) -> Self {
        CounterService {
            router,
            buffer: Arc::new(WriteBuffer::new()),
            cache: Arc::new(LocalCache::new(cache_ttl)),
            flush_interval,
            flusher_state: AtomicU8::new(FLUSHER_NOT_STARTED),
            shutdown: Arc::new(Notify::new()),
            flusher_handle: std::sync::Mutex::new(None),
        }
    }

    /// Records one visit to `page`: buffer + cache are updated in-memory
    /// only. Never touches the backend synchronously.
    pub fn increment(&self, page: PageId) {
        self.buffer.add(page.clone(), 1);
        self.cache.bump_by(page, 1);
    }

    /// Reads the current count for `page`: a fresh cache hit
    /// short-circuits; otherwise drain this page's buffer entry before
    /// reading the backend so the result reflects all locally-accepted
    /// increments.
    pub async fn get(&self, page: &PageId) -> CounterResult<VisitRead> {
        if let Some((entry, true)) = self.cache.get(page) {
            return Ok(VisitRead {
                count: entry.count,
                served_via: SERVED_VIA_IN_MEMORY.to_string(),
            });
        }

        let pending = self.buffer.drain_one(page);
        if pending > 0 {
            if let Err(err) = self.router.incr_by(page, pending).await {
                self.buffer.rebuffer(page.clone(), pending);
                return Err(CounterError::BackendUnavailable {
                    shard: self.router.shard_for(page),
                    reason: err.to_string(),
                });
            }
        }

        match self.router.get_with_tag(page).await {
            Ok((count, served_via)) => {
                self.cache.put_count(page.clone(), count);
                Ok(VisitRead { count, served_via })
            }
            Err(err) => {
                if pending > 0 {
                    self.buffer.rebuffer(page.clone(), pending);
                }
                Err(CounterError::BackendUnavailable {
                    shard: self.router.shard_for(page),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Drains the entire buffer and flushes every pending delta to the
    /// backend. Per-key failures are re-buffered; the call continues with
    /// the next key rather than aborting.
    pub async fn flush_all(&self) -> CounterResult<FlushOutcome> {
        let snapshot = self.buffer.drain_all();
        let total = snapshot.len();
        let mut failed = Vec::new();

        for (page, delta) in snapshot {
            match self.router.incr_by(&page, delta).await {
                Ok(_) => {}
                Err(err) => {
                    warn!(page = %page, %err, "flush failed for page, re-buffering");
                    self.buffer.rebuffer(page.clone(), delta);
                    failed.push(page.into_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(FlushOutcome {
                flushed: total,
                failed,
            })
        } else {
            Err(CounterError::FlushPartial { failed })
        }
    }

    pub fn buffer_status(&self) -> BufferStatus {
        BufferStatus {
            size: self.buffer.size(),
            contents: self.buffer.contents(),
            age_since_last_flush: self.buffer.age_since_last_flush(),
        }
    }

    /// Idempotent: the first call spawns the background flusher task;
    /// later calls are no-ops.
    pub fn start_background_flusher(self: &Arc<Self>) {
        if self
            .flusher_state
            .compare_exchange(
                FLUSHER_NOT_STARTED,
                FLUSHER_RUNNING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }

        let service = Arc::clone(self);
        let handle = tokio::spawn(async move { service.run_flusher_loop().await });
        *self.flusher_handle.lock().unwrap() = Some(handle);
    }

    /// Signals the flusher loop to stop and waits for it to exit.
    pub async fn stop_background_flusher(&self) {
        self.shutdown.notify_one();
        let handle = self.flusher_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.flusher_state.store(FLUSHER_STOPPED, Ordering::SeqCst);
    }

    async fn run_flusher_loop(self: Arc<Self>) {
        info!(interval_secs = self.flush_interval.as_secs(), "background flusher started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.flush_interval) => {
                    match self.flush_all().await {
                        Ok(outcome) if outcome.flushed > 0 => {
                            info!(flushed = outcome.flushed, "periodic flush completed");
                        }
                        Ok(_) => {}
                        Err(CounterError::FlushPartial { failed }) => {
                            warn!(failed_count = failed.len(), "periodic flush left pages buffered");
                        }
                        Err(err) => {
                            warn!(%err, "periodic flush failed unexpectedly");
                        }
                    }
                }
                _ = self.shutdown.notified() => {
                    info!("background flusher stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as AsyncMutex;

    /// In-memory fake backend: one shared counter map, with switches to
    /// simulate outages for specific pages.
    struct FakeBackend {
        counts: AsyncMutex<HashMap<PageId, Count>>,
        down: std::sync::Mutex<std::collections::HashSet<String>>,
        incr_calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new() -> Self {
            FakeBackend {
                counts: AsyncMutex::new(HashMap::new()),
                down: std::sync::Mutex::new(std::collections::HashSet::new()),
                incr_calls: AtomicUsize::new(0),
            }
        }

        fn set_down(&self, page: &str, down: bool) {
            let mut guard = self.down.lock().unwrap();
            if down {
                guard.insert(page.to_string());
            } else {
                guard.remove(page);
            }
        }

        fn is_down(&self, page: &PageId) -> bool {
            self.down.lock().unwrap().contains(page.as_str())
        }
    }

    #[async_trait::async_trait]
    impl ShardRouter for FakeBackend {
        fn shard_for(&self, _key: &PageId) -> counter_common::ShardId {
            counter_common::ShardId::new("fake-shard")
        }

        async fn incr_by(
            &self,
            key: &PageId,
            delta: Count,
        ) -> counter_client::ClientResult<Count> {
            self.incr_calls.fetch_add(1, Ordering::SeqCst);
            if self.is_down(key) {
                return Err(counter_client::ClientError::Timeout);
            }
            let mut counts = self.counts.lock().await;
            let entry = counts.entry(key.clone()).or_insert(0);
            *entry += delta;
            Ok(*entry)
        }

        async fn get_with_tag(
            &self,
            key: &PageId,
        ) -> counter_client::ClientResult<(Count, String)> {
            if self.is_down(key) {
                return Err(counter_client::ClientError::Timeout);
            }
            let counts = self.counts.lock().await;
            Ok((counts.get(key).copied().unwrap_or(0), "fake-shard".to_string()))
        }
    }

    fn page(id: &str) -> PageId {
        PageId::new(id).unwrap()
    }

    fn service_with(backend: Arc<FakeBackend>) -> Arc<CounterService> {
        Arc::new(CounterService::new(
            backend,
            Duration::from_secs(5),
            Duration::from_secs(30),
        ))
    }

    #[tokio::test]
    async fn increment_is_readable_immediately_from_cache() {
        let backend = Arc::new(FakeBackend::new());
        let service = service_with(backend);

        service.increment(page("p1"));
        service.increment(page("p1"));
        service.increment(page("p1"));

        let read = service.get(&page("p1")).await.unwrap();
        assert_eq!(read.count, 3);
        assert_eq!(read.served_via, SERVED_VIA_IN_MEMORY);
        assert_eq!(service.buffer_status().size, 1);
    }

    #[tokio::test]
    async fn flush_all_persists_and_empties_buffer() {
        let backend = Arc::new(FakeBackend::new());
        let service = service_with(backend.clone());

        for _ in 0..5 {
            service.increment(page("p2"));
        }
        let outcome = service.flush_all().await.unwrap();
        assert_eq!(outcome.flushed, 1);
        assert_eq!(service.buffer_status().size, 0);

        let (count, _) = backend.get_with_tag(&page("p2")).await.unwrap();
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn read_through_drains_buffer_before_hitting_backend() {
        let backend = Arc::new(FakeBackend::new());
        let service = CounterService::new(
            backend.clone(),
            Duration::from_millis(1),
            Duration::from_secs(30),
        );

        service.increment(page("p3"));
        tokio::time::sleep(Duration::from_millis(5)).await;

        let read = service.get(&page("p3")).await.unwrap();
        assert_eq!(read.count, 1);
        assert_eq!(read.served_via, "fake-shard");
        assert_eq!(service.buffer_status().contents.get(&page("p3")), None);
    }

    #[tokio::test]
    async fn transient_failure_rebuffers_the_delta() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_down("p4", true);
        let service = service_with(backend.clone());

        for _ in 0..4 {
            service.increment(page("p4"));
        }
        let result = service.flush_all().await;
        assert!(result.is_err());
        assert_eq!(service.buffer_status().size, 1);
        assert_eq!(service.buffer_status().contents.get(&page("p4")), Some(&4));

        backend.set_down("p4", false);
        let outcome = service.flush_all().await.unwrap();
        assert_eq!(outcome.flushed, 1);
        let (count, _) = backend.get_with_tag(&page("p4")).await.unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn starting_the_flusher_twice_spawns_exactly_one_task() {
        let backend = Arc::new(FakeBackend::new());
        let service = service_with(backend);

        service.start_background_flusher();
        service.start_background_flusher();

        assert!(service.flusher_handle.lock().unwrap().is_some());
        service.stop_background_flusher().await;
    }
}
