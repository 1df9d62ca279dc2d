// src/dedup.rs

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(30);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

type SharedResult<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct Pending<T, E> {
    id: u64,
    started_at: Instant,
    future: SharedResult<T, E>,
}

struct State<T, E> {
    cache: HashMap<String, (T, Instant)>,
    pending: HashMap<String, Pending<T, E>>,
}

/// Collapses concurrent calls with the same key into one in-flight future and
/// keeps successful results for a short TTL.
///
/// Cheap to clone; clones share the same cache.
pub struct RequestDeduplicator<T, E = String> {
    state: Arc<Mutex<State<T, E>>>,
    next_id: Arc<AtomicU64>,
    cache_ttl: Duration,
    pending_timeout: Duration,
}

impl<T, E> Clone for RequestDeduplicator<T, E> {
    fn clone(&self) -> Self {
        RequestDeduplicator {
            state: Arc::clone(&self.state),
            next_id: Arc::clone(&self.next_id),
            cache_ttl: self.cache_ttl,
            pending_timeout: self.pending_timeout,
        }
    }
}

impl<T, E> Default for RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_CACHE_TTL, DEFAULT_PENDING_TIMEOUT)
    }

    pub fn with_timeouts(cache_ttl: Duration, pending_timeout: Duration) -> Self {
        RequestDeduplicator {
            state: Arc::new(Mutex::new(State {
                cache: HashMap::new(),
                pending: HashMap::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
            cache_ttl,
            pending_timeout,
        }
    }

    /// Returns a fresh cached value, joins the in-flight call for `key`, or
    /// starts `make` and shares its outcome. Failures are shared with callers
    /// that already joined but are never cached.
    ///
    /// `make` runs under the internal lock and must only build the future.
    pub async fn deduplicate<F, Fut>(&self, key: &str, make: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = {
            let mut state = self.state.lock();

            if let Some((value, stored_at)) = state.cache.get(key) {
                if stored_at.elapsed() < self.cache_ttl {
                    return Ok(value.clone());
                }
            }

            match state.pending.get(key) {
                Some(pending) => pending.future.clone(),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = self.settle(key.to_string(), id, make()).boxed().shared();
                    state.pending.insert(
                        key.to_string(),
                        Pending {
                            id,
                            started_at: Instant::now(),
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        shared.await
    }

    fn settle<Fut>(&self, key: String, id: u64, call: Fut) -> impl Future<Output = Result<T, E>> + Send + 'static
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        async move {
            let result = call.await;
            {
                let mut state = state.lock();
                if let Ok(value) = &result {
                    state.cache.insert(key.clone(), (value.clone(), Instant::now()));
                }
                if state.pending.get(&key).map(|p| p.id) == Some(id) {
                    state.pending.remove(&key);
                }
            }
            result
        }
    }

    /// Evicts expired cache entries and pending calls older than the timeout.
    pub fn sweep(&self) {
        let mut state = self.state.lock();
        let cache_ttl = self.cache_ttl;
        let pending_timeout = self.pending_timeout;
        state.cache.retain(|_, (_, stored_at)| stored_at.elapsed() < cache_ttl);
        state.pending.retain(|_, p| p.started_at.elapsed() <= pending_timeout);
    }

    pub fn invalidate(&self, key: &str) {
        self.state.lock().cache.remove(key);
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.cache.clear();
        state.pending.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.state.lock().cache.len()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Runs `sweep` every `period` until the runtime shuts down.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                this.sweep();
            }
        })
    }
}
