//! The bridge client: cached, coalesced, time-limited helper invocations.
//!
//! One [`BridgeClient`] is built at startup and shared by reference with
//! everything that wants acceleration. A call goes through these steps:
//!
//! 1. Resolve the helper (once per client). No helper → `Unavailable`.
//! 2. Derive the [`CacheKey`] from the operation and canonical payload.
//! 3. Cache hit → decode and return, no process launched.
//! 4. Cache miss → sweep expired entries when the cache is over half full,
//!    then join an identical in-flight request if there is one, or become
//!    its leader and run the helper.
//! 5. The leader validates the response against the operation's result
//!    type, caches it, and publishes the outcome to any followers.
//!
//! Only responses that decode into the expected shape are cached. Failures
//! are never cached: the next call retries the helper.

use super::error::BridgeError;
use super::protocol::{
    ApplyFiltersRequest, BatchCropRequest, BatchResizeRequest, BatchResult, FilterResult,
    Operation,
};
use super::runner::{ChildProcessRunner, ProcessRunner};
use crate::cache::{CacheKey, CacheStats, CacheStore, Clock, SystemClock};
use crate::config::BridgeConfig;
use crate::helper::{HelperHandle, HelperLocator};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Wall-clock limit for one helper invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type Outcome = Result<Value, BridgeError>;

/// A request some thread is currently running; others wait on it.
#[derive(Default)]
struct InFlight {
    outcome: Mutex<Option<Outcome>>,
    done: Condvar,
}

impl InFlight {
    fn publish(&self, outcome: Outcome) {
        *lock(&self.outcome) = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self) -> Outcome {
        let mut slot = lock(&self.outcome);
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

/// Lock ignoring poisoning. Every critical section here leaves the data
/// consistent, so a panic elsewhere does not invalidate it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes the in-flight entry when the leader finishes, and wakes followers
/// with an error if the leader unwound before publishing.
struct LeaderGuard<'a> {
    in_flight: &'a Mutex<HashMap<CacheKey, Arc<InFlight>>>,
    key: &'a CacheKey,
    slot: Arc<InFlight>,
    published: bool,
}

impl LeaderGuard<'_> {
    fn finish(mut self, outcome: Outcome) {
        lock(self.in_flight).remove(self.key);
        self.slot.publish(outcome);
        self.published = true;
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.published {
            lock(self.in_flight).remove(self.key);
            self.slot.publish(Err(BridgeError::Invocation(
                "helper invocation was abandoned".into(),
            )));
        }
    }
}

/// Executes helper operations with caching and a hard timeout.
///
/// `C` is the clock the response cache ages entries by.
pub struct BridgeClient<R: ProcessRunner = ChildProcessRunner, C: Clock = SystemClock> {
    locator: HelperLocator,
    runner: R,
    timeout: Duration,
    cache: Mutex<CacheStore<Value, C>>,
    in_flight: Mutex<HashMap<CacheKey, Arc<InFlight>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BridgeClient<ChildProcessRunner> {
    /// Build the production client from configuration.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let locator = HelperLocator::from_override(config.helper.path.as_deref());
        Self::new(locator, ChildProcessRunner::new())
            .with_timeout(Duration::from_secs(config.helper.timeout_secs))
            .with_cache(CacheStore::new(
                config.cache.max_size,
                Duration::from_secs(config.cache.ttl_secs),
            ))
    }
}

impl<R: ProcessRunner> BridgeClient<R> {
    pub fn new(locator: HelperLocator, runner: R) -> Self {
        Self {
            locator,
            runner,
            timeout: DEFAULT_TIMEOUT,
            cache: Mutex::new(CacheStore::default()),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl<R: ProcessRunner, C: Clock> BridgeClient<R, C> {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the response cache. Entries already cached are dropped.
    pub fn with_cache<K: Clock>(self, cache: CacheStore<Value, K>) -> BridgeClient<R, K> {
        BridgeClient {
            locator: self.locator,
            runner: self.runner,
            timeout: self.timeout,
            cache: Mutex::new(cache),
            in_flight: self.in_flight,
            hits: self.hits,
            misses: self.misses,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn locator(&self) -> &HelperLocator {
        &self.locator
    }

    pub fn helper(&self) -> &HelperHandle {
        self.locator.resolve()
    }

    pub fn is_available(&self) -> bool {
        self.helper().is_available()
    }

    /// Adjust contrast and brightness of a single file.
    pub fn apply_filters(&self, request: &ApplyFiltersRequest) -> Result<FilterResult, BridgeError> {
        self.execute(Operation::ApplyFilters, request)
    }

    pub fn batch_resize(&self, request: &BatchResizeRequest) -> Result<BatchResult, BridgeError> {
        self.execute(Operation::BatchResize, request)
    }

    pub fn batch_crop(&self, request: &BatchCropRequest) -> Result<BatchResult, BridgeError> {
        self.execute(Operation::BatchCrop, request)
    }

    /// Run `operation` with `payload`, decoding the response as `T`.
    pub fn execute<P, T>(&self, operation: Operation, payload: &P) -> Result<T, BridgeError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let Some(program) = self.helper().path() else {
            return Err(BridgeError::Unavailable);
        };

        let payload =
            serde_json::to_value(payload).map_err(|e| BridgeError::Encode(e.to_string()))?;
        let key = CacheKey::new(operation.as_str(), &payload);

        if let Some(cached) = self.cached(&key) {
            debug!("Cache hit: {}", operation);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return decode(cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let value = self.invoke_coalesced(&key, || {
            let raw = payload.to_string();
            let stdout = self
                .runner
                .run(program, operation.as_str(), &raw, self.timeout)?;
            let value = parse_response::<T>(&stdout)?;
            let mut cache = lock(&self.cache);
            cache.set(key.clone(), value.clone());
            debug!("Cache miss: {} (cache size: {})", operation, cache.size());
            Ok(value)
        })?;
        decode(value)
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        lock(&self.cache).clear();
        debug!("Helper cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        let cache = lock(&self.cache);
        CacheStats {
            size: cache.size(),
            max_size: cache.max_size(),
            ttl_secs: cache.ttl().as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Cache lookup, sweeping expired entries once the cache is over half full.
    fn cached(&self, key: &CacheKey) -> Option<Value> {
        let mut cache = lock(&self.cache);
        let hit = cache.get(key);
        if hit.is_none() && cache.size() > cache.max_size() / 2 {
            let removed = cache.cleanup_expired();
            if removed > 0 {
                debug!("Expired {} cached responses", removed);
            }
        }
        hit
    }

    /// Run `invoke` unless an identical request is already running, in which
    /// case wait for and share its outcome.
    fn invoke_coalesced(&self, key: &CacheKey, invoke: impl FnOnce() -> Outcome) -> Outcome {
        let slot = {
            let mut in_flight = lock(&self.in_flight);
            if let Some(running) = in_flight.get(key) {
                let running = Arc::clone(running);
                drop(in_flight);
                debug!("Joining in-flight request {}", key);
                return running.wait();
            }
            // A leader may have finished between our cache miss and taking
            // this lock; its result is already cached.
            if let Some(cached) = lock(&self.cache).get(key) {
                return Ok(cached);
            }
            let slot = Arc::new(InFlight::default());
            in_flight.insert(key.clone(), Arc::clone(&slot));
            slot
        };

        let guard = LeaderGuard {
            in_flight: &self.in_flight,
            key,
            slot,
            published: false,
        };
        let outcome = invoke();
        guard.finish(outcome.clone());
        outcome
    }
}

/// Parse helper stdout and check it has the shape of `T`.
fn parse_response<T: DeserializeOwned>(stdout: &str) -> Result<Value, BridgeError> {
    let value: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| BridgeError::InvalidResponse(format!("not valid JSON: {e}")))?;
    if let Err(e) = serde_json::from_value::<T>(value.clone()) {
        // The helper reports bad requests as `{"Error": "..."}` with exit 0.
        let reason = match value.get("Error").and_then(Value::as_str) {
            Some(reported) => format!("helper reported: {reported}"),
            None => format!("unexpected shape: {e}"),
        };
        return Err(BridgeError::InvalidResponse(reason));
    }
    Ok(value)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, BridgeError> {
    serde_json::from_value(value).map_err(|e| BridgeError::InvalidResponse(e.to_string()))
}
