//! Bounded, time-aware result cache for helper invocations.
//!
//! Launching the helper process costs far more than the lookup, so the
//! bridge remembers decoded responses for a while. This module owns the
//! storage policy; the bridge decides *what* to store.
//!
//! # Design
//!
//! ## Cache keys
//!
//! A [`CacheKey`] is derived from the operation name and a **canonical**
//! JSON rendering of the request payload: object keys are sorted at every
//! level, so two requests that differ only in field order share a key.
//! The canonical text is hashed with SHA-256 to keep keys short no matter
//! how large a batch payload grows:
//!
//! ```text
//! batch-resize:5f2c…e91a
//! ```
//!
//! ## Eviction
//!
//! Two bounds apply:
//!
//! - **Size** (`max_size`, default 100): inserting a new key into a full
//!   store evicts the least-recently-used entry first. Both `get` hits and
//!   `set` refreshes count as use.
//! - **Age** (`ttl`, default 300 s): an entry older than the TTL is never
//!   returned. Expiry is lazy on `get`; [`CacheStore::cleanup_expired`]
//!   sweeps everything at once.
//!
//! Recency is tracked with a monotonically increasing tick per touch and a
//! `BTreeMap<tick, key>` index, so the LRU victim is always the first entry
//! of the index.
//!
//! The store is not synchronized. Callers that share it across threads wrap
//! it in a `Mutex` (see [`BridgeClient`](crate::bridge::BridgeClient)).

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

/// Default maximum number of cached responses.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Default time-to-live for a cached response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Source of the current time for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic identifier for an (operation, payload) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(operation: &str, payload: &Value) -> Self {
        let mut canonical = String::new();
        write_canonical(payload, &mut canonical);
        let digest = Sha256::digest(canonical.as_bytes());
        Self(format!("{}:{:x}", operation, digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render `value` as compact JSON with object keys sorted recursively.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    tick: u64,
}

/// LRU + TTL bounded key/value store.
pub struct CacheStore<V, C: Clock = SystemClock> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    /// Recency index: oldest touch first.
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    max_size: usize,
    ttl: Duration,
    clock: C,
}

impl<V: Clone> CacheStore<V, SystemClock> {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self::with_clock(max_size, ttl, SystemClock)
    }
}

impl<V: Clone> Default for CacheStore<V, SystemClock> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

impl<V: Clone, C: Clock> CacheStore<V, C> {
    /// Create a store reading time from `clock`. A `max_size` of zero is
    /// raised to one so a freshly set value is always retrievable.
    pub fn with_clock(max_size: usize, ttl: Duration, clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            max_size: max_size.max(1),
            ttl,
            clock,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Look up `key`, expiring it if it has outlived the TTL.
    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();
        let stored_at = self.entries.get(key)?.stored_at;
        if self.is_expired(stored_at, now) {
            self.delete(key);
            return None;
        }
        let tick = self.bump_tick();
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, key.clone());
        Some(entry.value.clone())
    }

    /// Insert or refresh `key`. Evicts the least-recently-used entry when a
    /// new key would exceed `max_size`.
    pub fn set(&mut self, key: CacheKey, value: V) {
        let now = self.clock.now();
        let tick = self.bump_tick();

        if let Some(entry) = self.entries.get_mut(&key) {
            self.recency.remove(&entry.tick);
            entry.value = value;
            entry.stored_at = now;
            entry.tick = tick;
            self.recency.insert(tick, key);
            return;
        }

        if self.entries.len() >= self.max_size
            && let Some((_, oldest)) = self.recency.pop_first()
        {
            self.entries.remove(&oldest);
        }

        self.recency.insert(tick, key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                tick,
            },
        );
    }

    pub fn delete(&mut self, key: &CacheKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.recency.remove(&entry.tick);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now();
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry.stored_at, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.delete(key);
        }
        expired.len()
    }

    fn is_expired(&self, stored_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(stored_at) > self.ttl
    }

    fn bump_tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }
}

/// Snapshot of cache configuration and usage, reported by the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} entries, ttl {}s",
            self.size, self.max_size, self.ttl_secs
        )?;
        if self.hits > 0 || self.misses > 0 {
            write!(f, " ({} hits, {} misses)", self.hits, self.misses)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Clock that only moves when told to.
    #[derive(Clone)]
    pub struct ManualClock(Arc<Mutex<Instant>>);

    impl ManualClock {
        pub fn new() -> Self {
            Self(Arc::new(Mutex::new(Instant::now())))
        }

        pub fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::new("test", &json!({ "name": name }))
    }

    fn store(max_size: usize, ttl_secs: u64) -> (CacheStore<i32, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let store = CacheStore::with_clock(max_size, Duration::from_secs(ttl_secs), clock.clone());
        (store, clock)
    }

    // =========================================================================
    // Cache keys
    // =========================================================================

    #[test]
    fn key_ignores_field_order() {
        let a: Value =
            serde_json::from_str(r#"{"ImagePath":"/a.jpg","Contrast":1.2,"Brightness":0.0}"#)
                .unwrap();
        let b: Value =
            serde_json::from_str(r#"{"Brightness":0.0,"ImagePath":"/a.jpg","Contrast":1.2}"#)
                .unwrap();
        assert_eq!(
            CacheKey::new("apply-filters", &a),
            CacheKey::new("apply-filters", &b)
        );
    }

    #[test]
    fn key_ignores_nested_field_order() {
        let a = json!({ "Images": [{ "Path": "/a.jpg", "Scale": 0.5 }] });
        let b: Value =
            serde_json::from_str(r#"{"Images":[{"Scale":0.5,"Path":"/a.jpg"}]}"#).unwrap();
        assert_eq!(
            CacheKey::new("batch-resize", &a),
            CacheKey::new("batch-resize", &b)
        );
    }

    #[test]
    fn key_varies_with_operation() {
        let payload = json!({ "Images": [] });
        assert_ne!(
            CacheKey::new("batch-resize", &payload),
            CacheKey::new("batch-crop", &payload)
        );
    }

    #[test]
    fn key_varies_with_values() {
        assert_ne!(
            CacheKey::new("op", &json!({ "Scale": 0.5 })),
            CacheKey::new("op", &json!({ "Scale": 0.25 }))
        );
    }

    #[test]
    fn key_varies_with_array_order() {
        assert_ne!(
            CacheKey::new("op", &json!([1, 2])),
            CacheKey::new("op", &json!([2, 1]))
        );
    }

    #[test]
    fn key_is_prefixed_with_operation() {
        let k = CacheKey::new("batch-crop", &json!({}));
        assert!(k.as_str().starts_with("batch-crop:"));
        // SHA-256 hex is 64 chars
        assert_eq!(k.as_str().len(), "batch-crop:".len() + 64);
    }

    #[test]
    fn canonical_form_sorts_keys_and_keeps_scalars() {
        let mut out = String::new();
        write_canonical(&json!({ "b": [true, null], "a": "x\"y", "c": 1.5 }), &mut out);
        assert_eq!(out, r#"{"a":"x\"y","b":[true,null],"c":1.5}"#);
    }

    // =========================================================================
    // Store basics
    // =========================================================================

    #[test]
    fn get_missing_key_is_miss() {
        let (mut s, _) = store(10, 60);
        assert_eq!(s.get(&key("a")), None);
    }

    #[test]
    fn set_then_get_hits() {
        let (mut s, _) = store(10, 60);
        s.set(key("a"), 1);
        assert_eq!(s.get(&key("a")), Some(1));
        assert_eq!(s.size(), 1);
    }

    #[test]
    fn set_existing_key_replaces_value_without_growing() {
        let (mut s, _) = store(10, 60);
        s.set(key("a"), 1);
        s.set(key("a"), 2);
        assert_eq!(s.size(), 1);
        assert_eq!(s.get(&key("a")), Some(2));
    }

    #[test]
    fn delete_and_clear() {
        let (mut s, _) = store(10, 60);
        s.set(key("a"), 1);
        s.set(key("b"), 2);
        assert!(s.delete(&key("a")));
        assert!(!s.delete(&key("a")));
        assert_eq!(s.size(), 1);
        s.clear();
        assert_eq!(s.size(), 0);
        assert_eq!(s.get(&key("b")), None);
    }

    #[test]
    fn zero_max_size_still_holds_one_entry() {
        let (mut s, _) = store(0, 60);
        assert_eq!(s.max_size(), 1);
        s.set(key("a"), 1);
        assert_eq!(s.get(&key("a")), Some(1));
    }

    // =========================================================================
    // TTL
    // =========================================================================

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let (mut s, clock) = store(10, 1);
        s.set(key("a"), 1);
        assert_eq!(s.size(), 1);

        clock.advance(Duration::from_secs(2));

        assert_eq!(s.get(&key("a")), None);
        assert_eq!(s.size(), 0);
    }

    #[test]
    fn entry_at_exactly_ttl_is_still_valid() {
        let (mut s, clock) = store(10, 5);
        s.set(key("a"), 1);
        clock.advance(Duration::from_secs(5));
        assert_eq!(s.get(&key("a")), Some(1));
    }

    #[test]
    fn get_does_not_extend_lifetime() {
        let (mut s, clock) = store(10, 5);
        s.set(key("a"), 1);
        clock.advance(Duration::from_secs(4));
        assert_eq!(s.get(&key("a")), Some(1));
        clock.advance(Duration::from_secs(2));
        assert_eq!(s.get(&key("a")), None);
    }

    #[test]
    fn set_refreshes_timestamp() {
        let (mut s, clock) = store(10, 5);
        s.set(key("a"), 1);
        clock.advance(Duration::from_secs(4));
        s.set(key("a"), 1);
        clock.advance(Duration::from_secs(4));
        assert_eq!(s.get(&key("a")), Some(1));
    }

    #[test]
    fn cleanup_expired_removes_only_stale_entries() {
        let (mut s, clock) = store(10, 10);
        s.set(key("old1"), 1);
        s.set(key("old2"), 2);
        clock.advance(Duration::from_secs(8));
        s.set(key("fresh"), 3);
        clock.advance(Duration::from_secs(5));

        assert_eq!(s.cleanup_expired(), 2);
        assert_eq!(s.size(), 1);
        assert_eq!(s.get(&key("fresh")), Some(3));
    }

    // =========================================================================
    // LRU eviction
    // =========================================================================

    #[test]
    fn evicts_least_recently_inserted() {
        let (mut s, _) = store(2, 60);
        s.set(key("A"), 1);
        s.set(key("B"), 2);
        s.set(key("C"), 3);

        assert_eq!(s.get(&key("A")), None);
        assert_eq!(s.get(&key("B")), Some(2));
        assert_eq!(s.get(&key("C")), Some(3));
        assert_eq!(s.size(), 2);
    }

    #[test]
    fn get_refreshes_recency() {
        let (mut s, _) = store(2, 60);
        s.set(key("A"), 1);
        s.set(key("B"), 2);
        assert_eq!(s.get(&key("A")), Some(1));
        s.set(key("C"), 3);

        assert_eq!(s.get(&key("B")), None);
        assert_eq!(s.get(&key("A")), Some(1));
        assert_eq!(s.get(&key("C")), Some(3));
    }

    #[test]
    fn set_existing_refreshes_recency() {
        let (mut s, _) = store(2, 60);
        s.set(key("A"), 1);
        s.set(key("B"), 2);
        s.set(key("A"), 10);
        s.set(key("C"), 3);

        assert_eq!(s.get(&key("B")), None);
        assert_eq!(s.get(&key("A")), Some(10));
    }

    #[test]
    fn size_never_exceeds_max() {
        let (mut s, _) = store(3, 60);
        for i in 0..20 {
            s.set(key(&i.to_string()), i);
            assert!(s.size() <= 3);
        }
        assert_eq!(s.get(&key("19")), Some(19));
        assert_eq!(s.get(&key("16")), None);
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_without_traffic() {
        let s = CacheStats {
            size: 0,
            max_size: 100,
            ttl_secs: 300,
            ..Default::default()
        };
        assert_eq!(s.to_string(), "0/100 entries, ttl 300s");
    }

    #[test]
    fn cache_stats_display_with_traffic() {
        let s = CacheStats {
            size: 2,
            max_size: 100,
            ttl_secs: 300,
            hits: 5,
            misses: 2,
        };
        assert_eq!(s.to_string(), "2/100 entries, ttl 300s (5 hits, 2 misses)");
    }
}
