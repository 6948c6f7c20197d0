//! Capacity- and time-bounded key/value caching.
//!
//! [`BoundedCache`] keeps at most `max_size` entries, evicting the least
//! recently used one when a new key arrives at capacity. Each entry expires
//! `ttl` after its last write. Expired entries are dropped lazily on `get` and
//! proactively by the [`sweeper::CacheSweeper`].
//!
//! All operations take a single mutex per instance and never fail; a poisoned
//! lock is recovered rather than propagated.

pub mod sweeper;

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Point-in-time counters for one cache instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub name: String,
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_seconds: u64,
    pub evictions: u64,
    pub expirations: u64,
}

/// Something the background sweeper can purge of expired entries.
pub trait Sweep: Send + Sync {
    fn name(&self) -> &str;

    /// Remove every expired entry and return how many were removed.
    fn sweep_expired(&self) -> usize;
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    written_at: Instant,
    access_count: u64,
    tick: u64,
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Recency order: lowest tick is least recently used.
    order: BTreeMap<u64, K>,
    next_tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        Some(entry)
    }

    fn evict_oldest(&mut self) {
        if let Some((_, key)) = self.order.pop_first() {
            self.entries.remove(&key);
            self.evictions += 1;
        }
    }
}

/// An LRU cache whose entries expire a fixed time after their last write.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    name: String,
    max_size: usize,
    ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: impl Into<String>, max_size: usize, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            max_size,
            ttl,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    ///
    /// Reads do not extend the entry's lifetime.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let ttl = self.ttl;
        let mut inner = self.lock();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => now.saturating_duration_since(entry.written_at) > ttl,
        };

        if expired {
            inner.remove(key);
            inner.expirations += 1;
            inner.misses += 1;
            trace!(cache = %self.name, "expired entry dropped on read");
            return None;
        }

        let tick = inner.bump();
        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        let old_tick = std::mem::replace(&mut entry.tick, tick);
        entry.access_count += 1;
        let value = entry.value.clone();
        inner.order.remove(&old_tick);
        inner.order.insert(tick, key.clone());
        Some(value)
    }

    /// Insert or overwrite `key`, refreshing its timestamp and recency.
    pub fn put(&self, key: K, value: V) {
        self.put_at(key, value, Instant::now());
    }

    fn put_at(&self, key: K, value: V, now: Instant) {
        if self.max_size == 0 {
            return;
        }
        let mut inner = self.lock();
        let tick = inner.bump();

        if let Some(entry) = inner.entries.get_mut(&key) {
            let old_tick = std::mem::replace(&mut entry.tick, tick);
            entry.value = value;
            entry.written_at = now;
            inner.order.remove(&old_tick);
            inner.order.insert(tick, key);
            return;
        }

        while inner.entries.len() >= self.max_size {
            inner.evict_oldest();
        }
        inner.order.insert(tick, key.clone());
        inner.entries.insert(
            key,
            Entry {
                value,
                written_at: now,
                access_count: 0,
                tick,
            },
        );
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Number of successful reads of `key` since it was first inserted.
    pub fn access_count(&self, key: &K) -> Option<u64> {
        self.lock().entries.get(key).map(|entry| entry.access_count)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        *self.lock() = Inner::new();
    }

    /// Remove all entries older than the TTL.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    fn cleanup_expired_at(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut inner = self.lock();
        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.written_at) > ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        inner.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            name: self.name.clone(),
            size: inner.entries.len(),
            max_size: self.max_size,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
            ttl_seconds: self.ttl.as_secs(),
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Sweep for BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn sweep_expired(&self) -> usize {
        self.cleanup_expired()
    }
}
