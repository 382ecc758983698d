use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const MIN_ENTRIES: usize = 16;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct TtlLru<V> {
    max_entries: usize,
    ttl: Duration,
    order: VecDeque<String>,
    values: HashMap<String, Entry<V>>,
}

impl<V: Clone> TtlLru<V> {
    fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            max_entries: max_entries.max(MIN_ENTRIES),
            ttl,
            order: VecDeque::new(),
            values: HashMap::new(),
        }
    }

    fn get(&mut self, key: &str, now: Instant) -> Option<V> {
        let expired = match self.values.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.values.remove(key);
            self.order.retain(|candidate| candidate != key);
        }
        None
    }

    fn insert(&mut self, key: String, value: V, now: Instant) {
        if self.values.contains_key(&key) {
            self.order.retain(|candidate| candidate != &key);
        } else if self.values.len() >= self.max_entries {
            self.evict(now);
        }
        self.values.insert(
            key.clone(),
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
        self.order.push_back(key);
    }

    /// Purge expired entries; if still full, drop the oldest quarter by insertion order.
    fn evict(&mut self, now: Instant) {
        self.values.retain(|_, entry| entry.expires_at > now);
        let values = &self.values;
        self.order.retain(|key| values.contains_key(key));
        if self.values.len() < self.max_entries {
            return;
        }
        let batch = (self.max_entries / 4).max(1);
        for _ in 0..batch {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.values.remove(&oldest);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.values.len()
    }
}

/// Shared TTL cache for catalog lookups. Misses are cached too, so `V` is usually an `Option`.
#[derive(Clone)]
pub struct LookupCache<V> {
    inner: Arc<Mutex<TtlLru<V>>>,
}

impl<V: Clone> LookupCache<V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TtlLru::new(max_entries, ttl))),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner
            .lock()
            .ok()
            .and_then(|mut lru| lru.get(key, Instant::now()))
    }

    pub fn insert(&self, key: String, value: V) {
        if let Ok(mut lru) = self.inner.lock() {
            lru.insert(key, value, Instant::now());
        }
    }
}
