//! In-process LRU with a byte budget and per-entry TTL, generalizing the
//! teacher's single-purpose idempotency cache (`gateway/state.rs::DedupeCache`)
//! into a general-purpose cache with size- and count-based eviction.

use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

use lru::LruCache;
use streamhub_metrics::{cache as cache_metrics, counter, gauge};

pub struct Entry {
    pub value: Vec<u8>,
    pub tags: Vec<String>,
    pub deps: Vec<String>,
    pub inserted_at: Instant,
    pub ttl: Duration,
    pub access_count: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

struct Inner {
    entries: LruCache<String, Entry>,
    bytes_used: usize,
}

pub struct L1Cache {
    inner: Mutex<Inner>,
    byte_budget: usize,
}

impl L1Cache {
    pub fn new(max_entries: usize, byte_budget: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(max_entries.max(1))
            .unwrap_or(std::num::NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner { entries: LruCache::new(capacity), bytes_used: 0 }),
            byte_budget,
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let Some(entry) = inner.entries.get_mut(key) else {
            counter!(cache_metrics::L1_MISSES_TOTAL).increment(1);
            return None;
        };
        if entry.is_expired(now) {
            let size = entry.value.len();
            inner.entries.pop(key);
            inner.bytes_used = inner.bytes_used.saturating_sub(size);
            counter!(cache_metrics::L1_MISSES_TOTAL).increment(1);
            return None;
        }
        entry.access_count += 1;
        let value = entry.value.clone();
        counter!(cache_metrics::L1_HITS_TOTAL).increment(1);
        Some(value)
    }

    pub fn set(&self, key: String, value: Vec<u8>, tags: Vec<String>, deps: Vec<String>, ttl: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let size = value.len();
        if let Some(old) = inner.entries.peek(&key) {
            inner.bytes_used = inner.bytes_used.saturating_sub(old.value.len());
        }
        inner.entries.put(key, Entry {
            value,
            tags,
            deps,
            inserted_at: Instant::now(),
            ttl,
            access_count: 0,
        });
        inner.bytes_used += size;

        while inner.bytes_used > self.byte_budget {
            let Some((_, evicted)) = inner.entries.pop_lru() else { break };
            inner.bytes_used = inner.bytes_used.saturating_sub(evicted.value.len());
        }
        gauge!(cache_metrics::ENTRIES_ACTIVE).set(inner.entries.len() as f64);
    }

    pub fn remove(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = inner.entries.pop(key) {
            inner.bytes_used = inner.bytes_used.saturating_sub(entry.value.len());
            counter!(cache_metrics::INVALIDATIONS_TOTAL).increment(1);
        }
    }

    /// Keys tagged with `tag` or depending on `key`, for invalidation fan-out.
    pub fn dependents_of(&self, key: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|t| t == key) || entry.deps.iter().any(|d| d == key))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_budget_evicts_least_recently_used() {
        let cache = L1Cache::new(100, 10);
        cache.set("a".into(), vec![0u8; 6], vec![], vec![], Duration::from_secs(60));
        cache.set("b".into(), vec![0u8; 6], vec![], vec![], Duration::from_secs(60));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn expired_entry_is_treated_as_a_miss() {
        let cache = L1Cache::new(100, 1024);
        cache.set("k".into(), vec![1], vec![], vec![], Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
    }
}
