//! Time-based result caching with an injectable clock.
//!
//! Entries expire after a fixed TTL and are recomputed, never updated in
//! place. Time comes from a [`Clock`] so tests can move it explicitly.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

/// In-memory TTL cache keyed by canonical strings.
///
/// When `max_entries` is reached the oldest entry is evicted; expired entries
/// are dropped lazily on insert.
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    ttl: Duration,
    max_entries: Option<usize>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, max_entries: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// Value stored under `key` if it is younger than the TTL at `now`.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| now - entry.inserted_at < self.ttl)
            .map(|entry| entry.value.clone())
    }

    pub fn set(&mut self, key: String, value: V, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries.retain(|_, e| now - e.inserted_at < ttl);

        if let Some(max) = self.max_entries
            && self.entries.len() >= max
            && !self.entries.contains_key(&key)
            && let Some(oldest_key) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
        {
            self.entries.remove(&oldest_key);
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Canonical cache key for a query plus its parameters.
///
/// Relies on `params` serializing deterministically (ordered sets, fixed
/// field order).
pub fn cache_key<P: Serialize>(query: &str, params: &P) -> String {
    let params = serde_json::to_string(params).unwrap_or_default();
    format!("{query}|{params}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_cache_insert_and_get() {
        let mut cache = TtlCache::new(Duration::minutes(5), None);
        cache.set("k".to_string(), 42, t0());
        assert_eq!(cache.get("k", t0()), Some(42));
        assert_eq!(cache.get("k", t0() + Duration::seconds(299)), Some(42));
    }

    #[test]
    fn test_cache_expires_at_ttl() {
        let mut cache = TtlCache::new(Duration::minutes(5), None);
        cache.set("k".to_string(), 1, t0());
        assert_eq!(cache.get("k", t0() + Duration::minutes(5)), None);
    }

    #[test]
    fn test_cache_miss() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::minutes(5), None);
        assert!(cache.get("nonexistent", t0()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_overwrite_refreshes_timestamp() {
        let mut cache = TtlCache::new(Duration::minutes(5), None);
        cache.set("k".to_string(), 1, t0());
        cache.set("k".to_string(), 2, t0() + Duration::minutes(4));
        assert_eq!(cache.get("k", t0() + Duration::minutes(8)), Some(2));
    }

    #[test]
    fn test_cache_max_eviction() {
        let mut cache = TtlCache::new(Duration::hours(1), Some(3));
        cache.set("a".to_string(), 1, t0());
        cache.set("b".to_string(), 2, t0() + Duration::seconds(1));
        cache.set("c".to_string(), 3, t0() + Duration::seconds(2));
        assert_eq!(cache.len(), 3);

        // Inserting a 4th evicts the oldest
        cache.set("d".to_string(), 4, t0() + Duration::seconds(3));
        assert_eq!(cache.len(), 3);
        assert!(cache.get("a", t0() + Duration::seconds(3)).is_none());
        assert_eq!(cache.get("d", t0() + Duration::seconds(3)), Some(4));
    }

    #[test]
    fn test_cache_drops_expired_on_set() {
        let mut cache = TtlCache::new(Duration::minutes(5), None);
        cache.set("old".to_string(), 1, t0());
        cache.set("new".to_string(), 2, t0() + Duration::minutes(10));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(t0());
        assert_eq!(clock.now(), t0());
        clock.advance(Duration::minutes(3));
        assert_eq!(clock.now(), t0() + Duration::minutes(3));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        #[derive(Serialize)]
        struct P {
            a: u32,
            b: Vec<&'static str>,
        }
        let p = P {
            a: 1,
            b: vec!["x", "y"],
        };
        assert_eq!(cache_key("urban", &p), cache_key("urban", &p));
        assert_ne!(cache_key("urban", &p), cache_key("rural", &p));
        assert_eq!(cache_key("q", &p), r#"q|{"a":1,"b":["x","y"]}"#);
    }
}
