//! Generic in-memory LRU cache with TTL and optional stale-while-revalidate.
//! Backing store is an O(1) LRU map; recency order matches last-access order
//! because every successful read promotes the entry.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

/// Cache construction parameters.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries. Must be > 0.
    pub capacity: usize,
    /// Default TTL applied by [`MemoryCache::set`].
    pub default_ttl: Duration,
    /// When true, expired entries are returned tagged [`CacheHit::Stale`]
    /// instead of being treated as absent.
    pub stale_while_revalidate: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            default_ttl: Duration::from_secs(300),
            stale_while_revalidate: false,
        }
    }
}

struct CacheEntry<T> {
    value: T,
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
    last_accessed_at: Instant,
}

/// Result of a successful cache read. The stored payload is never mutated;
/// staleness is carried by the variant, not merged into the value.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheHit<T> {
    Fresh(T),
    Stale(T),
}

impl<T> CacheHit<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, CacheHit::Stale(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            CacheHit::Fresh(value) | CacheHit::Stale(value) => value,
        }
    }
}

/// Read-only diagnostic snapshot. Taking it does not touch entry bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub expired_count: usize,
    pub total_accesses: u64,
    pub average_age_ms: f64,
}

/// Bounded LRU cache with per-entry TTL.
///
/// All operations are synchronous and lock the map for their full duration,
/// so each is atomic with respect to concurrent callers. A full cache evicts
/// the entry with the oldest last access before admitting a new key.
pub struct MemoryCache<T> {
    inner: Mutex<LruCache<String, CacheEntry<T>>>,
    default_ttl: Duration,
    stale_while_revalidate: bool,
}

impl<T: Clone> MemoryCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(config.capacity).expect("cache capacity must be > 0"),
            )),
            default_ttl: config.default_ttl,
            stale_while_revalidate: config.stale_while_revalidate,
        }
    }

    /// Insert or overwrite an entry with the default TTL.
    pub fn set(&self, key: String, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or overwrite an entry with an explicit TTL.
    pub fn set_with_ttl(&self, key: String, value: T, ttl: Duration) {
        self.insert_at(key, value, ttl, Instant::now());
    }

    fn insert_at(&self, key: String, value: T, ttl: Duration, now: Instant) {
        let mut cache = self.inner.lock();
        // LruCache::put evicts the least-recently-used entry when full.
        cache.put(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl,
                access_count: 1,
                last_accessed_at: now,
            },
        );
    }

    /// Look up a key. Fresh hits update access bookkeeping and promote the
    /// entry. Expired entries are evicted and reported absent, unless
    /// stale-while-revalidate is on, in which case they are returned tagged
    /// [`CacheHit::Stale`] (still promoted, never evicted here).
    pub fn get(&self, key: &str) -> Option<CacheHit<T>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<CacheHit<T>> {
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get_mut(key) {
            if now < entry.expires_at {
                entry.access_count += 1;
                entry.last_accessed_at = now;
                return Some(CacheHit::Fresh(entry.value.clone()));
            }
            if self.stale_while_revalidate {
                entry.access_count += 1;
                entry.last_accessed_at = now;
                return Some(CacheHit::Stale(entry.value.clone()));
            }
            // Expired — remove it
            cache.pop(key);
        }
        None
    }

    /// True iff an unexpired entry exists. Strict freshness regardless of the
    /// stale-while-revalidate flag; without that flag, an expired entry found
    /// here is evicted the same way `get` would.
    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, Instant::now())
    }

    fn has_at(&self, key: &str, now: Instant) -> bool {
        let mut cache = self.inner.lock();
        match cache.peek(key) {
            Some(entry) if now < entry.expires_at => true,
            Some(_) => {
                if !self.stale_while_revalidate {
                    cache.pop(key);
                }
                false
            }
            None => false,
        }
    }

    /// Remove one entry. Returns true if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Diagnostic snapshot. Iterates without promoting or evicting anything.
    pub fn stats(&self) -> CacheStats {
        self.stats_at(Instant::now())
    }

    fn stats_at(&self, now: Instant) -> CacheStats {
        let cache = self.inner.lock();
        let size = cache.len();
        let mut expired_count = 0;
        let mut total_accesses = 0u64;
        let mut age_sum_ms = 0.0f64;
        for (_, entry) in cache.iter() {
            if now >= entry.expires_at {
                expired_count += 1;
            }
            total_accesses += entry.access_count;
            age_sum_ms += now.duration_since(entry.created_at).as_secs_f64() * 1000.0;
        }
        CacheStats {
            size,
            capacity: cache.cap().get(),
            expired_count,
            total_accesses,
            average_age_ms: if size == 0 { 0.0 } else { age_sum_ms / size as f64 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize, ttl_ms: u64) -> MemoryCache<String> {
        MemoryCache::new(CacheConfig {
            capacity,
            default_ttl: Duration::from_millis(ttl_ms),
            stale_while_revalidate: false,
        })
    }

    #[test]
    fn hit_before_ttl_miss_after() {
        let c = cache(4, 100);
        let t0 = Instant::now();
        c.insert_at("a".into(), "v".into(), Duration::from_millis(100), t0);

        let hit = c.get_at("a", t0 + Duration::from_millis(50));
        assert_eq!(hit, Some(CacheHit::Fresh("v".to_string())));

        assert_eq!(c.get_at("a", t0 + Duration::from_millis(101)), None);
        // Expired entry was physically evicted
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn capacity_bound_holds_and_lru_is_evicted() {
        let c = cache(2, 10_000);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(10);
        c.insert_at("a".into(), "1".into(), ttl, t0);
        c.insert_at("b".into(), "2".into(), ttl, t0 + Duration::from_millis(1));
        assert_eq!(c.len(), 2);

        // Refresh A, then insert C: B has the oldest last access and goes.
        assert!(c.get_at("a", t0 + Duration::from_millis(2)).is_some());
        c.insert_at("c".into(), "3".into(), ttl, t0 + Duration::from_millis(3));

        assert_eq!(c.len(), 2);
        assert!(c.has_at("a", t0 + Duration::from_millis(4)));
        assert!(!c.has_at("b", t0 + Duration::from_millis(4)));
        assert!(c.has_at("c", t0 + Duration::from_millis(4)));
    }

    #[test]
    fn untouched_peer_is_evicted_first() {
        let c = cache(2, 10_000);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(10);
        c.insert_at("a".into(), "1".into(), ttl, t0);
        c.insert_at("b".into(), "2".into(), ttl, t0 + Duration::from_millis(1));
        // Without the touch on A, it would be the eviction victim.
        assert!(c.get_at("a", t0 + Duration::from_millis(2)).is_some());
        c.insert_at("c".into(), "3".into(), ttl, t0 + Duration::from_millis(3));
        assert!(c.has_at("a", t0 + Duration::from_millis(4)));
        assert!(!c.has_at("b", t0 + Duration::from_millis(4)));
    }

    #[test]
    fn overwrite_same_key_does_not_evict() {
        let c = cache(2, 10_000);
        let t0 = Instant::now();
        let ttl = Duration::from_secs(10);
        c.insert_at("a".into(), "1".into(), ttl, t0);
        c.insert_at("b".into(), "2".into(), ttl, t0);
        c.insert_at("a".into(), "updated".into(), ttl, t0 + Duration::from_millis(1));
        assert_eq!(c.len(), 2);
        assert_eq!(
            c.get_at("a", t0 + Duration::from_millis(2)),
            Some(CacheHit::Fresh("updated".to_string()))
        );
    }

    #[test]
    fn stale_while_revalidate_tags_without_mutating() {
        let c = MemoryCache::new(CacheConfig {
            capacity: 4,
            default_ttl: Duration::from_millis(100),
            stale_while_revalidate: true,
        });
        let t0 = Instant::now();
        c.insert_at("a".into(), "v".to_string(), Duration::from_millis(100), t0);

        let late = t0 + Duration::from_millis(200);
        let hit = c.get_at("a", late).expect("stale entry should be served");
        assert!(hit.is_stale());
        assert_eq!(hit.into_inner(), "v");

        // `has` stays strict under stale-while-revalidate and must not evict.
        assert!(!c.has_at("a", late));
        assert!(c.get_at("a", late).is_some());

        // The payload itself is untouched by the stale read.
        assert_eq!(c.get_at("a", late).unwrap().into_inner(), "v");
    }

    #[test]
    fn has_evicts_expired_in_strict_mode() {
        let c = cache(4, 100);
        let t0 = Instant::now();
        c.insert_at("a".into(), "v".into(), Duration::from_millis(100), t0);
        assert!(!c.has_at("a", t0 + Duration::from_millis(150)));
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn clear_is_idempotent() {
        let c = cache(4, 10_000);
        let t0 = Instant::now();
        c.insert_at("a".into(), "1".into(), Duration::from_secs(10), t0);
        c.clear();
        assert_eq!(c.len(), 0);
        assert_eq!(c.get_at("a", t0 + Duration::from_millis(1)), None);
        c.clear();
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn stats_do_not_mutate_entries() {
        let c = cache(4, 10_000);
        let t0 = Instant::now();
        c.insert_at("a".into(), "1".into(), Duration::from_millis(50), t0);
        c.insert_at("b".into(), "2".into(), Duration::from_secs(10), t0);
        c.get_at("b", t0 + Duration::from_millis(10));

        let stats = c.stats_at(t0 + Duration::from_millis(100));
        assert_eq!(stats.size, 2);
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.expired_count, 1);
        // a: 1 insert access, b: 1 insert + 1 read
        assert_eq!(stats.total_accesses, 3);
        assert!(stats.average_age_ms > 0.0);

        // Snapshot must not have evicted the expired entry.
        assert_eq!(c.len(), 2);
    }
}
