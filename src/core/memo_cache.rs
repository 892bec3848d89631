//! Bounded memoization cache for pure-function results.
//!
//! Keys are a canonical `serde_json` serialization of the arguments, so they
//! are deterministic and order-sensitive. Eviction is least-recently-used and
//! deterministic: every touch gets a unique monotonic recency stamp, so there
//! are never ties to break.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

/// One cached result and when it was last touched.
struct CacheEntry<R> {
    value: R,
    last_used: u64,
}

struct CacheState<R> {
    entries: HashMap<String, CacheEntry<R>>,
    /// Monotonic recency stamp source.
    tick: u64,
}

/// Bounded LRU cache for results of a pure, deterministic computation.
///
/// The cached function must be side-effect-free and deterministic for a given
/// key; the cache makes no correctness guarantee otherwise.
pub struct MemoizationCache<R> {
    capacity: usize,
    state: Mutex<CacheState<R>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<R> MemoizationCache<R> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                tick: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Derive a deterministic, order-sensitive key from call arguments.
    ///
    /// Returns `None` for arguments that cannot be serialized; callers should
    /// then skip the cache rather than fail the computation.
    pub fn key_for<A: Serialize>(args: &A) -> Option<String> {
        serde_json::to_string(args).ok()
    }

    /// Number of cached entries. Never exceeds the configured capacity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Total lookup hits.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total lookup misses.
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Drop all entries. Hit/miss counters are preserved.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }
}

impl<R: Clone> MemoizationCache<R> {
    /// Look up a key, bumping its recency and the hit/miss counters.
    pub fn lookup(&self, key: &str) -> Option<R> {
        let mut state = self.state.lock();
        state.tick += 1;
        let tick = state.tick;
        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = tick;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a result, evicting the least-recently-used entry when the
    /// capacity would be exceeded.
    pub fn insert(&self, key: String, value: R) {
        let mut state = self.state.lock();
        state.tick += 1;
        let tick = state.tick;

        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(key = %oldest, "evicting least-recently-used cache entry");
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(key, CacheEntry { value, last_used: tick });
    }

    /// Return the cached value for `key`, or invoke `compute` exactly once,
    /// store its result, and return it.
    pub fn get_or_compute<F: FnOnce() -> R>(&self, key: &str, compute: F) -> R {
        if let Some(value) = self.lookup(key) {
            return value;
        }
        let value = compute();
        self.insert(key.to_owned(), value.clone());
        value
    }
}

/// Wrap a pure function so repeat calls with an identical key are served from
/// `cache` instead of recomputing.
///
/// Explicit decoration at registration time; instrumented and memoized
/// functions stay statically visible and type-checkable.
pub fn memoize<A, R, F, K>(
    cache: Arc<MemoizationCache<R>>,
    func: F,
    key_fn: K,
) -> impl Fn(&A) -> R
where
    R: Clone,
    F: Fn(&A) -> R,
    K: Fn(&A) -> String,
{
    move |args| {
        let key = key_fn(args);
        cache.get_or_compute(&key, || func(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_underlying_invoked_exactly_once() {
        let cache = MemoizationCache::new(8);
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_compute("k", || {
            calls.fetch_add(1, Ordering::Relaxed);
            21 * 2
        });
        let second = cache.get_or_compute("k", || {
            calls.fetch_add(1, Ordering::Relaxed);
            0
        });

        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let cache = MemoizationCache::new(3);
        for i in 0..10 {
            cache.insert(format!("k{i}"), i);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache = MemoizationCache::new(2);
        cache.insert("a".into(), 1);
        cache.insert("b".into(), 2);
        // Touch "a" so "b" is the least recently used.
        assert_eq!(cache.lookup("a"), Some(1));
        cache.insert("c".into(), 3);

        assert_eq!(cache.lookup("a"), Some(1));
        assert_eq!(cache.lookup("b"), None);
        assert_eq!(cache.lookup("c"), Some(3));
    }

    #[test]
    fn test_key_is_order_sensitive() {
        let ab = MemoizationCache::<()>::key_for(&vec![1, 2]).unwrap();
        let ba = MemoizationCache::<()>::key_for(&vec![2, 1]).unwrap();
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_memoize_combinator() {
        let cache = Arc::new(MemoizationCache::new(4));
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);

        let square = memoize(
            Arc::clone(&cache),
            move |x: &i64| {
                counted.fetch_add(1, Ordering::Relaxed);
                x * x
            },
            |x| x.to_string(),
        );

        assert_eq!(square(&9), 81);
        assert_eq!(square(&9), 81);
        assert_eq!(square(&3), 9);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = MemoizationCache::new(4);
        cache.insert("k".into(), 1);
        assert_eq!(cache.lookup("k"), Some(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 1);
    }
}
