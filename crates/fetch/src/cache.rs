//! The per-run cache: a pluggable mapping from `(source name, identity)` to
//! fetched value.

use dashmap::DashMap;

use crate::erased::{CacheKey, CachedValue};
use crate::source::DataSource;

/// A pluggable per-run cache backend.
///
/// A run owns exactly one `FetchCache` for its whole lifetime; it is
/// consulted before every batch is compiled and updated with every batch's
/// results before the next round is planned.
/// Implementations must preserve read-your-write within one run, but need
/// not be a pure-functional/persistent structure: a cache is never shared
/// across concurrent *runs*, only across the batches of a single round, so
/// simple interior mutability is both correct and simpler.
pub trait FetchCache: Send + Sync {
    /// Look up a previously-fetched value.
    fn get(&self, key: &CacheKey) -> Option<CachedValue>;

    /// Record a freshly-fetched value.
    fn put(&self, key: CacheKey, value: CachedValue);
}

/// The default cache: an in-memory, concurrently-writable mapping that
/// survives only the run it was built for.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<CacheKey, CachedValue>,
}

impl InMemoryCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the cache with a known value for `id`, as if `source` had
    /// already fetched it in an earlier round.
    ///
    /// Useful for tests and for deliberately reusing results across
    /// independent runs (the library never does this implicitly, see
    /// [`Environment::into_cache`](crate::env::Environment::into_cache)).
    pub fn seed<S: DataSource>(&self, source: &S, id: S::Identity, value: S::Value) {
        let key = CacheKey(source.name(), crate::erased::ErasedIdentity::new(id));
        self.entries.insert(key, CachedValue::new(value));
    }
}

impl FetchCache for InMemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: CacheKey, value: CachedValue) {
        self.entries.insert(key, value);
    }
}

/// A cache that never remembers anything: `get` always misses, `put` is a
/// no-op. Used to disable caching for a run (every identity is refetched
/// every time it appears in a frontier, even across Binds that revisit the
/// same key).
#[derive(Default)]
pub struct ForgetfulCache;

impl ForgetfulCache {
    /// A fresh forgetful cache.
    pub fn new() -> Self {
        Self
    }
}

impl FetchCache for ForgetfulCache {
    fn get(&self, _key: &CacheKey) -> Option<CachedValue> {
        None
    }

    fn put(&self, _key: CacheKey, _value: CachedValue) {}
}
