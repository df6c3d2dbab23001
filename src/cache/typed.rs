//! Typed cache wrapper around Moka.

use std::hash::Hash;
use std::sync::Arc;

use moka::sync::Cache;

use super::CacheConfig;

/// A named, typed cache.
///
/// Cloning is cheap and shares the underlying storage. Values are replaced
/// whole on insert, so readers never observe a half-written entry.
pub struct TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
    name: Arc<str>,
}

// Manual Clone: moka's Cache is already reference counted.
impl<K, V> Clone for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            name: Arc::clone(&self.name),
        }
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new typed cache with the given name and config.
    pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);

        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner: builder.build(),
            name: name.into(),
        }
    }

    /// Get the name of this cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert or replace a value.
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Get a value if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Remove a key from the cache.
    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl<K, V> std::fmt::Debug for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn entries_expire_after_ttl() {
        let cache: TypedCache<i64, u32> =
            TypedCache::new("ttl_test", CacheConfig::with_capacity(16).ttl(Duration::from_millis(50)));
        cache.insert(1, 7);
        assert_eq!(cache.get(&1), Some(7));

        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn invalidate_removes_single_key() {
        let cache: TypedCache<i64, u32> = TypedCache::new("inv_test", CacheConfig::default());
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.invalidate(&1);
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(2));
        assert_eq!(cache.name(), "inv_test");
    }
}
