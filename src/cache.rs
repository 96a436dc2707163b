//! Process-lifetime caches shared by all request workers.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::RwLock;

/// Concurrency-safe map with get-or-compute. Values are cloned out (use `Arc` for large values).
/// Computation runs outside the lock; when two workers race on the same key the first insertion wins.
pub struct SharedCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for SharedCache<K, V> {
    fn default() -> Self {
        SharedCache {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> SharedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let guard = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    /// Insert or replace.
    pub fn insert(&self, key: K, value: V) {
        let mut guard = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut guard = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.remove(key)
    }

    pub fn len(&self) -> usize {
        let guard = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value or compute, store and return it. Errors are not cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let computed = compute().await?;
        let mut guard = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.entry(key.clone()).or_insert(computed).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn computes_once_per_key() {
        let cache: SharedCache<String, usize> = SharedCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_try_insert_with(&"users".to_string(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(7)
                })
                .await
                .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache: SharedCache<&'static str, usize> = SharedCache::new();
        let first = cache.get_or_try_insert_with(&"t", || async { Err::<usize, _>("boom") }).await;
        assert!(first.is_err());
        assert!(cache.is_empty());
        let second = cache.get_or_try_insert_with(&"t", || async { Ok::<_, &str>(1) }).await;
        assert_eq!(second, Ok(1));
    }
}
