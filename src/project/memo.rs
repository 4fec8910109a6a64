use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Thread-safe in-memory memoization map.
///
/// Values are handed out as `Arc<V>` so reads never clone the payload.
pub struct ResolutionMemo<K, V> {
    inner: RwLock<HashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash, V> Default for ResolutionMemo<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> ResolutionMemo<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.inner.write().insert(key, Arc::clone(&value));
        value
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.read().get(key).cloned()
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.inner.write().remove(key)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<K, V> std::fmt::Debug for ResolutionMemo<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionMemo")
            .field("entries", &self.inner.read().len())
            .finish()
    }
}
