use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

/// Concurrent map of independently locked slots.
///
/// The map lock is held only to find or insert a slot; callers serialize on
/// the slot's own mutex, so operations on different keys never wait on each
/// other.
pub(crate) struct KeyedSlots<K, V> {
    slots: RwLock<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> KeyedSlots<K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn get(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.slots.read().await.get(key).cloned()
    }

    /// Inserts a new slot. Returns false and leaves the map untouched when the key exists.
    pub(crate) async fn insert(&self, key: K, value: V) -> bool {
        let mut slots = self.slots.write().await;
        if slots.contains_key(&key) {
            return false;
        }

        slots.insert(key, Arc::new(Mutex::new(value)));
        true
    }

    pub(crate) async fn get_or_insert_with(
        &self,
        key: K,
        init: impl FnOnce() -> V,
    ) -> Arc<Mutex<V>> {
        if let Some(slot) = self.get(&key).await {
            return slot;
        }

        self.slots
            .write()
            .await
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(init())))
            .clone()
    }

    pub(crate) async fn values(&self) -> Vec<Arc<Mutex<V>>> {
        self.slots.read().await.values().cloned().collect()
    }

    /// Removes slots whose value matches `remove`. Slots locked by a caller
    /// are kept.
    pub(crate) async fn remove_where(&self, mut remove: impl FnMut(&V) -> bool) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| !matches!(slot.try_lock(), Ok(value) if remove(&*value)));
        before - slots.len()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.slots.read().await.len()
    }
}
