//! Concurrent memoization for lookups that are expensive to repeat.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

/// Per-key compute-once cache shared between worker threads.
///
/// Each key owns a slot guarded by its own mutex, so two workers asking for
/// the same id wait on one computation while other keys proceed. Failed
/// computations leave the slot empty and the next caller retries.
pub struct MemoCache<V> {
    slots: DashMap<String, Arc<Mutex<Option<V>>>>,
}

impl<V: Clone> MemoCache<V> {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let slot = self.slots.get(key)?.clone();
        let guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    pub fn get_or_try_compute<E, F>(&self, key: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key.to_string());
        let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = guard.as_ref() {
            return Ok(value.clone());
        }
        let value = compute()?;
        *guard = Some(value.clone());
        Ok(value)
    }

    /// Keys with a stored value.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .lock()
                    .map(|guard| guard.is_some())
                    .unwrap_or(false)
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The dashmap shard lock is released before the slot mutex is taken.
    fn slot(&self, key: String) -> Arc<Mutex<Option<V>>> {
        self.slots
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

impl<V: Clone> Default for MemoCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
