//! # Bounded Tracker
//! Fixed-capacity ordered map of stories with strict FIFO eviction.
//!
//! Order is the arrival order of *new* ids; re-adding a known id replaces the
//! stored item in place without moving it. Not synchronized: callers go
//! through [`crate::store::StoryStore`], which owns the lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::item::Item;

#[derive(Debug)]
pub struct BoundedTracker {
    limit: usize,
    keys: VecDeque<u64>,
    store: HashMap<u64, Arc<Item>>,
}

impl BoundedTracker {
    /// `limit` of 0 is treated as 1 so `add` always keeps the newest item.
    pub fn with_capacity(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            keys: VecDeque::with_capacity(limit + 1),
            store: HashMap::with_capacity(limit + 1),
        }
    }

    /// Insert or overwrite. Returns the evicted (oldest) item when a new id
    /// pushes the size past the limit.
    pub fn add(&mut self, item: Arc<Item>) -> Option<Arc<Item>> {
        let id = item.id;
        if self.store.insert(id, item).is_some() {
            return None;
        }
        self.keys.push_back(id);

        let evicted = if self.keys.len() > self.limit {
            self.keys
                .pop_front()
                .and_then(|oldest| self.store.remove(&oldest))
        } else {
            None
        };
        self.check_invariant();
        evicted
    }

    /// Drop `id` and its item. No-op when absent.
    pub fn remove(&mut self, id: u64) -> Option<Arc<Item>> {
        let removed = self.store.remove(&id)?;
        if let Some(pos) = self.keys.iter().position(|k| *k == id) {
            self.keys.remove(pos);
        }
        self.check_invariant();
        Some(removed)
    }

    pub fn get(&self, id: u64) -> Option<&Arc<Item>> {
        self.store.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.store.contains_key(&id)
    }

    /// Items in arrival order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Item>> + '_ {
        self.keys.iter().filter_map(|k| self.store.get(k))
    }

    pub fn ids(&self) -> Vec<u64> {
        self.keys.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn check_invariant(&self) {
        assert_eq!(
            self.keys.len(),
            self.store.len(),
            "tracker keys and store diverged"
        );
    }
}
