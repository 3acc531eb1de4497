// src/store.rs
//! Shared, lock-guarded story store.
//!
//! All tracker reads and writes go through here; each call is one critical
//! section and change events are published before the lock is released, so
//! subscribers observe events in mutation order.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;

use crate::events::{ChangeBus, ChangeEvent};
use crate::item::Item;
use crate::tracker::BoundedTracker;

#[derive(Clone)]
pub struct StoryStore {
    inner: Arc<Mutex<BoundedTracker>>,
    changes: ChangeBus,
}

/// Outcome of one [`StoryStore::sweep`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub visited: usize,
    pub evicted: Vec<u64>,
    /// Cancellation stopped the sweep before every item was visited.
    pub interrupted: bool,
}

impl StoryStore {
    pub fn new(limit: usize, changes: ChangeBus) -> Self {
        crate::ingest::ensure_metrics_described();
        Self {
            inner: Arc::new(Mutex::new(BoundedTracker::with_capacity(limit))),
            changes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoundedTracker> {
        self.inner.lock().expect("story store mutex poisoned")
    }

    pub fn changes(&self) -> &ChangeBus {
        &self.changes
    }

    /// Insert or update `item`. An eviction is published before the
    /// addition. Returns the evicted item, if any.
    ///
    /// The first-seen `added` stamp of an already tracked id is kept.
    pub fn add(&self, mut item: Item) -> Option<Arc<Item>> {
        let mut tracker = self.lock();
        if let Some(existing) = tracker.get(item.id) {
            item.added = existing.added;
        }
        let item = Arc::new(item);
        let evicted = tracker.add(Arc::clone(&item));

        if let Some(old) = &evicted {
            counter!("tracker_evicted_total").increment(1);
            self.changes.publish(ChangeEvent::removed(Arc::clone(old)));
        }
        counter!("tracker_added_total").increment(1);
        self.changes.publish(ChangeEvent::added(item));
        gauge!("tracker_items").set(tracker.len() as f64);

        evicted
    }

    /// Remove `id`, publishing a removal when it was present.
    pub fn remove(&self, id: u64) -> Option<Arc<Item>> {
        let mut tracker = self.lock();
        let removed = tracker.remove(id)?;
        self.changes.publish(ChangeEvent::removed(Arc::clone(&removed)));
        gauge!("tracker_items").set(tracker.len() as f64);
        Some(removed)
    }

    /// Visit every tracked item (oldest first) in a single critical section
    /// and remove those for which `evict` returns true.
    ///
    /// `cancel` is checked before each item; on cancellation the sweep stops
    /// and removals already made stay in place.
    pub fn sweep<F>(&self, cancel: &CancellationToken, mut evict: F) -> SweepReport
    where
        F: FnMut(&Item) -> bool,
    {
        let mut report = SweepReport::default();
        let mut tracker = self.lock();

        for id in tracker.ids() {
            if cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }
            report.visited += 1;

            let Some(item) = tracker.get(id).cloned() else {
                continue;
            };
            if evict(item.as_ref()) {
                self.changes.publish(ChangeEvent::removed(item));
                tracker.remove(id);
                report.evicted.push(id);
            }
        }

        gauge!("tracker_items").set(tracker.len() as f64);
        report
    }

    /// Items in arrival order (oldest first).
    pub fn snapshot(&self) -> Vec<Arc<Item>> {
        self.lock().iter().cloned().collect()
    }

    /// Id-keyed copy of the store, as rendered or persisted. Still readable
    /// after a writer panicked mid-update, so the shutdown dump survives it.
    pub fn snapshot_map(&self) -> BTreeMap<u64, Item> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|it| (it.id, Item::clone(it)))
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<Arc<Item>> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
