// src/ingest/mod.rs
pub mod config;
pub mod fetch;
pub mod providers;
pub mod reconcile;
pub mod scheduler;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::item::{discuss_link, domain_from_url, Item, ItemSource};
use crate::store::StoryStore;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_gauge!("tracker_items", "Stories currently tracked.");
        describe_counter!("tracker_added_total", "Stories added or updated.");
        describe_counter!(
            "tracker_evicted_total",
            "Stories evicted because the tracker was full."
        );
        describe_counter!(
            "reconcile_evicted_total",
            "Stale, non-canonical stories removed by the reconciler."
        );
        describe_counter!("fetch_errors_total", "Source fetch/parse errors.");
        describe_counter!("scheduler_ticks_total", "Completed scheduler ticks.");
        describe_counter!(
            "scheduler_task_failures_total",
            "Failed tasks across scheduler ticks."
        );
        describe_histogram!("hn_fetch_ms", "HN request time in milliseconds.");
    });
}

/// Fill in the derived fields of a freshly received item.
///
/// Only unset fields are touched, so running this twice is harmless.
pub fn normalize_item(mut item: Item, now: i64) -> Item {
    if item.added == 0 {
        item.added = now;
    }
    if item.from.is_none() {
        item.from = Some(ItemSource::Hn);
    }
    if item.domain.is_empty() {
        match domain_from_url(&item.url) {
            Ok(domain) => item.domain = domain,
            Err(e) => {
                tracing::warn!(target: "ingest", id = item.id, url = %item.url, error = %e, "cannot derive domain");
            }
        }
    }
    if !item.is_from_file() {
        item.discuss_link = discuss_link(item.id);
    }
    item
}

/// Drain the ingestion channel into the store until every sender is gone.
/// Returns how many items were applied.
pub async fn run_consumer(mut rx: mpsc::Receiver<Item>, store: StoryStore) -> usize {
    let mut applied = 0usize;
    while let Some(item) = rx.recv().await {
        let now = chrono::Utc::now().timestamp();
        let item = normalize_item(item, now);
        let id = item.id;

        if let Some(evicted) = store.add(item) {
            tracing::debug!(target: "ingest", id, evicted = evicted.id, "tracker full, evicted oldest");
        }
        applied += 1;
    }

    tracing::info!(target: "ingest", applied, "ingest channel closed, consumer stopping");
    applied
}

pub fn spawn_consumer(rx: mpsc::Receiver<Item>, store: StoryStore) -> JoinHandle<usize> {
    tokio::spawn(run_consumer(rx, store))
}
