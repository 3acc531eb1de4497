// src/ingest/reconcile.rs
//! Periodic sweep that drops stories which left both sources and went stale.

use std::collections::HashSet;
use std::time::Duration;

use metrics::counter;
use tokio_util::sync::CancellationToken;

use crate::error::FetchResult;
use crate::ingest::fetch::count_error;
use crate::ingest::types::{FileSource, RankingSource};
use crate::item::Item;
use crate::store::{StoryStore, SweepReport};

/// Current membership of both sources.
#[derive(Debug, Clone, Default)]
pub struct Canonical {
    ranked: HashSet<u64>,
    file: HashSet<u64>,
}

impl Canonical {
    pub fn new(
        ranked: impl IntoIterator<Item = u64>,
        file: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            ranked: ranked.into_iter().collect(),
            file: file.into_iter().collect(),
        }
    }

    /// File items are matched against the file, everything else against
    /// the ranking.
    pub fn contains(&self, item: &Item) -> bool {
        if item.is_from_file() {
            self.file.contains(&item.id)
        } else {
            self.ranked.contains(&item.id)
        }
    }

    /// Fetch both sides. Either failing fails the whole fetch.
    pub async fn fetch(
        ranking: &dyn RankingSource,
        file: &dyn FileSource,
        front_page: usize,
    ) -> FetchResult<Self> {
        let ranked = ranking
            .top_ids(front_page)
            .await
            .inspect_err(|_| count_error(ranking.name()))?;
        let file_items = file
            .read_items()
            .await
            .inspect_err(|_| count_error(file.name()))?;
        Ok(Self::new(
            ranked.into_iter().take(front_page),
            file_items.into_iter().map(|it| it.id),
        ))
    }
}

pub fn is_stale(item: &Item, now: i64, stale_after: Duration) -> bool {
    let age = now.saturating_sub(item.added);
    age > stale_after.as_secs() as i64
}

/// Evict every tracked item that is neither canonical nor younger than
/// `stale_after`, as of `now` (unix seconds).
pub fn sweep_stale(
    store: &StoryStore,
    canonical: &Canonical,
    now: i64,
    stale_after: Duration,
    cancel: &CancellationToken,
) -> SweepReport {
    let report = store.sweep(cancel, |item| {
        !canonical.contains(item) && is_stale(item, now, stale_after)
    });
    counter!("reconcile_evicted_total").increment(report.evicted.len() as u64);
    report
}

/// One reconciliation pass: fetch canonical membership, then sweep.
/// A fetch failure aborts the pass before the store is touched.
pub async fn reconcile(
    store: &StoryStore,
    ranking: &dyn RankingSource,
    file: &dyn FileSource,
    front_page: usize,
    stale_after: Duration,
    cancel: &CancellationToken,
) -> FetchResult<SweepReport> {
    let canonical = Canonical::fetch(ranking, file, front_page).await?;
    let now = chrono::Utc::now().timestamp();
    let report = sweep_stale(store, &canonical, now, stale_after, cancel);

    tracing::info!(
        target: "reconcile",
        visited = report.visited,
        evicted = report.evicted.len(),
        interrupted = report.interrupted,
        "reconcile pass finished"
    );
    Ok(report)
}
