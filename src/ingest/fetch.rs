// src/ingest/fetch.rs
//! Producers feeding the ingestion channel.
//!
//! Sends await channel capacity, so a slow consumer throttles the fetch loops.
//! A closed channel means shutdown: producers stop without error.
//! Source errors are counted here, once each, not in the providers.

use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::FetchResult;
use crate::ingest::types::{FileSource, RankingSource};
use crate::item::{Item, ItemSource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub sent: usize,
    pub failed: usize,
    /// Stopped early on cancellation or a closed channel.
    pub stopped: bool,
}

pub(crate) fn count_error(source: &'static str) {
    counter!("fetch_errors_total", "source" => source).increment(1);
}

/// Fetch the ranking, then each ranked item in order, forwarding every item
/// that decodes. Only a failed ranking request is an error.
pub async fn fetch_remote(
    source: &dyn RankingSource,
    limit: usize,
    tx: &mpsc::Sender<Item>,
    cancel: &CancellationToken,
) -> FetchResult<FetchStats> {
    let ids = source
        .top_ids(limit)
        .await
        .inspect_err(|_| count_error(source.name()))?;
    let mut stats = FetchStats::default();

    for id in ids.into_iter().take(limit) {
        if cancel.is_cancelled() {
            stats.stopped = true;
            break;
        }

        let item = match source.item(id).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(target: "ingest", provider = source.name(), id, error = %e, "item fetch failed, skipping");
                count_error(source.name());
                stats.failed += 1;
                continue;
            }
        };

        if tx.send(item).await.is_err() {
            tracing::debug!(target: "ingest", provider = source.name(), "ingest channel closed");
            stats.stopped = true;
            break;
        }
        stats.sent += 1;
    }

    tracing::info!(
        target: "ingest",
        provider = source.name(),
        sent = stats.sent,
        failed = stats.failed,
        stopped = stats.stopped,
        "remote fetch finished"
    );
    Ok(stats)
}

/// Read the whole file and forward its items, tagging untagged ones as
/// file-sourced. Read/parse failures abort before anything is sent.
pub async fn fetch_file(
    source: &dyn FileSource,
    tx: &mpsc::Sender<Item>,
    cancel: &CancellationToken,
) -> FetchResult<FetchStats> {
    let items = source
        .read_items()
        .await
        .inspect_err(|_| count_error(source.name()))?;
    let mut stats = FetchStats::default();

    for mut item in items {
        if cancel.is_cancelled() {
            stats.stopped = true;
            break;
        }
        if item.from.is_none() {
            item.from = Some(ItemSource::File);
        }
        if tx.send(item).await.is_err() {
            stats.stopped = true;
            break;
        }
        stats.sent += 1;
    }

    tracing::info!(target: "ingest", provider = source.name(), sent = stats.sent, "file fetch finished");
    Ok(stats)
}
