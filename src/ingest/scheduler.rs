// src/ingest/scheduler.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use metrics::counter;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ingest::config::TrackerConfig;
use crate::ingest::fetch::{fetch_file, fetch_remote};
use crate::ingest::reconcile::reconcile;
use crate::ingest::types::{FileSource, RankingSource};
use crate::item::Item;
use crate::store::StoryStore;

/// Floor for the tick period; `interval_at` rejects a zero period.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub front_page: usize,
    pub stale_after: Duration,
}

impl From<&TrackerConfig> for SchedulerCfg {
    fn from(cfg: &TrackerConfig) -> Self {
        Self {
            interval: cfg.poll_interval(),
            front_page: cfg.front_page,
            stale_after: cfg.stale_after(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    RemoteFetch,
    FileFetch,
    Reconcile,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::RemoteFetch => "remote_fetch",
            TaskKind::FileFetch => "file_fetch",
            TaskKind::Reconcile => "reconcile",
        }
    }
}

/// Every failure of one tick, in the order the tasks were awaited.
#[derive(Debug, Default)]
pub struct TickReport {
    pub failures: Vec<(TaskKind, anyhow::Error)>,
}

impl TickReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, kind: TaskKind) -> bool {
        self.failures.iter().any(|(k, _)| *k == kind)
    }
}

/// Sources, store and ingestion sender shared by every scheduled task.
///
/// Holds a clone of the ingestion sender: the channel closes only after
/// every `Pipeline` handle is dropped.
pub struct Pipeline {
    store: StoryStore,
    ranking: Arc<dyn RankingSource>,
    file: Arc<dyn FileSource>,
    tx: mpsc::Sender<Item>,
    cfg: SchedulerCfg,
}

impl Pipeline {
    pub fn new(
        store: StoryStore,
        ranking: Arc<dyn RankingSource>,
        file: Arc<dyn FileSource>,
        tx: mpsc::Sender<Item>,
        mut cfg: SchedulerCfg,
    ) -> Arc<Self> {
        if cfg.interval < MIN_INTERVAL {
            tracing::warn!(
                target: "scheduler",
                interval = ?cfg.interval,
                min = ?MIN_INTERVAL,
                "tick interval too short, clamping"
            );
            cfg.interval = MIN_INTERVAL;
        }
        Arc::new(Self {
            store,
            ranking,
            file,
            tx,
            cfg,
        })
    }

    pub fn store(&self) -> &StoryStore {
        &self.store
    }

    pub fn interval(&self) -> Duration {
        self.cfg.interval
    }

    async fn remote_fetch(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        fetch_remote(self.ranking.as_ref(), self.cfg.front_page, &self.tx, cancel)
            .await
            .context("remote fetch")?;
        Ok(())
    }

    async fn file_fetch(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        fetch_file(self.file.as_ref(), &self.tx, cancel)
            .await
            .context("file fetch")?;
        Ok(())
    }

    async fn reconcile(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        reconcile(
            &self.store,
            self.ranking.as_ref(),
            self.file.as_ref(),
            self.cfg.front_page,
            self.cfg.stale_after,
            cancel,
        )
        .await
        .context("reconcile")?;
        Ok(())
    }

    /// One-shot remote and file fetches that fill the tracker before the
    /// first tick. Failures are logged only.
    pub fn spawn_startup_fetches(self: &Arc<Self>, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let remote = {
            let p = Arc::clone(self);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tracing::info!(target: "scheduler", "starting top stories fetcher");
                if let Err(e) = p.remote_fetch(&cancel).await {
                    tracing::warn!(target: "scheduler", error = ?e, "startup remote fetch failed");
                }
            })
        };
        let file = {
            let p = Arc::clone(self);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tracing::info!(target: "scheduler", "starting file stories fetcher");
                if let Err(e) = p.file_fetch(&cancel).await {
                    tracing::warn!(target: "scheduler", error = ?e, "startup file fetch failed");
                }
            })
        };
        vec![remote, file]
    }

    /// Run remote fetch, file fetch and reconcile in parallel and wait for
    /// all three. The first failure cancels the tick's token so siblings
    /// that check it wind down; none is aborted.
    pub async fn run_tick(self: &Arc<Self>, cancel: &CancellationToken) -> TickReport {
        let tick = cancel.child_token();

        let handles = vec![
            (
                TaskKind::RemoteFetch,
                spawn_guarded(&tick, {
                    let p = Arc::clone(self);
                    let t = tick.clone();
                    async move { p.remote_fetch(&t).await }
                }),
            ),
            (
                TaskKind::FileFetch,
                spawn_guarded(&tick, {
                    let p = Arc::clone(self);
                    let t = tick.clone();
                    async move { p.file_fetch(&t).await }
                }),
            ),
            (
                TaskKind::Reconcile,
                spawn_guarded(&tick, {
                    let p = Arc::clone(self);
                    let t = tick.clone();
                    async move { p.reconcile(&t).await }
                }),
            ),
        ];

        let mut report = TickReport::default();
        for (kind, handle) in handles {
            let outcome = match handle.await {
                Ok(res) => res,
                Err(join_err) => Err(anyhow!("{} task panicked: {join_err}", kind.as_str())),
            };
            if let Err(e) = outcome {
                tick.cancel();
                counter!("scheduler_task_failures_total", "task" => kind.as_str()).increment(1);
                tracing::warn!(target: "scheduler", task = kind.as_str(), error = ?e, "tick task failed");
                report.failures.push((kind, e));
            }
        }
        report
    }

    /// Tick every `interval` (first tick one interval from now) until
    /// `cancel` fires. An in-flight tick is finished, never abandoned.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.cfg.interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tracing::info!(target: "scheduler", "starting tick");
                let report = self.run_tick(&cancel).await;
                counter!("scheduler_ticks_total").increment(1);
                tracing::info!(
                    target: "scheduler",
                    failures = report.failures.len(),
                    tracked = self.store.len(),
                    "tick finished"
                );
            }
            tracing::info!(target: "scheduler", "scheduler stopped");
        })
    }
}

/// Spawn `fut`, cancelling `tick` as soon as it fails.
fn spawn_guarded<F>(tick: &CancellationToken, fut: F) -> JoinHandle<anyhow::Result<()>>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let tick = tick.clone();
    tokio::spawn(async move {
        let res = fut.await;
        if res.is_err() {
            tick.cancel();
        }
        res
    })
}
