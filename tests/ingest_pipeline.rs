// tests/ingest_pipeline.rs
use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use story_tracker::error::{FetchError, FetchResult};
use story_tracker::ingest::fetch::{fetch_file, fetch_remote};
use story_tracker::ingest::run_consumer;
use story_tracker::ingest::types::{FileSource, RankingSource};
use story_tracker::{ChangeAction, ChangeBus, Item, ItemSource, StoryStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct MockRanking {
    ids: Vec<u64>,
    /// Return the whole ranking whatever the requested limit.
    ignores_limit: bool,
    missing: HashSet<u64>,
    /// Cancelled right after this id is fetched.
    cancel_after: Option<(u64, CancellationToken)>,
    fetched: Mutex<Vec<u64>>,
}

impl MockRanking {
    fn new(ids: Vec<u64>) -> Self {
        Self {
            ids,
            ignores_limit: false,
            missing: HashSet::new(),
            cancel_after: None,
            fetched: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RankingSource for MockRanking {
    async fn top_ids(&self, limit: usize) -> FetchResult<Vec<u64>> {
        if self.ignores_limit {
            return Ok(self.ids.clone());
        }
        Ok(self.ids.iter().copied().take(limit).collect())
    }

    async fn item(&self, id: u64) -> FetchResult<Item> {
        self.fetched.lock().unwrap().push(id);
        if let Some((after, token)) = &self.cancel_after {
            if *after == id {
                token.cancel();
            }
        }
        if self.missing.contains(&id) {
            return Err(FetchError::MissingItem(id));
        }
        Ok(Item::new(id, format!("https://news.example.com/{id}")))
    }

    fn name(&self) -> &'static str {
        "mock-hn"
    }
}

struct MockFile(Option<Vec<Item>>);

#[async_trait]
impl FileSource for MockFile {
    async fn read_items(&self) -> FetchResult<Vec<Item>> {
        match &self.0 {
            Some(items) => Ok(items.clone()),
            None => Err(FetchError::ReadFile {
                path: "missing.json".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "mock-file"
    }
}

async fn drain(mut rx: mpsc::Receiver<Item>) -> Vec<Item> {
    let mut out = Vec::new();
    while let Some(it) = rx.recv().await {
        out.push(it);
    }
    out
}

#[tokio::test]
async fn remote_fetch_truncates_and_skips_failed_items() {
    let mut src = MockRanking::new(vec![5, 6, 7, 8, 9]);
    src.missing.insert(6);
    let (tx, rx) = mpsc::channel(16);

    let stats = fetch_remote(&src, 3, &tx, &CancellationToken::new())
        .await
        .unwrap();
    drop(tx);

    assert_eq!(stats.sent, 2);
    assert_eq!(stats.failed, 1);
    let ids: Vec<u64> = drain(rx).await.iter().map(|it| it.id).collect();
    assert_eq!(ids, vec![5, 7]);
}

#[tokio::test]
async fn remote_fetch_caps_an_oversized_ranking() {
    let mut src = MockRanking::new(vec![1, 2, 3, 4, 5]);
    src.ignores_limit = true;
    let (tx, rx) = mpsc::channel(16);

    let stats = fetch_remote(&src, 2, &tx, &CancellationToken::new())
        .await
        .unwrap();
    drop(tx);

    assert_eq!(stats.sent, 2);
    assert_eq!(*src.fetched.lock().unwrap(), vec![1, 2]);
    let ids: Vec<u64> = drain(rx).await.iter().map(|it| it.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn each_source_error_is_counted_once() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    metrics::with_local_recorder(&recorder, || {
        rt.block_on(async {
            let mut src = MockRanking::new(vec![1, 2, 3]);
            src.missing.insert(2);
            src.missing.insert(3);
            let (tx, _rx) = mpsc::channel(16);
            let stats = fetch_remote(&src, 10, &tx, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(stats.failed, 2);
            assert!(fetch_file(&MockFile(None), &tx, &CancellationToken::new())
                .await
                .is_err());
        })
    });

    let mut errors: Vec<(String, u64)> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, ..)| key.key().name() == "fetch_errors_total")
        .filter_map(|(key, _, _, value)| {
            let source = key
                .key()
                .labels()
                .find(|l| l.key() == "source")
                .map(|l| l.value().to_string())?;
            match value {
                DebugValue::Counter(n) => Some((source, n)),
                _ => None,
            }
        })
        .collect();
    errors.sort();
    assert_eq!(
        errors,
        vec![("mock-file".to_string(), 1), ("mock-hn".to_string(), 2)]
    );
}

#[tokio::test]
async fn remote_fetch_stops_on_cancellation() {
    let token = CancellationToken::new();
    let mut src = MockRanking::new(vec![1, 2, 3, 4]);
    src.cancel_after = Some((2, token.clone()));
    let (tx, rx) = mpsc::channel(16);

    let stats = fetch_remote(&src, 10, &tx, &token).await.unwrap();
    drop(tx);

    assert!(stats.stopped);
    assert_eq!(*src.fetched.lock().unwrap(), vec![1, 2]);
    assert_eq!(drain(rx).await.len(), 2);
}

#[tokio::test]
async fn remote_fetch_ends_quietly_when_channel_closed() {
    let src = MockRanking::new(vec![1, 2, 3]);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let stats = fetch_remote(&src, 10, &tx, &CancellationToken::new())
        .await
        .unwrap();
    assert!(stats.stopped);
    assert_eq!(stats.sent, 0);
}

#[tokio::test]
async fn file_fetch_tags_items_and_aborts_on_error() {
    let mut tagged = Item::new(2, "");
    tagged.from = Some(ItemSource::Hn);
    let src = MockFile(Some(vec![Item::new(1, "https://x.example"), tagged]));
    let (tx, rx) = mpsc::channel(16);
    fetch_file(&src, &tx, &CancellationToken::new()).await.unwrap();
    drop(tx);

    let items = drain(rx).await;
    assert_eq!(items[0].from, Some(ItemSource::File));
    assert_eq!(items[1].from, Some(ItemSource::Hn));

    let (tx, rx) = mpsc::channel(16);
    let err = fetch_file(&MockFile(None), &tx, &CancellationToken::new())
        .await
        .unwrap_err();
    drop(tx);
    assert!(matches!(err, FetchError::ReadFile { .. }));
    assert!(drain(rx).await.is_empty());
}

#[tokio::test]
async fn file_fetch_sends_nothing_once_cancelled() {
    let src = MockFile(Some(vec![Item::new(1, ""), Item::new(2, "")]));
    let token = CancellationToken::new();
    token.cancel();
    let (tx, rx) = mpsc::channel(16);

    let stats = fetch_file(&src, &tx, &token).await.unwrap();
    drop(tx);

    assert!(stats.stopped);
    assert_eq!(stats.sent, 0);
    assert!(drain(rx).await.is_empty());
}

#[tokio::test]
async fn consumer_normalizes_and_orders_events() {
    let bus = ChangeBus::new(64);
    let mut events = bus.subscribe();
    let store = StoryStore::new(2, bus);
    let (tx, rx) = mpsc::channel(4);
    let consumer = tokio::spawn(run_consumer(rx, store.clone()));

    for id in 1..=3 {
        tx.send(Item::new(id, format!("https://www.site{id}.com/post")))
            .await
            .unwrap();
    }
    drop(tx);
    assert_eq!(consumer.await.unwrap(), 3);

    let seen: Vec<(ChangeAction, u64)> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|ev| (ev.action, ev.item.id))
        .collect();
    assert_eq!(
        seen,
        vec![
            (ChangeAction::Added, 1),
            (ChangeAction::Added, 2),
            (ChangeAction::Removed, 1),
            (ChangeAction::Added, 3),
        ]
    );

    let third = store.get(3).unwrap();
    assert_eq!(third.domain, "site3.com");
    assert_eq!(third.discuss_link, "https://news.ycombinator.com/item?id=3");
    assert!(third.added > 0);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn update_keeps_first_seen_timestamp() {
    let store = StoryStore::new(4, ChangeBus::new(8));
    let mut first = Item::new(1, "https://a.example");
    first.added = 100;
    store.add(first);

    let mut again = Item::new(1, "https://b.example");
    again.added = 999;
    assert!(store.add(again).is_none());

    let stored = store.get(1).unwrap();
    assert_eq!(stored.added, 100);
    assert_eq!(stored.url, "https://b.example");
}
