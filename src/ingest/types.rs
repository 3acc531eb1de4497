// src/ingest/types.rs
use crate::error::FetchResult;
use crate::item::Item;

/// A remote ranked-items API: one endpoint for the ranking, one per item.
#[async_trait::async_trait]
pub trait RankingSource: Send + Sync {
    /// Ranked ids, truncated to at most `limit`.
    async fn top_ids(&self, limit: usize) -> FetchResult<Vec<u64>>;
    async fn item(&self, id: u64) -> FetchResult<Item>;
    fn name(&self) -> &'static str;
}

/// A local document holding a whole list of items, read at once.
#[async_trait::async_trait]
pub trait FileSource: Send + Sync {
    /// All items, or an error; never a partial list.
    async fn read_items(&self) -> FetchResult<Vec<Item>>;
    fn name(&self) -> &'static str;
}
