// src/ingest/providers/hn.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, FetchResult};
use crate::ingest::types::RankingSource;
use crate::item::Item;

pub const HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Which ranking the remote fetcher follows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    #[default]
    Top,
    Best,
}

impl Feed {
    fn path(&self) -> &'static str {
        match self {
            Feed::Top => "topstories.json",
            Feed::Best => "beststories.json",
        }
    }
}

pub struct HnProvider {
    base: String,
    feed: Feed,
    client: reqwest::Client,
}

impl HnProvider {
    pub fn new(base: impl Into<String>, feed: Feed) -> Self {
        let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "hn client builder failed, falling back to a client without timeout");
                reqwest::Client::new()
            }
        };
        Self::with_client(base, feed, client)
    }

    pub fn with_client(base: impl Into<String>, feed: Feed, client: reqwest::Client) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            feed,
            client,
        }
    }

    pub fn ranking_url(&self) -> String {
        format!("{}/{}", self.base, self.feed.path())
    }

    pub fn item_url(&self, id: u64) -> String {
        format!("{}/item/{id}.json", self.base)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> FetchResult<T> {
        let t0 = std::time::Instant::now();
        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(source) => return Err(FetchError::Http { url, source }),
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let out = resp
            .json::<T>()
            .await
            .map_err(|source| FetchError::Decode { url, source })?;

        histogram!("hn_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }
}

#[async_trait]
impl RankingSource for HnProvider {
    async fn top_ids(&self, limit: usize) -> FetchResult<Vec<u64>> {
        let mut ids: Vec<u64> = self.get_json(self.ranking_url()).await?;
        ids.truncate(limit);
        Ok(ids)
    }

    async fn item(&self, id: u64) -> FetchResult<Item> {
        // deleted or unknown items come back as a literal `null`
        let item: Option<Item> = self.get_json(self.item_url(id)).await?;
        item.ok_or(FetchError::MissingItem(id))
    }

    fn name(&self) -> &'static str {
        "hn"
    }
}
