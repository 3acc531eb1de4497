// src/ingest/providers/file.rs
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{FetchError, FetchResult};
use crate::ingest::types::FileSource;
use crate::item::Item;

/// Reads a JSON array of items from disk on every call.
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse a whole document; any error rejects it entirely.
pub fn parse_items(path: &Path, content: &str) -> FetchResult<Vec<Item>> {
    serde_json::from_str(content).map_err(|source| FetchError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait]
impl FileSource for JsonFileProvider {
    async fn read_items(&self) -> FetchResult<Vec<Item>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FetchError::ReadFile {
                path: self.path.clone(),
                source,
            })?;
        parse_items(&self.path, &content)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
