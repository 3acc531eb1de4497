// src/persist.rs
//! Best-effort dump of the tracked stories, written once at shutdown.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use crate::store::StoryStore;

/// Serialize the store as a JSON object keyed by story id.
pub fn render_snapshot(store: &StoryStore) -> Result<Vec<u8>> {
    let map = store.snapshot_map();
    serde_json::to_vec(&map).context("serializing tracker snapshot")
}

pub async fn dump_snapshot(store: &StoryStore, path: &Path) -> Result<usize> {
    let bytes = render_snapshot(store)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, &bytes)
        .await
        .with_context(|| format!("writing snapshot to {}", path.display()))?;
    Ok(bytes.len())
}
