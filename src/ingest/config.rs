// src/ingest/config.rs
use anyhow::{anyhow, ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::providers::hn::{Feed, HN_API_BASE};

const ENV_PATH: &str = "TRACKER_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/tracker.toml";

pub const DEFAULT_CAPACITY: usize = 300;
pub const DEFAULT_FRONT_PAGE: usize = 30;
pub const DEFAULT_POLL_SECS: u64 = 60;
pub const DEFAULT_STALE_AFTER_SECS: u64 = 8 * 60 * 60;

/// Runtime settings for the tracker and its pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    pub capacity: usize,
    /// How many ranked ids the remote fetcher and the reconciler look at.
    pub front_page: usize,
    pub poll_interval_secs: u64,
    pub stale_after_secs: u64,
    pub ingest_buffer: usize,
    pub change_buffer: usize,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub hn_base_url: String,
    pub feed: Feed,
    /// Prometheus listener, e.g. "0.0.0.0:9000". Disabled when unset.
    pub metrics_addr: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            front_page: DEFAULT_FRONT_PAGE,
            poll_interval_secs: DEFAULT_POLL_SECS,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            ingest_buffer: 64,
            change_buffer: 1024,
            input_path: PathBuf::from("./input.json"),
            output_path: PathBuf::from("./output.json"),
            hn_base_url: HN_API_BASE.to_string(),
            feed: Feed::Top,
            metrics_addr: None,
        }
    }
}

impl TrackerConfig {
    /// Load settings from an explicit TOML file, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading tracker config from {}", path.display()))?;
        let cfg: Self = toml::from_str(&content)
            .with_context(|| format!("parsing tracker config {}", path.display()))?;
        cfg.with_env_overrides()
    }

    /// Load settings using env var + fallbacks:
    /// 1) $TRACKER_CONFIG_PATH
    /// 2) config/tracker.toml
    /// 3) built-in defaults
    ///
    /// Env overrides are applied in every case.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("TRACKER_CONFIG_PATH points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(p) = env_nonempty("INPUT_PATH") {
            self.input_path = PathBuf::from(p);
        }
        if let Some(p) = env_nonempty("OUTPUT_PATH") {
            self.output_path = PathBuf::from(p);
        }
        if let Some(v) = env_nonempty("TRACKER_CAPACITY") {
            self.capacity = v
                .parse()
                .with_context(|| format!("TRACKER_CAPACITY={v} is not a number"))?;
        }
        if let Some(v) = env_nonempty("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = v
                .parse()
                .with_context(|| format!("POLL_INTERVAL_SECS={v} is not a number"))?;
        }
        if let Some(v) = env_nonempty("METRICS_ADDR") {
            self.metrics_addr = Some(v);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.capacity > 0, "capacity must be > 0");
        ensure!(self.poll_interval_secs > 0, "poll_interval_secs must be > 0");
        ensure!(self.ingest_buffer > 0, "ingest_buffer must be > 0");
        ensure!(self.change_buffer > 0, "change_buffer must be > 0");
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
