// src/item.rs
//! Tracked stories and the derivations applied to them on first ingestion.

use serde::{Deserialize, Serialize};
use url::Url;

/// Permalink template for an item's discussion page.
pub const HN_DISCUSS_LINK: &str = "https://news.ycombinator.com/item?id=";

/// Prefixes stripped from a bare hostname when it has fewer than two labels.
const HOST_PREFIXES: [&str; 5] = ["http://", "https://", "www.", "www2.", "www3."];

/// Where an item came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemSource {
    File,
    #[default]
    Hn,
}

impl ItemSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSource::File => "file",
            ItemSource::Hn => "hn",
        }
    }
}

/// One tracked story. HN fields come straight from the item endpoint (or the
/// input file); `added`, `domain`, `from` and `discuss_link` are filled in
/// by the ingestion consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Item {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub by: String,
    #[serde(default)]
    pub score: i64,
    /// Creation time reported by the source (unix seconds).
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub descendants: i64,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,

    /// Unix seconds when the tracker first saw this item. 0 = unset.
    #[serde(default)]
    pub added: i64,
    #[serde(default)]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ItemSource>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub discuss_link: String,
}

impl Item {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            ..Self::default()
        }
    }

    /// Effective provenance: unset means the remote source.
    pub fn source(&self) -> ItemSource {
        self.from.unwrap_or_default()
    }

    pub fn is_from_file(&self) -> bool {
        self.source() == ItemSource::File
    }
}

/// Reduce a story URL to its registrable two-label domain.
///
/// `https://www.example.com/x` and `example.com/x` both give `example.com`.
/// Hosts with a single label fall back to the prefix-stripped hostname.
/// Empty input gives an empty domain.
pub fn domain_from_url(link: &str) -> Result<String, url::ParseError> {
    let link = link.trim();
    if link.is_empty() {
        return Ok(String::new());
    }

    let parsed = match Url::parse(link) {
        Ok(u) if u.host_str().is_some() => u,
        // scheme-less links ("example.com/x") parse as relative or as an
        // opaque "scheme:" url; retry them as http
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("http://{link}"))?
        }
        Err(e) => return Err(e),
    };

    let host = parsed.host_str().unwrap_or_default();
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() >= 2 {
        return Ok(format!(
            "{}.{}",
            labels[labels.len() - 2],
            labels[labels.len() - 1]
        ));
    }

    Ok(strip_host_prefixes(host))
}

fn strip_host_prefixes(host: &str) -> String {
    let mut out = host.to_string();
    for p in HOST_PREFIXES {
        out = out.replace(p, "");
    }
    out
}

pub fn discuss_link(id: u64) -> String {
    format!("{HN_DISCUSS_LINK}{id}")
}
