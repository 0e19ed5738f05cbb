//! Sitemap snapshot model

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The URL set of one domain's sitemap at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapSnapshot {
    pub urls: BTreeSet<String>,
    pub fetched_at: DateTime<Utc>,
    pub page_count: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SitemapSnapshot {
    pub fn new(urls: impl IntoIterator<Item = String>, fetched_at: DateTime<Utc>) -> Self {
        let urls: BTreeSet<String> = urls.into_iter().collect();
        Self {
            page_count: urls.len(),
            urls,
            fetched_at,
            metadata: BTreeMap::new(),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }
}

/// Cache key of a domain's sitemap.
pub fn sitemap_key(domain: &str) -> String {
    format!("sitemap:{}", domain)
}
