//! Cache snapshot format
//!
//! A snapshot carries every namespace plus the hit/miss counters. Fields may be
//! added over time; readers ignore unknown fields and default missing ones.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::models::{SitemapSnapshot, ValidationResult};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Per-namespace entry maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceMaps {
    #[serde(default)]
    pub links: HashMap<String, CacheEntry<ValidationResult>>,
    #[serde(default)]
    pub sitemap: HashMap<String, CacheEntry<SitemapSnapshot>>,
    #[serde(default)]
    pub reports: HashMap<String, CacheEntry<serde_json::Value>>,
}

impl NamespaceMaps {
    pub fn len(&self) -> usize {
        self.links.len() + self.sitemap.len() + self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: u32,
    /// Unix milliseconds when the snapshot was taken
    pub taken_at: u64,
    pub entries: NamespaceMaps,
    #[serde(default)]
    pub hits: u64,
    #[serde(default)]
    pub misses: u64,
    #[serde(default)]
    pub evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let json = r#"{"version":1,"taken_at":0,"entries":{}}"#;
        let snapshot: CacheSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.hits, 0);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"version":2,"taken_at":5,"entries":{"links":{}},"compression":"none"}"#;
        let snapshot: CacheSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.taken_at, 5);
    }
}
