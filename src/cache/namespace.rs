//! Cache namespaces
//!
//! Each namespace has its own default TTL but all share one memory budget and LRU order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Estimated footprint of one link validation result.
pub const LINK_ENTRY_BYTES: u64 = 512;
/// Estimated footprint of one sitemap snapshot.
pub const SITEMAP_ENTRY_BYTES: u64 = 50 * 1024;
/// Estimated footprint of one generated report.
pub const REPORT_ENTRY_BYTES: u64 = 10 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheNamespace {
    Links,
    Sitemap,
    Reports,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 3] = [
        CacheNamespace::Links,
        CacheNamespace::Sitemap,
        CacheNamespace::Reports,
    ];

    /// Fixed per-entry byte estimate used for memory accounting.
    pub fn estimated_entry_bytes(self) -> u64 {
        match self {
            CacheNamespace::Links => LINK_ENTRY_BYTES,
            CacheNamespace::Sitemap => SITEMAP_ENTRY_BYTES,
            CacheNamespace::Reports => REPORT_ENTRY_BYTES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CacheNamespace::Links => "links",
            CacheNamespace::Sitemap => "sitemap",
            CacheNamespace::Reports => "reports",
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheNamespace {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "links" => Ok(CacheNamespace::Links),
            "sitemap" => Ok(CacheNamespace::Sitemap),
            "reports" => Ok(CacheNamespace::Reports),
            other => Err(AuditError::InvalidRequest(format!(
                "unknown cache namespace '{}'",
                other
            ))),
        }
    }
}
