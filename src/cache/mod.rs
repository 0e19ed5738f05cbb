//! Cache Module
//!
//! Namespaced in-memory caching with TTL expiration, global LRU eviction under a
//! memory budget, and snapshot/restore.

mod entry;
mod handle;
mod lru;
mod namespace;
mod snapshot;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use handle::AuditCache;
pub use lru::LruTracker;
pub use namespace::{CacheNamespace, LINK_ENTRY_BYTES, REPORT_ENTRY_BYTES, SITEMAP_ENTRY_BYTES};
pub use snapshot::{CacheSnapshot, NamespaceMaps, SNAPSHOT_VERSION};
pub use stats::CacheStats;
pub use store::{CacheStore, Cacheable, EntryKey};

/// Fraction of a TTL left at which an entry becomes a refresh candidate.
pub const REFRESH_THRESHOLD_RATIO: f64 = 0.1;
