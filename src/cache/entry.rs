//! Cache Entry Module
//!
//! Defines the envelope stored for every cached value, with TTL and access metadata.

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A cached value plus the bookkeeping needed for expiry and LRU eviction.
///
/// All timestamps are Unix milliseconds taken from the cache's clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Insertion timestamp
    pub created_at: u64,
    /// Time to live in milliseconds
    pub ttl_ms: u64,
    /// Number of successful reads
    pub hit_count: u64,
    /// Last insertion or successful read
    pub last_accessed_at: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry stamped at `now`.
    pub fn new(data: T, ttl_ms: u64, now: u64) -> Self {
        Self {
            data,
            created_at: now,
            ttl_ms,
            hit_count: 0,
            last_accessed_at: now,
        }
    }

    // == Is Expired ==
    /// An entry is logically absent once more than `ttl_ms` has elapsed since creation.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > self.ttl_ms
    }

    // == Time To Live ==
    /// Remaining lifetime in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        (self.created_at + self.ttl_ms).saturating_sub(now)
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self, now: u64) {
        self.hit_count += 1;
        self.last_accessed_at = now;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("value".to_string(), 1_000, 5_000);

        assert_eq!(entry.data, "value");
        assert_eq!(entry.created_at, 5_000);
        assert_eq!(entry.last_accessed_at, 5_000);
        assert_eq!(entry.hit_count, 0);
        assert!(!entry.is_expired(5_000));
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(1u8, 100, 0);

        assert!(!entry.is_expired(50));
        assert!(entry.is_expired(150));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        // Exactly ttl elapsed is still present; strictly more is absent
        let entry = CacheEntry::new(1u8, 100, 0);
        assert!(!entry.is_expired(100));
        assert!(entry.is_expired(101));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new(1u8, 10_000, 1_000);

        assert_eq!(entry.ttl_remaining_ms(1_000), 10_000);
        assert_eq!(entry.ttl_remaining_ms(6_000), 5_000);
        assert_eq!(entry.ttl_remaining_ms(20_000), 0);
    }

    #[test]
    fn test_touch_updates_access_metadata() {
        let mut entry = CacheEntry::new(1u8, 10_000, 1_000);
        entry.touch(2_000);
        entry.touch(3_000);

        assert_eq!(entry.hit_count, 2);
        assert_eq!(entry.last_accessed_at, 3_000);
        assert_eq!(entry.created_at, 1_000);
    }
}
