//! Refresh queue
//!
//! Pending re-population work ordered by urgency. Within one urgency level items
//! keep submission order. Deferred items stay queued until their start time.

use std::time::Duration;

use serde::Serialize;

use crate::models::{EventKind, ScannedLink};

/// Most items drained in one refresh batch, whatever the strategy allows.
pub const MAX_REFRESH_BATCH: usize = 10;

// == Strategy ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPriority {
    Urgent,
    Normal,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStrategy {
    pub priority: RefreshPriority,
    pub batch_size: usize,
    pub retry_attempts: u32,
    /// How long an item waits in the queue before it may run
    pub delay: Duration,
}

impl RefreshStrategy {
    pub const IMMEDIATE: Self = Self {
        priority: RefreshPriority::Urgent,
        batch_size: 5,
        retry_attempts: 5,
        delay: Duration::ZERO,
    };

    pub const DEFERRED: Self = Self {
        priority: RefreshPriority::Normal,
        batch_size: 10,
        retry_attempts: 3,
        delay: Duration::from_secs(60),
    };

    pub const BACKGROUND: Self = Self {
        priority: RefreshPriority::Background,
        batch_size: 20,
        retry_attempts: 1,
        delay: Duration::ZERO,
    };

    pub fn for_event(kind: EventKind) -> Self {
        match kind {
            EventKind::Deployment | EventKind::ErrorRecovery => Self::IMMEDIATE,
            EventKind::ContentChange => Self::DEFERRED,
            EventKind::Manual | EventKind::Scheduled => Self::BACKGROUND,
        }
    }

    /// Items taken per batch under this strategy.
    pub fn drain_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_REFRESH_BATCH)
    }
}

// == Queue ==
/// What a refresh re-populates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTarget {
    Link(ScannedLink),
    /// Domain whose sitemap is re-fetched
    Sitemap(String),
}

impl RefreshTarget {
    pub fn describe(&self) -> &str {
        match self {
            RefreshTarget::Link(link) => &link.url,
            RefreshTarget::Sitemap(domain) => domain,
        }
    }

    fn same_as(&self, other: &RefreshTarget) -> bool {
        match (self, other) {
            (RefreshTarget::Link(a), RefreshTarget::Link(b)) => a.url == b.url,
            (RefreshTarget::Sitemap(a), RefreshTarget::Sitemap(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshItem {
    pub target: RefreshTarget,
    pub strategy: RefreshStrategy,
    pub not_before_ms: u64,
}

#[derive(Debug, Default)]
pub struct RefreshQueue {
    items: Vec<RefreshItem>,
}

impl RefreshQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an item. A target already queued at the same or higher urgency is
    /// left alone; a lower-urgency duplicate is replaced. Returns whether the
    /// item was queued.
    pub fn push(&mut self, item: RefreshItem) -> bool {
        if let Some(pos) = self.items.iter().position(|q| q.target.same_as(&item.target)) {
            if self.items[pos].strategy.priority <= item.strategy.priority {
                return false;
            }
            self.items.remove(pos);
        }
        let at = self
            .items
            .partition_point(|q| q.strategy.priority <= item.strategy.priority);
        self.items.insert(at, item);
        true
    }

    /// Removes the next batch of items ready at `now_ms`: the most urgent ready
    /// item plus following ready items of the same urgency, up to that item's
    /// drain size.
    pub fn take_batch(&mut self, now_ms: u64) -> Vec<RefreshItem> {
        let Some(head) = self.items.iter().find(|q| q.not_before_ms <= now_ms) else {
            return Vec::new();
        };
        let priority = head.strategy.priority;
        let limit = head.strategy.drain_size();

        let mut batch = Vec::with_capacity(limit);
        let mut i = 0;
        while i < self.items.len() && batch.len() < limit {
            let item = &self.items[i];
            if item.strategy.priority == priority && item.not_before_ms <= now_ms {
                batch.push(self.items.remove(i));
            } else {
                i += 1;
            }
        }
        batch
    }

    pub fn has_ready(&self, now_ms: u64) -> bool {
        self.items.iter().any(|q| q.not_before_ms <= now_ms)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkKind, LinkPriority};

    fn item(url: &str, strategy: RefreshStrategy, not_before_ms: u64) -> RefreshItem {
        RefreshItem {
            target: RefreshTarget::Link(ScannedLink::new(url, LinkKind::Internal, LinkPriority::Medium)),
            strategy,
            not_before_ms,
        }
    }

    fn urls(batch: &[RefreshItem]) -> Vec<&str> {
        batch.iter().map(|i| i.target.describe()).collect()
    }

    #[test]
    fn test_strategy_per_event() {
        assert_eq!(RefreshStrategy::for_event(EventKind::Deployment), RefreshStrategy::IMMEDIATE);
        assert_eq!(RefreshStrategy::for_event(EventKind::ErrorRecovery), RefreshStrategy::IMMEDIATE);
        assert_eq!(RefreshStrategy::for_event(EventKind::ContentChange), RefreshStrategy::DEFERRED);
        assert_eq!(RefreshStrategy::for_event(EventKind::Manual), RefreshStrategy::BACKGROUND);
        assert!(RefreshStrategy::IMMEDIATE.retry_attempts > RefreshStrategy::BACKGROUND.retry_attempts);
        assert!(RefreshStrategy::IMMEDIATE.batch_size < RefreshStrategy::BACKGROUND.batch_size);
        assert_eq!(RefreshStrategy::BACKGROUND.drain_size(), MAX_REFRESH_BATCH);
    }

    #[test]
    fn test_urgent_drains_first() {
        let mut queue = RefreshQueue::new();
        queue.push(item("/bg", RefreshStrategy::BACKGROUND, 0));
        queue.push(item("/urgent", RefreshStrategy::IMMEDIATE, 0));

        assert_eq!(urls(&queue.take_batch(0)), vec!["/urgent"]);
        assert_eq!(urls(&queue.take_batch(0)), vec!["/bg"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_priority_keeps_submission_order() {
        let mut queue = RefreshQueue::new();
        for url in ["/1", "/2", "/3"] {
            queue.push(item(url, RefreshStrategy::BACKGROUND, 0));
        }
        assert_eq!(urls(&queue.take_batch(0)), vec!["/1", "/2", "/3"]);
    }

    #[test]
    fn test_batch_capped_by_strategy() {
        let mut queue = RefreshQueue::new();
        for i in 0..8 {
            queue.push(item(&format!("/{}", i), RefreshStrategy::IMMEDIATE, 0));
        }
        assert_eq!(queue.take_batch(0).len(), RefreshStrategy::IMMEDIATE.batch_size);
        assert_eq!(queue.take_batch(0).len(), 3);
    }

    #[test]
    fn test_deferred_waits() {
        let mut queue = RefreshQueue::new();
        queue.push(item("/later", RefreshStrategy::DEFERRED, 60_000));
        assert!(!queue.has_ready(0));
        assert!(queue.take_batch(0).is_empty());
        assert_eq!(queue.take_batch(60_000).len(), 1);
    }

    #[test]
    fn test_duplicate_upgraded_not_doubled() {
        let mut queue = RefreshQueue::new();
        assert!(queue.push(item("/a", RefreshStrategy::BACKGROUND, 0)));
        assert!(!queue.push(item("/a", RefreshStrategy::BACKGROUND, 0)));
        assert!(queue.push(item("/a", RefreshStrategy::IMMEDIATE, 0)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.take_batch(0)[0].strategy, RefreshStrategy::IMMEDIATE);
    }
}
