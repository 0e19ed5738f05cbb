//! Snapshot persistence
//!
//! Writes the cache snapshot as JSON and reads it back on start-up. Saving goes
//! through a temporary file and a rename so a crash never leaves a torn file.

use std::path::Path;

use tracing::{info, warn};

use crate::cache::{AuditCache, CacheSnapshot, SNAPSHOT_VERSION};
use crate::error::{AuditError, Result};

/// Saves the cache to `path`; returns the number of entries written.
pub async fn save_snapshot(cache: &AuditCache, path: &Path) -> Result<usize> {
    let snapshot = cache.snapshot().await;
    let count = snapshot.entries.len();
    let bytes = serde_json::to_vec(&snapshot)
        .map_err(|e| AuditError::Snapshot(format!("serialize failed: {}", e)))?;

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| AuditError::Snapshot(format!("cannot write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AuditError::Snapshot(format!("cannot replace {}: {}", path.display(), e)))?;

    info!("Saved cache snapshot with {} entries to {}", count, path.display());
    Ok(count)
}

/// Restores the cache from `path`; returns the number of live entries.
///
/// A missing file is not an error: the cache simply starts empty.
pub async fn load_snapshot(cache: &AuditCache, path: &Path) -> Result<usize> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No cache snapshot at {}, starting empty", path.display());
            return Ok(0);
        }
        Err(e) => {
            return Err(AuditError::Snapshot(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)
        .map_err(|e| AuditError::Snapshot(format!("malformed {}: {}", path.display(), e)))?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(AuditError::Snapshot(format!(
            "snapshot version {} is newer than supported version {}",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }

    let stored = snapshot.entries.len();
    let dropped = cache.restore(snapshot).await;
    if dropped > 0 {
        warn!("Dropped {} expired entries while restoring snapshot", dropped);
    }
    let live = stored.saturating_sub(dropped);
    info!("Restored {} cache entries from {}", live, path.display());
    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::CacheConfig;
    use crate::models::{ProbeOutcome, ValidationResult};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn cache(clock: Arc<ManualClock>) -> AuditCache {
        AuditCache::new(&CacheConfig::default(), clock)
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let clock = Arc::new(ManualClock::new(1_000_000));

        let original = cache(clock.clone());
        let result = ValidationResult::from_outcome(
            "https://a.test/",
            ProbeOutcome::valid(Some(200), 12),
            clock.now_utc(),
        );
        original.set_link(result.clone()).await;
        original.set_report("weekly", json!({ "broken": 0 })).await;

        assert_eq!(save_snapshot(&original, &path).await.unwrap(), 2);
        assert!(!path.with_extension("tmp").exists());

        let restored = cache(clock);
        assert_eq!(load_snapshot(&restored, &path).await.unwrap(), 2);
        assert_eq!(restored.get_link("https://a.test/").await, Some(result));
        assert!(restored.get_report("weekly").await.is_some());
    }

    #[tokio::test]
    async fn test_load_drops_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let clock = Arc::new(ManualClock::new(1_000_000));

        let original = cache(clock.clone());
        original
            .set("short", json!(1), Some(Duration::from_millis(100)))
            .await;
        original.set_report("long", json!(2)).await;
        save_snapshot(&original, &path).await.unwrap();

        clock.advance_ms(150);
        let restored = cache(clock);
        assert_eq!(load_snapshot(&restored, &path).await.unwrap(), 1);
        assert!(restored.get_report("short").await.is_none());
        assert!(restored.get_report("long").await.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let loaded = load_snapshot(&cache(clock), &dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(loaded, 0);
    }

    #[tokio::test]
    async fn test_rejects_newer_version_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let clock = Arc::new(ManualClock::new(0));

        std::fs::write(&path, r#"{"version":99,"taken_at":0,"entries":{}}"#).unwrap();
        assert!(load_snapshot(&cache(clock.clone()), &path).await.is_err());

        std::fs::write(&path, "not json").unwrap();
        assert!(load_snapshot(&cache(clock), &path).await.is_err());
    }
}
