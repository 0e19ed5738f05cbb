//! Link sources for full audits

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AuditError, Result};
use crate::models::ScannedLink;
use crate::ports::LinkSource;

/// A fixed list of links.
#[derive(Debug, Clone, Default)]
pub struct StaticLinkSource {
    links: Vec<ScannedLink>,
}

impl StaticLinkSource {
    pub fn new(links: Vec<ScannedLink>) -> Self {
        Self { links }
    }
}

#[async_trait]
impl LinkSource for StaticLinkSource {
    async fn discover(&self) -> Result<Vec<ScannedLink>> {
        Ok(self.links.clone())
    }
}

/// Reads a JSON array of links from disk on every audit.
#[derive(Debug, Clone)]
pub struct FileLinkSource {
    path: PathBuf,
}

impl FileLinkSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LinkSource for FileLinkSource {
    async fn discover(&self) -> Result<Vec<ScannedLink>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            AuditError::Internal(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let links: Vec<ScannedLink> = serde_json::from_str(&raw).map_err(|e| {
            AuditError::InvalidRequest(format!("malformed {}: {}", self.path.display(), e))
        })?;
        debug!("Loaded {} links from {}", links.len(), self.path.display());
        Ok(links)
    }
}
