//! Local prober
//!
//! Checks internal routes against a known route table, downloads against the
//! site's filesystem root, and anchors against the known anchor set. No network.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use crate::error::{AuditError, Result};
use crate::models::{LinkKind, LinkStatus, ProbeOutcome, ScannedLink};
use crate::ports::Prober;

#[derive(Debug, Clone, Default)]
pub struct LocalProber {
    routes: HashSet<String>,
    anchors: HashSet<String>,
    site_root: Option<PathBuf>,
}

impl LocalProber {
    pub fn new(site_root: Option<PathBuf>) -> Self {
        Self {
            site_root,
            ..Self::default()
        }
    }

    pub fn with_routes(mut self, routes: impl IntoIterator<Item = String>) -> Self {
        self.routes = routes.into_iter().map(|r| normalize_route(&r)).collect();
        self
    }

    /// Anchor names without the leading `#`.
    pub fn with_anchors(mut self, anchors: impl IntoIterator<Item = String>) -> Self {
        self.anchors = anchors.into_iter().collect();
        self
    }

    async fn check_internal(&self, url: &str) -> ProbeOutcome {
        let route = normalize_route(url);
        if self.routes.contains(&route) {
            return ProbeOutcome::valid(Some(200), 0);
        }

        // Static pages on disk also count as routes
        let on_disk = match self.resolve(&route) {
            Some(path) => {
                file_exists(&path).await || file_exists(&path.join("index.html")).await
            }
            None => false,
        };

        if on_disk {
            ProbeOutcome::valid(Some(200), 0)
        } else {
            ProbeOutcome::broken(Some(404), format!("no route for {}", route), 0)
        }
    }

    async fn check_download(&self, url: &str) -> ProbeOutcome {
        if self.site_root.is_none() {
            return ProbeOutcome {
                status: LinkStatus::Unknown,
                status_code: None,
                redirect_target: None,
                error_detail: Some("no site root configured".to_string()),
                latency_ms: 0,
            };
        }

        let route = normalize_route(url);
        match self.resolve(&route) {
            Some(path) if file_exists(&path).await => ProbeOutcome::valid(Some(200), 0),
            Some(_) => ProbeOutcome::broken(Some(404), format!("file not found: {}", route), 0),
            None => ProbeOutcome::broken(None, format!("path escapes site root: {}", route), 0),
        }
    }

    fn check_anchor(&self, url: &str) -> ProbeOutcome {
        let fragment = url.rsplit_once('#').map(|(_, f)| f).unwrap_or("");
        if fragment.is_empty() {
            ProbeOutcome::broken(None, "empty anchor", 0)
        } else if self.anchors.is_empty() || self.anchors.contains(fragment) {
            ProbeOutcome::valid(None, 0)
        } else {
            ProbeOutcome::broken(Some(404), format!("anchor #{} not found", fragment), 0)
        }
    }

    /// Maps a route onto the site root, refusing `..` traversal.
    fn resolve(&self, route: &str) -> Option<PathBuf> {
        let root = self.site_root.as_ref()?;
        let relative = Path::new(route.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return None;
        }
        Some(root.join(relative))
    }
}

#[async_trait]
impl Prober for LocalProber {
    async fn probe(&self, link: &ScannedLink) -> Result<ProbeOutcome> {
        let started = Instant::now();
        let mut outcome = match link.link_kind {
            LinkKind::Internal => self.check_internal(&link.url).await,
            LinkKind::Download => self.check_download(&link.url).await,
            LinkKind::Anchor => self.check_anchor(&link.url),
            LinkKind::External => {
                return Err(AuditError::Probe(format!(
                    "{} is external; local prober cannot check it",
                    link.url
                )))
            }
        };
        outcome.latency_ms = started.elapsed().as_millis() as u64;
        Ok(outcome)
    }
}

/// Strips origin, query and fragment, and any trailing slash.
fn normalize_route(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
