//! Probe Module
//!
//! Reference [`Prober`] implementations: HTTP for external links, filesystem and
//! route-table checks for local ones, and a router that picks between the two
//! by link kind.

mod http;
mod local;
mod sitemap;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ProbeOutcome, ScannedLink};
use crate::ports::Prober;

pub use http::HttpProber;
pub use local::LocalProber;
pub use sitemap::HttpSitemapFetcher;

/// Sends local links to one prober and external links to another.
#[derive(Clone)]
pub struct RoutingProber {
    local: Arc<dyn Prober>,
    remote: Arc<dyn Prober>,
}

impl RoutingProber {
    pub fn new(local: Arc<dyn Prober>, remote: Arc<dyn Prober>) -> Self {
        Self { local, remote }
    }
}

#[async_trait]
impl Prober for RoutingProber {
    async fn probe(&self, link: &ScannedLink) -> Result<ProbeOutcome> {
        if link.link_kind.is_local() {
            self.local.probe(link).await
        } else {
            self.remote.probe(link).await
        }
    }
}
