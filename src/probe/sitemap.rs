//! HTTP sitemap fetcher

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use reqwest::Client;

use crate::config::ValidatorConfig;
use crate::error::{AuditError, Result};
use crate::models::SitemapSnapshot;
use crate::ports::SitemapFetcher;

const LOC_PATTERN: &str = r"<loc>\s*([^<\s]+)\s*</loc>";

/// Fetches `https://<domain>/sitemap.xml`.
#[derive(Debug, Clone)]
pub struct HttpSitemapFetcher {
    client: Client,
    loc: Regex,
}

impl HttpSitemapFetcher {
    pub fn new(config: &ValidatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AuditError::InvalidConfig(format!("HTTP client: {}", e)))?;
        let loc = Regex::new(LOC_PATTERN).map_err(|e| AuditError::Internal(e.to_string()))?;
        Ok(Self { client, loc })
    }

    /// Pulls every `<loc>` out of a sitemap document.
    pub fn extract_locations(&self, xml: &str) -> Vec<String> {
        self.loc
            .captures_iter(xml)
            .map(|caps| caps[1].to_string())
            .collect()
    }
}

#[async_trait]
impl SitemapFetcher for HttpSitemapFetcher {
    async fn fetch(&self, domain: &str) -> Result<SitemapSnapshot> {
        let url = format!("https://{}/sitemap.xml", domain);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuditError::Probe(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AuditError::Probe(format!(
                "{}: HTTP {}",
                url,
                response.status().as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuditError::Probe(format!("{}: {}", url, e)))?;

        let mut snapshot = SitemapSnapshot::new(self.extract_locations(&body), Utc::now());
        snapshot.metadata.insert("source".to_string(), url);
        Ok(snapshot)
    }
}
