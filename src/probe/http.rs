//! HTTP prober
//!
//! Checks external links with a HEAD request, falling back to GET when the server
//! refuses HEAD. Redirects are reported, not followed. Transport failures and 5xx
//! answers are retried with exponential backoff before the prober gives up.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::config::ValidatorConfig;
use crate::error::{AuditError, Result};
use crate::models::{LinkStatus, ProbeOutcome, ScannedLink};
use crate::ports::Prober;

const USER_AGENT: &str = concat!("link-audit/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    retry_attempts: u32,
    base_delay: Duration,
}

impl HttpProber {
    pub fn new(config: &ValidatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuditError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    async fn probe_once(&self, url: &str) -> std::result::Result<ProbeOutcome, reqwest::Error> {
        let started = Instant::now();
        let mut response = self.client.head(url).send().await?;

        if matches!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            response = self.client.get(url).send().await?;
        }

        Ok(analyze_response(&response, started.elapsed().as_millis() as u64))
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, link: &ScannedLink) -> Result<ProbeOutcome> {
        let started = Instant::now();
        let mut last_error = String::new();

        for attempt in 0..self.retry_attempts {
            let last_attempt = attempt + 1 == self.retry_attempts;

            match self.probe_once(&link.url).await {
                Ok(outcome) if is_server_error(&outcome) && !last_attempt => {
                    last_error = outcome.error_detail.unwrap_or_default();
                }
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_timeout() && last_attempt => {
                    return Ok(ProbeOutcome::timeout(started.elapsed().as_millis() as u64));
                }
                Err(e) => last_error = categorize_error(&e),
            }

            if !last_attempt {
                let delay = self.base_delay * 2u32.saturating_pow(attempt);
                debug!(
                    "Retrying {} in {:?} (attempt {}/{}): {}",
                    link.url,
                    delay,
                    attempt + 1,
                    self.retry_attempts,
                    last_error
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(AuditError::Probe(last_error))
    }
}

fn is_server_error(outcome: &ProbeOutcome) -> bool {
    outcome.status == LinkStatus::Broken
        && outcome.status_code.map(|c| c >= 500).unwrap_or(false)
}

// Classifies an HTTP answer:
// - 2xx: valid
// - 3xx: redirect (target from Location)
// - 429: unknown, the host is throttling us
// - everything else: broken
fn analyze_response(response: &Response, latency_ms: u64) -> ProbeOutcome {
    let status = response.status();
    let code = status.as_u16();

    if status.is_success() {
        ProbeOutcome::valid(Some(code), latency_ms)
    } else if status.is_redirection() {
        let target = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        ProbeOutcome::redirect(code, target, latency_ms)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ProbeOutcome {
            status: LinkStatus::Unknown,
            status_code: Some(code),
            redirect_target: None,
            error_detail: Some("rate limited by host".to_string()),
            latency_ms,
        }
    } else {
        ProbeOutcome::broken(Some(code), format!("HTTP {}", code), latency_ms)
    }
}

fn categorize_error(error: &reqwest::Error) -> String {
    let text = error.to_string();

    if error.is_timeout() {
        "Request timed out".to_string()
    } else if error.is_redirect() {
        "Too many redirects".to_string()
    } else if error.is_connect() {
        if text.contains("dns") {
            "Could not resolve hostname".to_string()
        } else {
            "Connection failed".to_string()
        }
    } else if text.contains("certificate") || text.contains("ssl") {
        "SSL certificate error".to_string()
    } else {
        text
    }
}
