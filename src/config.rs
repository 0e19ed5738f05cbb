//! Configuration Module
//!
//! Handles loading and validating service configuration from environment variables.
//! Each component gets its own struct; [`Config::from_env`] fails fast on malformed
//! values and [`Config::validate`] rejects values that would make a component unusable.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};

use crate::clock::MAX_SPAN_SECS;
use crate::error::{AuditError, Result};

// == Cache Config ==
/// TTL cache parameters.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL in seconds for link validation results
    pub link_results_ttl: u64,
    /// Default TTL in seconds for sitemap snapshots
    pub sitemap_data_ttl: u64,
    /// Default TTL in seconds for generated reports
    pub report_data_ttl: u64,
    /// Memory budget in megabytes across all namespaces
    pub max_memory_mb: u64,
    /// Interval in seconds between expired-entry sweeps
    pub cleanup_interval: u64,
    /// Entries removed per eviction step before yielding
    pub eviction_batch_size: usize,
}

impl CacheConfig {
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_mb * 1024 * 1024
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            link_results_ttl: 6 * 60 * 60,
            sitemap_data_ttl: 24 * 60 * 60,
            report_data_ttl: 7 * 24 * 60 * 60,
            max_memory_mb: 100,
            cleanup_interval: 60 * 60,
            eviction_batch_size: 50,
        }
    }
}

// == Validator Config ==
/// Probing and batch validation parameters.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Attempts the HTTP prober makes before giving up on a link
    pub retry_attempts: u32,
    /// Per-request timeout in seconds
    pub timeout: u64,
    /// External links probed per rate-limited batch
    pub batch_size: usize,
    /// Pause in milliseconds between external batches
    pub rate_limit_delay_ms: u64,
    /// Local links probed concurrently per chunk
    pub local_concurrency: usize,
    /// First retry delay in milliseconds; doubles per attempt
    pub retry_base_delay_ms: u64,
}

impl ValidatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            timeout: 10,
            batch_size: 10,
            rate_limit_delay_ms: 1000,
            local_concurrency: 20,
            retry_base_delay_ms: 1000,
        }
    }
}

// == Scheduler Config ==
/// Audit scheduling parameters.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum jobs in the running state at once
    pub max_concurrent_audits: usize,
    /// Seconds a job may run before it is reclaimed as failed
    pub audit_timeout: u64,
    /// Seconds a pending job may wait past its scheduled time before cancellation
    pub max_pending_age: u64,
    /// UTC time of the daily full audit
    pub daily_audit_time: NaiveTime,
    /// Day of the weekly report
    pub weekly_report_day: Weekday,
    /// UTC time of the weekly report
    pub weekly_report_time: NaiveTime,
    /// Seconds between quick checks of previously broken links
    pub quick_check_interval: u64,
    /// Seconds between alert analyses
    pub alert_analysis_interval: u64,
    /// Seconds between scheduler queue pumps
    pub queue_pump_interval: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_audits: 2,
            audit_timeout: 30 * 60,
            max_pending_age: 24 * 60 * 60,
            daily_audit_time: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default(),
            weekly_report_day: Weekday::Mon,
            weekly_report_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            quick_check_interval: 4 * 60 * 60,
            alert_analysis_interval: 60 * 60,
            queue_pump_interval: 30,
        }
    }
}

// == Server Config ==
/// Process-level settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port
    pub server_port: u16,
    /// Where the cache snapshot is saved on shutdown and restored on start
    pub snapshot_path: Option<PathBuf>,
    /// JSON file listing the links to audit
    pub links_file: Option<PathBuf>,
    /// Filesystem root used to check download links
    pub site_root: Option<PathBuf>,
    /// Own origin; absolute URLs under it are treated as internal
    pub site_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            snapshot_path: None,
            links_file: None,
            site_root: None,
            site_origin: None,
        }
    }
}

// == Config ==
/// Complete service configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub cache: CacheConfig,
    pub validator: ValidatorConfig,
    pub scheduler: SchedulerConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Unset variables fall back to [`Config::default`]; set-but-malformed
    /// variables are an error.
    ///
    /// # Environment Variables
    /// - `LINK_RESULTS_TTL`, `SITEMAP_DATA_TTL`, `REPORT_DATA_TTL` - seconds
    /// - `MAX_MEMORY_MB`, `CLEANUP_INTERVAL`, `EVICTION_BATCH_SIZE`
    /// - `RETRY_ATTEMPTS`, `PROBE_TIMEOUT`, `BATCH_SIZE`, `RATE_LIMIT_DELAY_MS`,
    ///   `LOCAL_CONCURRENCY`, `RETRY_BASE_DELAY_MS`
    /// - `MAX_CONCURRENT_AUDITS`, `AUDIT_TIMEOUT`, `MAX_PENDING_AGE`,
    ///   `DAILY_AUDIT_TIME` (HH:MM), `WEEKLY_REPORT_DAY` (mon..sun),
    ///   `WEEKLY_REPORT_TIME` (HH:MM), `QUICK_CHECK_INTERVAL`,
    ///   `ALERT_ANALYSIS_INTERVAL`, `QUEUE_PUMP_INTERVAL`
    /// - `SERVER_PORT`, `SNAPSHOT_PATH`, `LINKS_FILE`, `SITE_ROOT`, `SITE_ORIGIN`
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let cache = CacheConfig {
            link_results_ttl: env_or("LINK_RESULTS_TTL", defaults.cache.link_results_ttl)?,
            sitemap_data_ttl: env_or("SITEMAP_DATA_TTL", defaults.cache.sitemap_data_ttl)?,
            report_data_ttl: env_or("REPORT_DATA_TTL", defaults.cache.report_data_ttl)?,
            max_memory_mb: env_or("MAX_MEMORY_MB", defaults.cache.max_memory_mb)?,
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cache.cleanup_interval)?,
            eviction_batch_size: env_or(
                "EVICTION_BATCH_SIZE",
                defaults.cache.eviction_batch_size,
            )?,
        };

        let validator = ValidatorConfig {
            retry_attempts: env_or("RETRY_ATTEMPTS", defaults.validator.retry_attempts)?,
            timeout: env_or("PROBE_TIMEOUT", defaults.validator.timeout)?,
            batch_size: env_or("BATCH_SIZE", defaults.validator.batch_size)?,
            rate_limit_delay_ms: env_or(
                "RATE_LIMIT_DELAY_MS",
                defaults.validator.rate_limit_delay_ms,
            )?,
            local_concurrency: env_or("LOCAL_CONCURRENCY", defaults.validator.local_concurrency)?,
            retry_base_delay_ms: env_or(
                "RETRY_BASE_DELAY_MS",
                defaults.validator.retry_base_delay_ms,
            )?,
        };

        let scheduler = SchedulerConfig {
            max_concurrent_audits: env_or(
                "MAX_CONCURRENT_AUDITS",
                defaults.scheduler.max_concurrent_audits,
            )?,
            audit_timeout: env_or("AUDIT_TIMEOUT", defaults.scheduler.audit_timeout)?,
            max_pending_age: env_or("MAX_PENDING_AGE", defaults.scheduler.max_pending_age)?,
            daily_audit_time: env_time_or(
                "DAILY_AUDIT_TIME",
                defaults.scheduler.daily_audit_time,
            )?,
            weekly_report_day: env_or("WEEKLY_REPORT_DAY", defaults.scheduler.weekly_report_day)?,
            weekly_report_time: env_time_or(
                "WEEKLY_REPORT_TIME",
                defaults.scheduler.weekly_report_time,
            )?,
            quick_check_interval: env_or(
                "QUICK_CHECK_INTERVAL",
                defaults.scheduler.quick_check_interval,
            )?,
            alert_analysis_interval: env_or(
                "ALERT_ANALYSIS_INTERVAL",
                defaults.scheduler.alert_analysis_interval,
            )?,
            queue_pump_interval: env_or(
                "QUEUE_PUMP_INTERVAL",
                defaults.scheduler.queue_pump_interval,
            )?,
        };

        let server = ServerConfig {
            server_port: env_or("SERVER_PORT", defaults.server.server_port)?,
            snapshot_path: env::var("SNAPSHOT_PATH").ok().map(PathBuf::from),
            links_file: env::var("LINKS_FILE").ok().map(PathBuf::from),
            site_root: env::var("SITE_ROOT").ok().map(PathBuf::from),
            site_origin: env::var("SITE_ORIGIN").ok(),
        };

        let config = Self {
            cache,
            validator,
            scheduler,
            server,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let spans: [(&str, u64); 11] = [
            ("LINK_RESULTS_TTL", self.cache.link_results_ttl),
            ("SITEMAP_DATA_TTL", self.cache.sitemap_data_ttl),
            ("REPORT_DATA_TTL", self.cache.report_data_ttl),
            ("CLEANUP_INTERVAL", self.cache.cleanup_interval),
            ("PROBE_TIMEOUT", self.validator.timeout),
            ("AUDIT_TIMEOUT", self.scheduler.audit_timeout),
            ("MAX_PENDING_AGE", self.scheduler.max_pending_age),
            ("QUEUE_PUMP_INTERVAL", self.scheduler.queue_pump_interval),
            ("QUICK_CHECK_INTERVAL", self.scheduler.quick_check_interval),
            ("ALERT_ANALYSIS_INTERVAL", self.scheduler.alert_analysis_interval),
            ("MAX_MEMORY_MB", self.cache.max_memory_mb),
        ];
        for (name, value) in spans {
            if value == 0 {
                return Err(AuditError::InvalidConfig(format!("{} must be > 0", name)));
            }
            if value > MAX_SPAN_SECS {
                return Err(AuditError::InvalidConfig(format!(
                    "{} must be <= {}",
                    name, MAX_SPAN_SECS
                )));
            }
        }

        if self.cache.eviction_batch_size == 0 {
            return Err(AuditError::InvalidConfig(
                "EVICTION_BATCH_SIZE must be > 0".to_string(),
            ));
        }
        if self.validator.batch_size == 0 {
            return Err(AuditError::InvalidConfig("BATCH_SIZE must be > 0".to_string()));
        }
        if self.validator.local_concurrency == 0 {
            return Err(AuditError::InvalidConfig(
                "LOCAL_CONCURRENCY must be > 0".to_string(),
            ));
        }
        if self.validator.retry_attempts == 0 {
            return Err(AuditError::InvalidConfig(
                "RETRY_ATTEMPTS must be >= 1".to_string(),
            ));
        }
        if self.scheduler.max_concurrent_audits == 0 {
            return Err(AuditError::InvalidConfig(
                "MAX_CONCURRENT_AUDITS must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// == Env Helpers ==
fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AuditError::InvalidConfig(format!("{}: cannot parse '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

fn env_time_or(name: &str, default: NaiveTime) -> Result<NaiveTime> {
    match env::var(name) {
        Ok(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| {
            AuditError::InvalidConfig(format!("{}: expected HH:MM, got '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}
