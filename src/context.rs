//! Application context
//!
//! Every long-lived component is built exactly once here and shared by `Arc`.
//! The HTTP layer, the maintenance driver and tests all work off an
//! [`AppContext`] instead of process-wide globals.

use std::sync::Arc;

use crate::cache::AuditCache;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::invalidation::InvalidationManager;
use crate::ports::{
    FileLinkSource, LinkSource, LogReporter, MemoryStore, Prober, Reporter, SitemapFetcher,
    StaticLinkSource, Store,
};
use crate::probe::{HttpProber, HttpSitemapFetcher, LocalProber, RoutingProber};
use crate::scheduler::{AuditJobRunner, AuditScheduler};
use crate::validator::BatchValidator;

/// External capabilities the pipeline is assembled around.
#[derive(Clone)]
pub struct Collaborators {
    pub prober: Arc<dyn Prober>,
    pub store: Arc<dyn Store>,
    pub links: Arc<dyn LinkSource>,
    pub sitemaps: Arc<dyn SitemapFetcher>,
    pub reporter: Arc<dyn Reporter>,
}

impl Collaborators {
    /// HTTP and filesystem probing, an in-process store and a logging reporter.
    pub fn from_config(config: &Config) -> Result<Self> {
        let local = LocalProber::new(config.server.site_root.clone());
        let remote = HttpProber::new(&config.validator)?;
        let links: Arc<dyn LinkSource> = match &config.server.links_file {
            Some(path) => Arc::new(FileLinkSource::new(path.clone())),
            None => Arc::new(StaticLinkSource::default()),
        };

        Ok(Self {
            prober: Arc::new(RoutingProber::new(Arc::new(local), Arc::new(remote))),
            store: Arc::new(MemoryStore::new()),
            links,
            sitemaps: Arc::new(HttpSitemapFetcher::new(&config.validator)?),
            reporter: Arc::new(LogReporter),
        })
    }
}

/// Shared state handed to handlers and background tasks.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub cache: Arc<AuditCache>,
    pub store: Arc<dyn Store>,
    pub validator: Arc<BatchValidator>,
    pub invalidation: Arc<InvalidationManager>,
    pub scheduler: AuditScheduler,
}

impl AppContext {
    pub fn new(config: Config, clock: Arc<dyn Clock>, collaborators: Collaborators) -> Self {
        let Collaborators {
            prober,
            store,
            links,
            sitemaps,
            reporter,
        } = collaborators;

        let cache = Arc::new(AuditCache::new(&config.cache, Arc::clone(&clock)));
        let validator = Arc::new(BatchValidator::new(
            &config.validator,
            Arc::clone(&cache),
            prober,
            Arc::clone(&store),
            Arc::clone(&clock),
        ));
        let invalidation = Arc::new(InvalidationManager::new(
            Arc::clone(&cache),
            Arc::clone(&validator),
            sitemaps,
            Arc::clone(&clock),
            config.server.site_origin.clone(),
        ));
        let runner = AuditJobRunner::new(
            Arc::clone(&validator),
            Arc::clone(&cache),
            Arc::clone(&store),
            links,
            reporter,
        );
        let scheduler = AuditScheduler::new(
            config.scheduler.clone(),
            Arc::new(runner),
            Arc::clone(&store),
            Arc::clone(&clock),
        );

        Self {
            config: Arc::new(config),
            clock,
            cache,
            store,
            validator,
            invalidation,
            scheduler,
        }
    }

    /// Wires the default collaborators on the system clock.
    pub fn from_config(config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::new(config, Arc::new(SystemClock), collaborators))
    }
}
