//! Application state shared by every request handler.

use crate::cache::ResponseCache;
use crate::error::ServerError;
use crate::upstream::{HttpSource, TemporalSource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tessella::{Config, FragmentBuilder};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct AppState {
    pub config: Config,
    pub source: Arc<dyn TemporalSource>,
    pub cache: ResponseCache,
    pub builder: FragmentBuilder,
    clock: Clock,
}

impl AppState {
    /// State talking to the configured upstream over HTTP.
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let source = HttpSource::new(config.upstream.timeout())?;
        Ok(Self::with_source(config, Arc::new(source)))
    }

    pub fn with_source(config: Config, source: Arc<dyn TemporalSource>) -> Self {
        let builder = FragmentBuilder::new(config.api.host.clone());
        Self {
            config,
            source,
            cache: ResponseCache::new(),
            builder,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. to serve fragments as of a fixed instant.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("cache_entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}
