//! Short-lived cache of upstream answers, keyed by request URI.
//!
//! Entries live for the `max-age` the upstream announced. Concurrent misses
//! for the same URI wait on one another so that only one of them fetches.

use crate::error::ServerError;
use crate::upstream::TemporalSource;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    fetched_at: Instant,
    max_age: Duration,
}

impl Entry {
    #[inline]
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.fetched_at) < self.max_age
    }
}

#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, Entry>,
    /// One lock per URI currently being fetched
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh cached answer for `uri`, or one fetched from `source`.
    pub async fn get_or_fetch(
        &self,
        uri: &str,
        source: &dyn TemporalSource,
    ) -> Result<Value, ServerError> {
        if let Some(value) = self.fresh(uri) {
            debug!("cache hit {}", uri);
            return Ok(value);
        }

        let lock = self.inflight.entry(uri.to_string()).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            match self.fresh(uri) {
                Some(value) => {
                    debug!("cache hit {} after waiting", uri);
                    Ok(value)
                }
                None => self.fetch(uri, source).await,
            }
        };

        // the map and this task hold the only references
        self.inflight
            .remove_if(uri, |_, l| Arc::ptr_eq(l, &lock) && Arc::strong_count(l) == 2);
        result
    }

    async fn fetch(&self, uri: &str, source: &dyn TemporalSource) -> Result<Value, ServerError> {
        info!("GET {}", uri);
        let fetched = source.fetch(uri).await?;
        self.entries.insert(
            uri.to_string(),
            Entry {
                value: fetched.body.clone(),
                fetched_at: Instant::now(),
                max_age: fetched.max_age,
            },
        );
        Ok(fetched.body)
    }

    fn fresh(&self, uri: &str) -> Option<Value> {
        let entry = self.entries.get(uri)?;
        entry
            .is_fresh(Instant::now())
            .then(|| entry.value.clone())
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("purged {} expired upstream responses", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
