use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::MediaInputs;

#[derive(Debug, Clone)]
struct CachedLocator {
    locator: String,
    resolved_at: Instant,
}

/// Caches resolved audio locators by source URL.
///
/// Source links expire, so the TTL has to be shorter than the source's own expiry.
#[derive(Debug)]
pub struct LocatorCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedLocator>>,
}

impl LocatorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Default::default(),
        }
    }

    /// Returns the cached locator for a source, if it has not expired.
    pub fn cached(&self, source_url: &str) -> Option<String> {
        let entries = self.entries.lock();

        entries
            .get(source_url)
            .filter(|e| e.resolved_at.elapsed() < self.ttl)
            .map(|e| e.locator.clone())
    }

    /// Returns a playable locator for a source, resolving it if needed.
    ///
    /// A failed lookup is logged and yields [None]. It is retried on the next call.
    pub async fn resolve(&self, inputs: &dyn MediaInputs, source_url: &str) -> Option<String> {
        if let Some(locator) = self.cached(source_url) {
            return Some(locator);
        }

        // The lock is not held while waiting on the lookup
        match inputs.locate(source_url).await {
            Ok(locator) => {
                debug!("Resolved audio locator for {}", source_url);
                self.store(source_url, locator.clone());

                Some(locator)
            }
            Err(err) => {
                warn!("Could not resolve audio for {}: {}", source_url, err);
                None
            }
        }
    }

    fn store(&self, source_url: &str, locator: String) {
        let mut entries = self.entries.lock();

        entries.retain(|_, e| e.resolved_at.elapsed() < self.ttl);
        entries.insert(
            source_url.to_string(),
            CachedLocator {
                locator,
                resolved_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
