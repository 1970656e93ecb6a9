//! Page-Instance Cache - remembers which tenant last served a page.
//!
//! Used when an operation supplies a page id but no space context. Entries
//! expire after a fixed TTL; expiry is lazy inside `get`, and writes sweep
//! expired entries opportunistically. A hit whose instance has been removed
//! by a registry reload fails closed: it is treated as a miss and evicted
//! so the caller re-resolves instead of routing to a dangling tenant.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use wikimux_core::{Clock, RegistryState};

/// How long a page-to-instance association stays valid.
pub const PAGE_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// One cached association.
#[derive(Debug, Clone)]
pub struct PageCacheEntry {
    pub page_id: String,
    pub space_key: String,
    pub instance_name: String,
    pub cached_at: DateTime<Utc>,
}

/// Time-bounded lookup from page id to the tenant that last served it.
pub struct PageInstanceCache {
    entries: DashMap<String, PageCacheEntry>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl PageInstanceCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(PAGE_CACHE_TTL).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self
    }

    /// Look up the instance that last served `page_id`.
    pub fn get(&self, page_id: &str, state: &RegistryState) -> Option<PageCacheEntry> {
        let entry = self.entries.get(page_id)?.value().clone();
        let now = self.clock.now();

        if now.signed_duration_since(entry.cached_at) >= self.ttl {
            debug!(page_id = %page_id, "[PageInstanceCache] Entry expired");
            self.entries.remove(page_id);
            return None;
        }

        if state.instance(&entry.instance_name).is_none() {
            debug!(
                page_id = %page_id,
                instance = %entry.instance_name,
                "[PageInstanceCache] Cached instance no longer configured, evicting"
            );
            self.entries.remove(page_id);
            return None;
        }

        Some(entry)
    }

    /// Remember that `instance_name` served `page_id`. Last write wins.
    pub fn put(&self, page_id: &str, space_key: &str, instance_name: &str) {
        let now = self.clock.now();
        self.entries.insert(
            page_id.to_string(),
            PageCacheEntry {
                page_id: page_id.to_string(),
                space_key: space_key.to_string(),
                instance_name: instance_name.to_string(),
                cached_at: now,
            },
        );
        self.sweep_at(now);
    }

    /// Drop expired entries. Also runs opportunistically on every write.
    pub fn sweep(&self) {
        self.sweep_at(self.clock.now());
    }

    fn sweep_at(&self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.signed_duration_since(entry.cached_at) < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
