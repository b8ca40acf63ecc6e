use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::{CacheKey, Clock, SystemClock};
use crate::models::{FeedDomain, FeedPage, FeedParams};
use crate::sync::lock;

/// Default number of feed pages kept in memory.
/// Four domains with a handful of filter variants each fit comfortably.
pub const DEFAULT_MAX_ENTRIES: usize = 20;

/// Default lifetime of a cached page.
/// Feeds move quickly; five minutes keeps back-navigation instant without
/// showing noticeably old counts.
pub const DEFAULT_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
        }
    }
}

/// A stored page. Never mutated after creation; a newer store replaces it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    key: CacheKey,
    payload: FeedPage,
    stored_at: DateTime<Utc>,
    // Breaks ties between entries stored within the same clock tick.
    stored_seq: u64,
}

impl CacheEntry {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn payload(&self) -> &FeedPage {
        &self.payload
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.stored_at
    }

    /// Human-readable age, e.g. "just now", "4m ago", "2h ago".
    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age(now).num_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        }
    }
}

struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    next_seq: u64,
}

/// Bounded, lazily expiring map from (domain, params) to feed pages.
///
/// Owned by the session: built at startup, cleared on logout.
pub struct CacheStore {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Store `payload`, fully replacing any entry under the same key.
    /// At most one entry (the oldest by store time) is evicted per call.
    pub fn store(&self, domain: FeedDomain, params: &FeedParams, payload: FeedPage) -> CacheKey {
        self.store_key(CacheKey::new(domain, params), payload)
    }

    pub(crate) fn store_key(&self, key: CacheKey, payload: FeedPage) -> CacheKey {
        let now = self.clock.now();
        let mut inner = lock(&self.inner);
        let seq = inner.next_seq;
        inner.next_seq += 1;

        inner.entries.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                payload,
                stored_at: now,
                stored_seq: seq,
            },
        );

        if inner.entries.len() > self.config.max_entries {
            let oldest = inner
                .entries
                .values()
                .min_by_key(|e| (e.stored_at, e.stored_seq))
                .map(|e| e.key.clone());
            if let Some(victim) = oldest {
                inner.entries.remove(&victim);
                debug!(key = %victim, "Evicted oldest cache entry");
            }
        }

        key
    }

    /// Fetch a live payload. Expired entries are removed on the way out.
    pub fn read(&self, domain: FeedDomain, params: &FeedParams) -> Option<FeedPage> {
        self.read_entry(&CacheKey::new(domain, params))
            .map(|e| e.payload)
    }

    /// Like `read`, but keeps the store time for display.
    pub fn entry(&self, domain: FeedDomain, params: &FeedParams) -> Option<CacheEntry> {
        self.read_entry(&CacheKey::new(domain, params))
    }

    pub(crate) fn read_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut inner = lock(&self.inner);

        let expired = match inner.entries.get(key) {
            None => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Some(entry) => entry.age(now) > self.config.ttl,
        };

        if expired {
            inner.entries.remove(key);
            debug!(key = %key, "Cache entry expired");
            return None;
        }

        debug!(key = %key, "Cache hit");
        inner.entries.get(key).cloned()
    }

    /// True if an entry exists, regardless of age. Does not expire anything.
    pub fn contains(&self, domain: FeedDomain, params: &FeedParams) -> bool {
        lock(&self.inner)
            .entries
            .contains_key(&CacheKey::new(domain, params))
    }

    /// Drop every entry derived from `domain`. Returns how many were removed.
    pub fn invalidate_domain(&self, domain: FeedDomain) -> usize {
        let mut inner = lock(&self.inner);
        let before = inner.entries.len();
        inner.entries.retain(|key, _| key.domain() != domain);
        let removed = before - inner.entries.len();
        debug!(domain = %domain, removed = removed, "Invalidated cache domain");
        removed
    }

    pub fn clear(&self) {
        lock(&self.inner).entries.clear();
        debug!("Cache cleared");
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

// ============================================================================
// Tests
// ============================================================================
