//! Process-wide TTL cache.
//!
//! One flat keyspace shared by every pipeline stage. Values are stored
//! type-erased and recovered by downcast, so parser snapshots, parsed videos,
//! and playback links all live in the same map under prefixed keys. Expiry is
//! lazy: nothing evicts in the background, an expired entry is simply a miss
//! (and is dropped the next time it is touched).

use std::any::Any;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use tracing::trace;

/// Named expiry tiers, ordered by how volatile the cached data is.
///
/// Playback links rot in minutes, parsed pages in tens of minutes, parser
/// definitions only change on config edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// Volatile data such as playback links. Five minutes.
    Short,
    /// Parsed page content. Thirty minutes.
    Default,
    /// Parser definitions and URL-to-parser matches. Twelve hours.
    Long,
}

struct CacheEntry {
    value: Box<dyn Any + Send + Sync>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) >= self.ttl
    }
}

/// Thread-safe map of string keys to type-erased values with per-entry TTLs.
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    short_ttl: Duration,
    default_ttl: Duration,
    long_ttl: Duration,
}

impl TtlCache {
    /// Cache with the standard tier durations (5 min / 30 min / 12 h).
    #[must_use]
    pub fn new() -> Self {
        Self::with_tiers(
            Duration::from_secs(5 * 60),
            Duration::from_secs(30 * 60),
            Duration::from_secs(12 * 60 * 60),
        )
    }

    /// Cache with custom tier durations, mostly useful in tests.
    #[must_use]
    pub fn with_tiers(short: Duration, default: Duration, long: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            short_ttl: short,
            default_ttl: default,
            long_ttl: long,
        }
    }

    /// The configured duration for a tier.
    #[must_use]
    pub fn ttl_for(&self, tier: CacheTier) -> Duration {
        match tier {
            CacheTier::Short => self.short_ttl,
            CacheTier::Default => self.default_ttl,
            CacheTier::Long => self.long_ttl,
        }
    }

    // A panic while holding the lock cannot leave an entry half-written
    // (inserts and removes complete atomically under the guard), so a
    // poisoned lock is recovered rather than propagated.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, returning a clone of the stored value if it is present,
    /// unexpired, and of type `T`. An entry of a different type is a miss.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        {
            let entries = self.read_entries();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => {
                    return entry.value.downcast_ref::<T>().cloned();
                }
                Some(_) => {} // expired, evict below
            }
        }

        let mut entries = self.write_entries();
        // Re-check under the write lock: a writer may have replaced the
        // expired entry since we dropped the read guard.
        if let Some(entry) = entries.get(key) {
            if entry.is_expired(Instant::now()) {
                trace!(key, "evicting expired cache entry");
                entries.remove(key);
            }
        }
        None
    }

    /// Store `value` under `key` with an explicit TTL, replacing any previous
    /// entry regardless of its type or remaining lifetime.
    pub fn put<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let entry = CacheEntry {
            value: Box::new(value),
            stored_at: Instant::now(),
            ttl,
        };
        self.write_entries().insert(key.into(), entry);
    }

    /// Store `value` under `key` using a named tier's duration.
    pub fn put_tier<T: Send + Sync + 'static>(
        &self,
        key: impl Into<String>,
        value: T,
        tier: CacheTier,
    ) {
        self.put(key, value, self.ttl_for(tier));
    }

    /// Drop `key` if present. Unknown keys are a no-op.
    pub fn invalidate(&self, key: &str) {
        self.write_entries().remove(key);
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.write_entries().retain(|key, _| !key.starts_with(prefix));
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.write_entries().clear();
    }

    /// Number of physically stored entries. Expired entries that have not
    /// been touched since expiring still count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}
