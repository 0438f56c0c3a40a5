//! Short-TTL evaluation cache.
//!
//! Memoizes evaluation results per (flag, user, environment). The cache
//! is an optimization only: every result is recomputable without it, and
//! invalidation on mutation is best-effort. Expiry runs off the injected
//! clock so tests can drive it deterministically.

use aperture_core::{Clock, FlagEvaluation};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct CacheEntry {
    evaluation: FlagEvaluation,
    expires_at: DateTime<Utc>,
}

/// Cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Concurrent TTL cache for evaluation results.
pub struct EvaluationCache {
    entries: DashMap<String, CacheEntry>,
    ttl: ChronoDuration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl EvaluationCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        let ttl = ChronoDuration::from_std(ttl)
            .unwrap_or_else(|_| ChronoDuration::seconds(300));
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Cache key for one evaluation. Anonymous users share a slot.
    pub fn key(flag_name: &str, user_id: Option<&str>, environment: &str) -> String {
        format!("{flag_name}:{}:{environment}", user_id.unwrap_or("anonymous"))
    }

    /// Fetch a live entry.
    ///
    /// Expired entries read as misses but are left in place so
    /// [`get_stale`](Self::get_stale) can still serve them during a store
    /// outage; [`purge_expired`](Self::purge_expired) reclaims them.
    pub fn get(&self, key: &str) -> Option<FlagEvaluation> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.evaluation.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Fetch an entry even past its TTL. Fallback path for when the store
    /// is unreachable and a stale answer beats a default.
    pub fn get_stale(&self, key: &str) -> Option<FlagEvaluation> {
        self.entries.get(key).map(|entry| entry.evaluation.clone())
    }

    /// Drop entries past their TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - self.entries.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Store an evaluation under the configured TTL.
    pub fn insert(&self, key: String, evaluation: FlagEvaluation) {
        let expires_at = self.clock.now() + self.ttl;
        self.entries.insert(
            key,
            CacheEntry {
                evaluation,
                expires_at,
            },
        );
    }

    /// Drop every entry belonging to a flag. Returns how many were
    /// removed.
    pub fn invalidate_flag(&self, flag_name: &str) -> usize {
        let prefix = format!("{flag_name}:");
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        before - self.entries.len()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
