//! Two-tier response cache.
//!
//! Lookup order is volatile tier first, durable tier second; a durable hit
//! is promoted back into the volatile tier before returning. Writes go to
//! both tiers, but the durable write is best-effort: a failed persist only
//! forfeits cross-restart reuse, it never fails the request.

pub mod durable;
pub mod volatile;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use replyforge_types::cache::{CacheEntry, CachePayload, CacheStats};
use replyforge_types::config::CacheConfig;
use replyforge_types::dispatch::RequestFingerprint;

use self::durable::BoxDurableStore;
use self::volatile::VolatileTier;

/// The two-tier cache with atomic hit/miss statistics.
///
/// Constructed once at startup and shared behind an `Arc`; there is no
/// ambient global instance.
pub struct CacheLayer {
    volatile: VolatileTier,
    durable: Option<BoxDurableStore>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl CacheLayer {
    /// Volatile-only cache.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            volatile: VolatileTier::new(config.max_volatile_entries),
            durable: None,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// Attach a durable tier.
    pub fn with_durable(mut self, store: BoxDurableStore) -> Self {
        self.durable = Some(store);
        self
    }

    /// Two-tier lookup with promotion.
    pub async fn get(&self, fingerprint: &RequestFingerprint) -> Option<CacheEntry> {
        if let Some(entry) = self.volatile.get(fingerprint) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(fingerprint = %fingerprint, tier = "volatile", "Cache hit");
            return Some(entry);
        }

        if let Some(store) = &self.durable {
            match store.get(fingerprint).await {
                Ok(Some(entry)) if !entry.is_expired(Utc::now()) => {
                    // Promote into the volatile tier before returning.
                    self.volatile.insert(entry.clone());
                    self.hit_count.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(fingerprint = %fingerprint, tier = "durable", "Cache hit");
                    return Some(entry);
                }
                Ok(Some(_expired)) => {
                    // Lazy expiry in the durable tier, best-effort.
                    if let Err(err) = store.remove(fingerprint).await {
                        tracing::warn!(%err, "Failed to remove expired durable cache entry");
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%err, "Durable cache tier unavailable, degrading to volatile-only");
                }
            }
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Write an entry to both tiers.
    pub async fn put(&self, fingerprint: RequestFingerprint, payload: CachePayload, ttl_secs: u64) {
        let entry = CacheEntry::new(fingerprint, payload, ttl_secs);
        self.volatile.insert(entry.clone());

        if let Some(store) = &self.durable {
            if let Err(err) = store.put(&entry).await {
                tracing::warn!(%err, "Durable cache write failed; entry is volatile-only");
            }
        }
    }

    /// Remove one entry from both tiers.
    pub async fn invalidate(&self, fingerprint: &RequestFingerprint) {
        self.volatile.remove(fingerprint);
        if let Some(store) = &self.durable {
            if let Err(err) = store.remove(fingerprint).await {
                tracing::warn!(%err, "Durable cache invalidation failed");
            }
        }
    }

    /// Empty both tiers and reset statistics.
    pub async fn clear(&self) {
        self.volatile.clear();
        if let Some(store) = &self.durable {
            if let Err(err) = store.clear().await {
                tracing::warn!(%err, "Durable cache clear failed");
            }
        }
        self.hit_count.store(0, Ordering::Relaxed);
        self.miss_count.store(0, Ordering::Relaxed);
    }

    /// Read-only counters for the administrative surface.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            entry_count: self.volatile.len() as u64,
        }
    }
}
