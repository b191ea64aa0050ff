//! In-process volatile cache tier.
//!
//! A concurrent map with lazy TTL expiry: an entry read after its TTL is
//! treated as absent and removed on that access. When the tier reaches
//! capacity, the oldest entry (by creation time) is evicted.

use chrono::Utc;
use dashmap::DashMap;

use replyforge_types::cache::CacheEntry;
use replyforge_types::dispatch::RequestFingerprint;

pub struct VolatileTier {
    entries: DashMap<RequestFingerprint, CacheEntry>,
    max_entries: usize,
}

impl VolatileTier {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Look up a live entry. Expired entries are removed and reported absent.
    pub fn get(&self, fingerprint: &RequestFingerprint) -> Option<CacheEntry> {
        let expired = match self.entries.get(fingerprint) {
            Some(entry) if entry.is_expired(Utc::now()) => true,
            Some(entry) => return Some(entry.clone()),
            None => return None,
        };
        if expired {
            self.entries.remove(fingerprint);
        }
        None
    }

    /// Insert or replace an entry, evicting the oldest entry at capacity.
    pub fn insert(&self, entry: CacheEntry) {
        if self.entries.len() >= self.max_entries
            && !self.entries.contains_key(&entry.fingerprint)
        {
            self.evict_oldest();
        }
        self.entries.insert(entry.fingerprint.clone(), entry);
    }

    pub fn remove(&self, fingerprint: &RequestFingerprint) {
        self.entries.remove(fingerprint);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.created_at)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            tracing::debug!(fingerprint = %key, "Evicting oldest volatile cache entry");
            self.entries.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use replyforge_types::cache::CachePayload;

    use super::*;

    fn entry(fp: &str, ttl_secs: u64) -> CacheEntry {
        CacheEntry::new(
            RequestFingerprint::new(fp),
            CachePayload {
                text: format!("payload-{fp}"),
                structured_fields: None,
                provider: "openai".to_string(),
            },
            ttl_secs,
        )
    }

    #[test]
    fn test_insert_get_roundtrip() {
        let tier = VolatileTier::new(10);
        tier.insert(entry("a", 3600));
        let got = tier.get(&RequestFingerprint::new("a")).unwrap();
        assert_eq!(got.payload.text, "payload-a");
    }

    #[test]
    fn test_expired_entry_is_absent_and_removed() {
        let tier = VolatileTier::new(10);
        let mut e = entry("a", 60);
        e.created_at = Utc::now() - Duration::seconds(120);
        tier.insert(e);

        assert!(tier.get(&RequestFingerprint::new("a")).is_none());
        // Removed lazily on the failed read.
        assert_eq!(tier.len(), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let tier = VolatileTier::new(2);
        let mut old = entry("old", 3600);
        old.created_at = Utc::now() - Duration::seconds(100);
        tier.insert(old);
        tier.insert(entry("mid", 3600));
        tier.insert(entry("new", 3600));

        assert_eq!(tier.len(), 2);
        assert!(tier.get(&RequestFingerprint::new("old")).is_none());
        assert!(tier.get(&RequestFingerprint::new("mid")).is_some());
        assert!(tier.get(&RequestFingerprint::new("new")).is_some());
    }

    #[test]
    fn test_replacing_existing_key_does_not_evict() {
        let tier = VolatileTier::new(2);
        tier.insert(entry("a", 3600));
        tier.insert(entry("b", 3600));
        tier.insert(entry("a", 3600));
        assert_eq!(tier.len(), 2);
        assert!(tier.get(&RequestFingerprint::new("b")).is_some());
    }

    #[test]
    fn test_clear() {
        let tier = VolatileTier::new(10);
        tier.insert(entry("a", 3600));
        tier.insert(entry("b", 3600));
        tier.clear();
        assert!(tier.is_empty());
    }
}
