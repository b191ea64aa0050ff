//! Cache entry and statistics types.
//!
//! Entries are shared between the volatile and durable tiers; the durable
//! tier persists them as JSON across process restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::RequestFingerprint;

/// The cached product of a successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePayload {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_fields: Option<serde_json::Value>,
    /// Provider that originally produced this payload.
    pub provider: String,
}

/// A cache entry with creation time and TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: RequestFingerprint,
    pub payload: CachePayload,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn new(fingerprint: RequestFingerprint, payload: CachePayload, ttl_secs: u64) -> Self {
        Self {
            fingerprint,
            payload,
            created_at: Utc::now(),
            ttl_secs,
        }
    }

    /// An entry read after its TTL has elapsed is treated as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_seconds() >= self.ttl_secs as i64
    }
}

/// Read-only cache counters, incremented atomically by every get/put.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub entry_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(ttl_secs: u64) -> CacheEntry {
        CacheEntry::new(
            RequestFingerprint::new("fp"),
            CachePayload {
                text: "hello".to_string(),
                structured_fields: None,
                provider: "openai".to_string(),
            },
            ttl_secs,
        )
    }

    #[test]
    fn test_fresh_entry_not_expired() {
        let e = entry(3600);
        assert!(!e.is_expired(Utc::now()));
    }

    #[test]
    fn test_entry_expired_after_ttl() {
        let e = entry(60);
        let later = e.created_at + Duration::seconds(61);
        assert!(e.is_expired(later));
    }

    #[test]
    fn test_entry_expired_exactly_at_ttl() {
        let e = entry(60);
        let at = e.created_at + Duration::seconds(60);
        assert!(e.is_expired(at));
    }

    #[test]
    fn test_entry_json_roundtrip() {
        let e = entry(120);
        let json = serde_json::to_string(&e).unwrap();
        let back: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fingerprint, e.fingerprint);
        assert_eq!(back.payload, e.payload);
        assert_eq!(back.ttl_secs, 120);
    }
}
