//! SQLite implementation of the durable cache tier.
//!
//! Implements `DurableCacheStore` from `replyforge-core` using sqlx with
//! split read/write pools. Payloads are stored as JSON text and
//! deserialized on read. Every error maps to
//! `CacheError::DurableUnavailable`, which the cache layer treats as a
//! degrade-to-volatile signal, never a request failure.

use chrono::{DateTime, Utc};
use sqlx::Row;

use replyforge_core::cache::durable::DurableCacheStore;
use replyforge_types::cache::{CacheEntry, CachePayload};
use replyforge_types::dispatch::RequestFingerprint;
use replyforge_types::error::CacheError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DurableCacheStore`.
pub struct SqliteCacheStore {
    pool: DatabasePool,
}

impl SqliteCacheStore {
    /// Create a new cache store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct CacheRow {
    fingerprint: String,
    payload: String,
    created_at: String,
    ttl_secs: i64,
}

impl CacheRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            fingerprint: row.try_get("fingerprint")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            ttl_secs: row.try_get("ttl_secs")?,
        })
    }

    fn into_entry(self) -> Result<CacheEntry, CacheError> {
        let payload: CachePayload = serde_json::from_str(&self.payload)
            .map_err(|e| CacheError::DurableUnavailable(format!("invalid payload JSON: {e}")))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(CacheEntry {
            fingerprint: RequestFingerprint::new(self.fingerprint),
            payload,
            created_at,
            ttl_secs: self.ttl_secs.max(0) as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::DurableUnavailable(format!("invalid datetime: {e}")))
}

fn query_err(e: sqlx::Error) -> CacheError {
    CacheError::DurableUnavailable(e.to_string())
}

// ---------------------------------------------------------------------------
// DurableCacheStore implementation
// ---------------------------------------------------------------------------

impl DurableCacheStore for SqliteCacheStore {
    async fn get(&self, fingerprint: &RequestFingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let row = sqlx::query("SELECT * FROM response_cache WHERE fingerprint = ?")
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => {
                let cache_row = CacheRow::from_row(&row).map_err(query_err)?;
                Ok(Some(cache_row.into_entry()?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let payload = serde_json::to_string(&entry.payload)
            .map_err(|e| CacheError::DurableUnavailable(format!("failed to serialize payload: {e}")))?;

        sqlx::query(
            r#"INSERT INTO response_cache (fingerprint, payload, created_at, ttl_secs)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (fingerprint) DO UPDATE SET
                   payload = excluded.payload,
                   created_at = excluded.created_at,
                   ttl_secs = excluded.ttl_secs"#,
        )
        .bind(entry.fingerprint.as_str())
        .bind(&payload)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.ttl_secs as i64)
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn remove(&self, fingerprint: &RequestFingerprint) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM response_cache WHERE fingerprint = ?")
            .bind(fingerprint.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM response_cache")
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn entry(fp: &str, text: &str) -> CacheEntry {
        CacheEntry::new(
            RequestFingerprint::new(fp),
            CachePayload {
                text: text.to_string(),
                structured_fields: Some(serde_json::json!({"subject": "Re: Hi"})),
                provider: "openai".to_string(),
            },
            3600,
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = SqliteCacheStore::new(test_pool().await);
        let original = entry("fp-1", "cached text");
        store.put(&original).await.unwrap();

        let got = store
            .get(&RequestFingerprint::new("fp-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.fingerprint, original.fingerprint);
        assert_eq!(got.payload, original.payload);
        assert_eq!(got.ttl_secs, 3600);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = SqliteCacheStore::new(test_pool().await);
        let got = store.get(&RequestFingerprint::new("nope")).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_put_upserts() {
        let store = SqliteCacheStore::new(test_pool().await);
        store.put(&entry("fp-1", "first")).await.unwrap();
        store.put(&entry("fp-1", "second")).await.unwrap();

        let got = store
            .get(&RequestFingerprint::new("fp-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.payload.text, "second");
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SqliteCacheStore::new(test_pool().await);
        store.put(&entry("fp-1", "temp")).await.unwrap();
        store.remove(&RequestFingerprint::new("fp-1")).await.unwrap();

        let got = store.get(&RequestFingerprint::new("fp-1")).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let store = SqliteCacheStore::new(test_pool().await);
        store.remove(&RequestFingerprint::new("nope")).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear() {
        let store = SqliteCacheStore::new(test_pool().await);
        store.put(&entry("fp-1", "one")).await.unwrap();
        store.put(&entry("fp-2", "two")).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.get(&RequestFingerprint::new("fp-1")).await.unwrap().is_none());
        assert!(store.get(&RequestFingerprint::new("fp-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("persist.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        {
            let pool = DatabasePool::new(&url).await.unwrap();
            let store = SqliteCacheStore::new(pool);
            store.put(&entry("fp-1", "survivor")).await.unwrap();
        }

        // A fresh pool over the same file sees the entry.
        let pool = DatabasePool::new(&url).await.unwrap();
        let store = SqliteCacheStore::new(pool);
        let got = store
            .get(&RequestFingerprint::new("fp-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.payload.text, "survivor");
    }
}
