//! Durable cache tier port.
//!
//! Defines the interface the infrastructure layer implements for the
//! cross-restart cache tier, plus an object-safe box wrapper so the
//! `CacheLayer` can hold any implementation.

use std::future::Future;
use std::pin::Pin;

use replyforge_types::cache::CacheEntry;
use replyforge_types::dispatch::RequestFingerprint;
use replyforge_types::error::CacheError;

/// Trait for the durable (cross-restart) cache tier.
///
/// Uses RPITIT; implementations live in replyforge-infra. Every operation
/// is best-effort from the cache layer's point of view: errors degrade the
/// cache to volatile-only for that call.
pub trait DurableCacheStore: Send + Sync {
    /// Fetch an entry. Expired entries may be returned; the caller applies
    /// TTL semantics.
    fn get(
        &self,
        fingerprint: &RequestFingerprint,
    ) -> impl Future<Output = Result<Option<CacheEntry>, CacheError>> + Send;

    /// Insert or replace an entry.
    fn put(&self, entry: &CacheEntry) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Delete an entry. No-op if absent.
    fn remove(
        &self,
        fingerprint: &RequestFingerprint,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Delete all entries.
    fn clear(&self) -> impl Future<Output = Result<(), CacheError>> + Send;
}

/// Object-safe version of [`DurableCacheStore`] with boxed futures.
pub trait DurableCacheStoreDyn: Send + Sync {
    fn get_boxed<'a>(
        &'a self,
        fingerprint: &'a RequestFingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<Option<CacheEntry>, CacheError>> + Send + 'a>>;

    fn put_boxed<'a>(
        &'a self,
        entry: &'a CacheEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>>;

    fn remove_boxed<'a>(
        &'a self,
        fingerprint: &'a RequestFingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>>;

    fn clear_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + '_>>;
}

/// Blanket implementation: any `DurableCacheStore` automatically
/// implements `DurableCacheStoreDyn`.
impl<T: DurableCacheStore> DurableCacheStoreDyn for T {
    fn get_boxed<'a>(
        &'a self,
        fingerprint: &'a RequestFingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<Option<CacheEntry>, CacheError>> + Send + 'a>> {
        Box::pin(self.get(fingerprint))
    }

    fn put_boxed<'a>(
        &'a self,
        entry: &'a CacheEntry,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(self.put(entry))
    }

    fn remove_boxed<'a>(
        &'a self,
        fingerprint: &'a RequestFingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(self.remove(fingerprint))
    }

    fn clear_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + '_>> {
        Box::pin(self.clear())
    }
}

/// Type-erased durable store held by the `CacheLayer`.
pub struct BoxDurableStore {
    inner: Box<dyn DurableCacheStoreDyn + Send + Sync>,
}

impl BoxDurableStore {
    pub fn new<T: DurableCacheStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub async fn get(
        &self,
        fingerprint: &RequestFingerprint,
    ) -> Result<Option<CacheEntry>, CacheError> {
        self.inner.get_boxed(fingerprint).await
    }

    pub async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.inner.put_boxed(entry).await
    }

    pub async fn remove(&self, fingerprint: &RequestFingerprint) -> Result<(), CacheError> {
        self.inner.remove_boxed(fingerprint).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear_boxed().await
    }
}
