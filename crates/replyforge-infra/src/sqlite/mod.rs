//! SQLite-backed durable cache tier.

pub mod cache;
pub mod pool;

pub use cache::SqliteCacheStore;
pub use pool::DatabasePool;
