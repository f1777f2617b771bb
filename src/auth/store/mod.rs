//! Session store: session id -> subject id with per-key expiry.
//!
//! Each operation is atomic on its single key; nothing here spans keys.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use self::memory::MemorySessionStore;
pub use self::redis_store::RedisSessionStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or overwrite `key`, expiring after `ttl`.
    async fn put(&self, key: &str, subject_id: u64, ttl: Duration) -> Result<(), StoreError>;

    /// `None` once the key was deleted or its TTL lapsed.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Number of keys actually removed (0 or 1).
    async fn delete(&self, key: &str) -> Result<u64, StoreError>;
}
