use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::info;

use super::SessionStore;
use crate::error::StoreError;

/// Session records in Redis: `SET key <subject> PX <ttl>`, `GET`, `DEL`.
///
/// Redis evicts expired keys itself, so there is no reaper.
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager().await?;
        info!("Connected to session store at {}", redis_url);
        Ok(Self::new(connection))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, key: &str, subject_id: u64, ttl: Duration) -> Result<(), StoreError> {
        let ttl_ms = px_millis(ttl);
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(subject_id.to_string())
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        parse_subject(key, value)
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        let deleted: u64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(deleted)
    }
}

/// PX 0 is rejected by Redis, so sub-millisecond TTLs round up.
fn px_millis(ttl: Duration) -> u64 {
    ttl.as_millis().clamp(1, u64::MAX as u128) as u64
}

fn parse_subject(key: &str, value: Option<String>) -> Result<Option<u64>, StoreError> {
    value
        .map(|v| {
            v.parse::<u64>().map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
            })
        })
        .transpose()
}
