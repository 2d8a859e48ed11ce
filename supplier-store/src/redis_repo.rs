use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use supplier_core::{CacheError, SnapshotCache};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::app_config::RedisConfig;

/// Redis-backed snapshot cache.
///
/// Holds a single multiplexed connection shared by all callers. The connection is opened
/// lazily under a bounded timeout and discarded after any command error, so the next call
/// reconnects instead of reusing a dead socket.
pub struct RedisClient {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    connect_timeout: Duration,
}

impl RedisClient {
    pub fn new(config: &RedisConfig) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(config.url.expose().as_str())?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Unavailable("connect timed out".into()))?
        .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        debug!("Redis connection established");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn discard(&self, err: redis::RedisError) -> CacheError {
        warn!("Redis command failed, dropping connection: {}", err);
        self.conn.lock().await.take();
        CacheError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl SnapshotCache for RedisClient {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<Option<String>> = conn.get(key).await;
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.discard(e).await),
        }
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        match conn.set_ex::<_, _, ()>(key, value, seconds).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.discard(e).await),
        }
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> = conn.del(key).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.discard(e).await),
        }
    }
}
