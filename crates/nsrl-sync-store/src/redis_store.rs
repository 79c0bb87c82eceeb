//! Redis hash set backend. Each set is a Redis set under its `set_key`.

use nsrl_sync::{HashSetStore, StoreError};

/// Whether this build can talk to Redis.
pub fn redis_supported() -> bool {
    cfg!(feature = "redis")
}

#[cfg(feature = "redis")]
pub struct RedisHashStore {
    conn: redis::aio::MultiplexedConnection,
}

#[cfg(feature = "redis")]
impl RedisHashStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        tracing::debug!(url, "connected to redis");
        Ok(Self { conn })
    }
}

#[cfg(feature = "redis")]
#[async_trait::async_trait]
impl HashSetStore for RedisHashStore {
    async fn add_members(&self, set_key: &str, values: &[String]) -> Result<(), StoreError> {
        use redis::AsyncCommands;

        if values.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(set_key, values).await.map_err(unavailable)
    }

    async fn is_member(&self, set_key: &str, value: &str) -> Result<bool, StoreError> {
        use redis::AsyncCommands;

        let mut conn = self.conn.clone();
        conn.sismember(set_key, value).await.map_err(unavailable)
    }
}

#[cfg(feature = "redis")]
fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Stand-in used when the `redis` feature is off. Every operation fails.
#[cfg(not(feature = "redis"))]
#[derive(Debug)]
pub struct RedisHashStore;

#[cfg(not(feature = "redis"))]
impl RedisHashStore {
    pub async fn connect(_url: &str) -> Result<Self, StoreError> {
        Err(feature_disabled())
    }
}

#[cfg(not(feature = "redis"))]
#[async_trait::async_trait]
impl HashSetStore for RedisHashStore {
    async fn add_members(&self, _set_key: &str, _values: &[String]) -> Result<(), StoreError> {
        Err(feature_disabled())
    }

    async fn is_member(&self, _set_key: &str, _value: &str) -> Result<bool, StoreError> {
        Err(feature_disabled())
    }
}

#[cfg(not(feature = "redis"))]
fn feature_disabled() -> StoreError {
    StoreError::Unavailable("the Redis backend requires the 'redis' cargo feature".into())
}
