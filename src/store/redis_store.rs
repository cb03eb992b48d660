use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use redis::{AsyncCommands, Client as RedisClient, aio::MultiplexedConnection};
use tokio::sync::{Mutex, RwLock};

use super::KeyValueStore;
use crate::error::StoreError;

/// INCR 与首次 EXPIRE 在服务端一次完成。
/// TTL 为 -1 说明计数器残留且没有过期时间（例如两步写法中途崩溃），此时补上过期时间。
const INCR_WITH_EXPIRY_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

static INCR_WITH_EXPIRY: LazyLock<redis::Script> =
    LazyLock::new(|| redis::Script::new(INCR_WITH_EXPIRY_SCRIPT));

/// 建连和单条命令的默认超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Redis 实现，所有请求共用一条多路复用连接
pub struct RedisStore {
    client: RedisClient,
    conn: RwLock<Option<MultiplexedConnection>>,
    /// 同一时间只有一个建连尝试，其余请求直接按不可用处理
    connecting: Mutex<()>,
    timeout: Duration,
    closed: AtomicBool,
}

impl RedisStore {
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            conn: RwLock::new(None),
            connecting: Mutex::new(()),
            timeout: DEFAULT_TIMEOUT,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn open(info: redis::ConnectionInfo) -> Result<Self, StoreError> {
        Ok(Self::new(RedisClient::open(info)?))
    }

    /// 取得共享连接，断开后在下一次命令时懒重连
    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        if let Some(conn) = self.conn.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let Ok(_connecting) = self.connecting.try_lock() else {
            tracing::debug!("Redis connect already in progress, skipping");
            return Err(StoreError::NotConnected);
        };
        if let Some(conn) = self.conn.read().await.as_ref() {
            return Ok(conn.clone());
        }

        // 建连期间不持有 conn 的锁，其他请求仍能快速失败
        let config = redis::AsyncConnectionConfig::new()
            .set_connection_timeout(self.timeout)
            .set_response_timeout(self.timeout);
        let conn = self
            .client
            .get_multiplexed_async_connection_with_config(&config)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to connect to Redis");
                StoreError::NotConnected
            })?;
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        *self.conn.write().await = Some(conn.clone());
        tracing::info!("Connected to Redis");
        Ok(conn)
    }

    async fn fail(&self, e: redis::RedisError) -> StoreError {
        if e.is_connection_dropped() || e.is_io_error() || e.is_timeout() {
            tracing::warn!(error = %e, "Redis connection lost, will reconnect");
            self.conn.write().await.take();
        }
        e.into()
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    // Redis 不接受 0 秒过期
    ttl.as_secs().max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.closed.store(false, Ordering::Release);
        self.connection().await.map(|_| ())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if self.conn.write().await.take().is_some() {
            tracing::info!("Redis connection closed");
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<Option<Vec<u8>>> = conn.get(key).await;
        match result {
            Ok(value) => Ok(value.map(Bytes::from)),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> = conn.set_ex(key, &value[..], ttl_secs(ttl)).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<u64> = conn.incr(key, 1).await;
        match result {
            Ok(count) => Ok(count),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        // EXPIRE ... NX 需要 Redis 7.0+
        let result: redis::RedisResult<i64> = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await;
        match result {
            Ok(applied) => Ok(applied == 1),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<u64> = INCR_WITH_EXPIRY
            .key(key)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await;
        match result {
            Ok(count) => Ok(count),
            Err(e) => Err(self.fail(e).await),
        }
    }
}
