//! 共享键值存储
//!
//! 缓存与限流都只依赖这里的原子原语；进程内不做任何额外加锁。

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::error::StoreError;

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 建立连接；可重复调用
    async fn connect(&self) -> Result<(), StoreError>;

    /// 关闭连接，之后的命令都返回 `StoreError::Closed`
    async fn close(&self);

    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;

    /// 原子自增，返回自增后的值；键不存在时从 0 开始且不带过期时间
    async fn incr(&self, key: &str) -> Result<u64, StoreError>;

    /// 仅当键存在且尚无过期时间时设置过期，返回是否设置成功
    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// 自增，并在本次自增创建了计数器时设置过期时间。
    ///
    /// 默认实现是两步操作：`incr` 之后再 `expire_if_unset`。两步之间键没有 TTL，
    /// 如果进程在此期间退出，计数器将永不过期，该客户端会被一直限流。
    /// 支持脚本的存储应覆盖此方法，把两步合成一个原子操作。
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let count = self.incr(key).await?;
        if count == 1 {
            self.expire_if_unset(key, ttl).await?;
        }
        Ok(count)
    }
}
