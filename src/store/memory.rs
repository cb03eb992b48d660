use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::time::Instant;

use super::KeyValueStore;
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// 进程内存储，语义与 Redis 的 GET / SETEX / INCR / EXPIRE NX 一致。
/// 过期基于 `tokio::time::Instant`，测试中可以暂停并推进时钟。
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 键的剩余存活时间；不存在返回 None，没有过期时间返回 Some(None)
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.expires_at.map(|at| at - now))
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.retain(|_, e| e.is_live(now));
        f(&mut entries, now)
    }
}

/// INCR：不存在的键按 0 处理，非整数值报错
fn bump<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> Result<(u64, &'a mut Entry), StoreError> {
    let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
        value: Bytes::from_static(b"0"),
        expires_at: None,
    });
    let current: u64 = std::str::from_utf8(&entry.value)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| StoreError::Command("value is not an integer or out of range".into()))?;
    let next = current + 1;
    entry.value = Bytes::from(next.to_string());
    Ok((next, entry))
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_entries(|_, _| Ok(()))
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.with_entries(|entries, _| Ok(entries.get(key).map(|e| e.value.clone())))
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        self.with_entries(|entries, now| {
            entries.insert(
                key.to_string(),
                Entry {
                    value,
                    expires_at: Some(now + ttl),
                },
            );
            Ok(())
        })
    }

    async fn incr(&self, key: &str) -> Result<u64, StoreError> {
        self.with_entries(|entries, _| {
            // 自增保留原有过期时间
            bump(entries, key).map(|(count, _)| count)
        })
    }

    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.with_entries(|entries, now| match entries.get_mut(key) {
            Some(entry) if entry.expires_at.is_none() => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        // 整个过程在同一把锁内完成，相当于 Redis 端的脚本
        self.with_entries(|entries, now| {
            let (count, entry) = bump(entries, key)?;
            if count == 1 || entry.expires_at.is_none() {
                entry.expires_at = Some(now + ttl);
            }
            Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set_ex("character", Bytes::from_static(b"[]"), Duration::from_secs(20))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(19)).await;
        assert_eq!(
            store.get("character").await.unwrap(),
            Some(Bytes::from_static(b"[]"))
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("character").await.unwrap(), None);
    }

    #[tokio::test]
    async fn incr_does_not_arm_expiry() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("rate:1.2.3.4").await.unwrap(), 1);
        assert_eq!(store.incr("rate:1.2.3.4").await.unwrap(), 2);
        assert_eq!(store.ttl("rate:1.2.3.4"), Some(None));
    }

    #[tokio::test(start_paused = true)]
    async fn expire_if_unset_only_applies_once() {
        let store = MemoryStore::new();
        store.incr("rate:a").await.unwrap();

        assert!(store.expire_if_unset("rate:a", Duration::from_secs(60)).await.unwrap());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!store.expire_if_unset("rate:a", Duration::from_secs(60)).await.unwrap());
        assert_eq!(store.ttl("rate:a"), Some(Some(Duration::from_secs(30))));

        assert!(!store.expire_if_unset("missing", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn incr_with_expiry_arms_window_on_creation_only() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(3600);

        assert_eq!(store.incr_with_expiry("rate:a", window).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(store.incr_with_expiry("rate:a", window).await.unwrap(), 2);
        assert_eq!(store.ttl("rate:a"), Some(Some(Duration::from_secs(3000))));

        tokio::time::advance(Duration::from_secs(3000)).await;
        assert_eq!(store.incr_with_expiry("rate:a", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn incr_on_non_integer_fails() {
        let store = MemoryStore::new();
        store
            .set_ex("character", Bytes::from_static(b"{}"), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(matches!(
            store.incr("character").await,
            Err(StoreError::Command(_))
        ));
    }

    #[tokio::test]
    async fn closed_store_reports_errors_until_reconnected() {
        let store = MemoryStore::new();
        store.close().await;
        assert_eq!(store.ping().await, Err(StoreError::Closed));

        store.connect().await.unwrap();
        assert_eq!(store.ping().await, Ok(()));
    }
}
