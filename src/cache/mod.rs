// 缓存模块
// cache-aside 读取：先查存储，未命中再请求上游并回写

pub mod single_flight;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;

use crate::error::{GatewayError, UpstreamError};
use crate::keys::KeySpace;
use crate::store::KeyValueStore;
use crate::upstream::UpstreamClient;

pub use single_flight::SingleFlight;

/// 一次读取的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub payload: Bytes,
    pub served_from_cache: bool,
}

pub struct CacheGateway {
    store: Arc<dyn KeyValueStore>,
    upstream: Arc<dyn UpstreamClient>,
    keys: KeySpace,
    ttl: Duration,
    /// 读缓存失败时是否按未命中处理
    fail_open: bool,
    /// 结果里的布尔值表示是否在合并等待期间命中了缓存
    flights: SingleFlight<Result<(Bytes, bool), UpstreamError>>,
}

fn is_json(payload: &[u8]) -> bool {
    serde_json::from_slice::<serde::de::IgnoredAny>(payload).is_ok()
}

impl CacheGateway {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        upstream: Arc<dyn UpstreamClient>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            upstream,
            keys: KeySpace::default(),
            ttl,
            fail_open: true,
            flights: SingleFlight::new(),
        }
    }

    pub fn with_key_space(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn fetch(&self, resource_key: &str) -> Result<Fetched, GatewayError> {
        let cache_key = self.keys.resource_key(resource_key);

        match self.store.get(&cache_key).await {
            Ok(Some(payload)) if is_json(&payload) => {
                tracing::debug!(key = %cache_key, "Serving from cache");
                return Ok(Fetched {
                    payload,
                    served_from_cache: true,
                });
            }
            Ok(Some(_)) => {
                tracing::warn!(key = %cache_key, "Cached value is not valid JSON, refetching");
            }
            Ok(None) => {
                tracing::debug!(key = %cache_key, "Cache miss");
            }
            Err(e) if self.fail_open => {
                tracing::warn!(
                    key = %cache_key,
                    error = %e,
                    "Cache read failed, falling back to upstream"
                );
            }
            Err(e) => return Err(e.into()),
        }

        let store = Arc::clone(&self.store);
        let upstream = Arc::clone(&self.upstream);
        let ttl = self.ttl;
        let resource_key = resource_key.to_string();
        let write_key = cache_key.clone();

        let (payload, served_from_cache) = self
            .flights
            .work(&cache_key, move || async move {
                // 上一轮并发请求可能刚写回，先再查一次
                if let Ok(Some(payload)) = store.get(&write_key).await {
                    if is_json(&payload) {
                        tracing::debug!(
                            key = %write_key,
                            "Filled while waiting, serving from cache"
                        );
                        return Ok((payload, true));
                    }
                }

                let payload = upstream.fetch(&resource_key).await?;
                if !is_json(&payload) {
                    return Err(UpstreamError::status(502, "upstream returned a non-JSON payload"));
                }

                // 回写失败不影响本次响应，下次请求仍会未命中
                match store.set_ex(&write_key, payload.clone(), ttl).await {
                    Ok(()) => tracing::debug!(
                        key = %write_key,
                        ttl_secs = ttl.as_secs(),
                        "Cached upstream payload"
                    ),
                    Err(e) => tracing::warn!(
                        key = %write_key,
                        error = %e,
                        "Failed to write cache entry"
                    ),
                }
                Ok((payload, false))
            })
            .await
            .unwrap_or_else(|aborted| Err(UpstreamError::transport(aborted.to_string())))?;

        Ok(Fetched {
            payload,
            served_from_cache,
        })
    }
}
