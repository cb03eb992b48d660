//! 固定窗口限流
//!
//! 每个客户端一个计数器，窗口内第一次请求创建计数器并设置过期时间，
//! 窗口结束后计数器由存储自动删除，下一次请求重新从 1 开始计数。
//! 存储不可用时放行（fail-open），只记录日志。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::keys::KeySpace;
use crate::store::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    /// 自增后的计数；存储不可用时为 0
    pub current_count: u64,
}

pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    keys: KeySpace,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, max_requests: u64, window: Duration) -> Self {
        Self {
            store,
            keys: KeySpace::default(),
            max_requests,
            window,
        }
    }

    pub fn with_key_space(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn admit(&self, client_identity: &str) -> Decision {
        let key = self.keys.rate_key(client_identity);

        match self.store.incr_with_expiry(&key, self.window).await {
            Ok(count) => {
                let allowed = count <= self.max_requests;
                if !allowed {
                    tracing::info!(
                        client = client_identity,
                        count,
                        limit = self.max_requests,
                        "Rate limit exceeded"
                    );
                }
                Decision {
                    allowed,
                    current_count: count,
                }
            }
            Err(e) => {
                tracing::warn!(
                    client = client_identity,
                    error = %e,
                    "Rate limit check failed, allowing request"
                );
                Decision {
                    allowed: true,
                    current_count: 0,
                }
            }
        }
    }
}
