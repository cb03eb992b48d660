use std::sync::Arc;

use cache::CacheGateway;
use config::Config;
use keys::KeySpace;
use rate_limit::RateLimiter;
use store::KeyValueStore;
use upstream::UpstreamClient;

pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod store;
pub mod upstream;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn KeyValueStore>,
    pub gateway: Arc<CacheGateway>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// 由同一个存储句柄构建限流器和缓存网关
    pub fn new(
        config: Config,
        store: Arc<dyn KeyValueStore>,
        upstream: Arc<dyn UpstreamClient>,
    ) -> Self {
        let keys = KeySpace::new(&config.key_namespace);

        let limiter = RateLimiter::new(
            Arc::clone(&store),
            config.rate_limit_requests,
            config.rate_limit_window(),
        )
        .with_key_space(keys.clone());

        let gateway = CacheGateway::new(Arc::clone(&store), upstream, config.cache_ttl())
            .with_key_space(keys)
            .with_fail_open(config.cache_fail_open);

        Self {
            config: Arc::new(config),
            store,
            gateway: Arc::new(gateway),
            limiter: Arc::new(limiter),
        }
    }
}
