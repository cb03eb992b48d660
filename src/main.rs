use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use gateway::{
    AppState,
    config::Config,
    router::create_router,
    store::{KeyValueStore, RedisStore},
    upstream::HttpUpstream,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration (is API_URL set?)");

    // 设置 Redis 存储；连不上也继续启动，限流放行、缓存直连上游
    let connection_info = config
        .redis_connection_info()
        .expect("Invalid Redis connection settings");
    let store: Arc<dyn KeyValueStore> = Arc::new(
        RedisStore::open(connection_info)
            .expect("Failed to create Redis client")
            .with_timeout(config.redis_timeout()),
    );
    if let Err(e) = store.connect().await {
        tracing::warn!(error = %e, "Redis unavailable at startup, running degraded");
    }

    let upstream = HttpUpstream::new(&config.upstream_base_url, config.upstream_timeout())
        .expect("Failed to build upstream HTTP client");

    // 设置应用状态
    let state = AppState::new(config, Arc::clone(&store), Arc::new(upstream));
    tracing::info!(
        upstream = %state.config.upstream_base_url,
        rate_limit = state.config.rate_limit_requests,
        window_secs = state.config.rate_limit_window_secs,
        cache_ttl_secs = state.config.cache_ttl_secs,
        "Gateway configured"
    );

    // 启动服务器
    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    let app = create_router(state);

    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    store.close().await;
    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
