use std::net::{IpAddr, SocketAddr};

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::AppState;

/// 无法确定来源地址时使用的身份
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitedResponse {
    status: u16,
    request_count: u64,
    message: String,
}

/// 只接受能解析为 IP 的头部值，避免任意字符串进入存储键
fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    value
        .split(',')
        .map(str::trim)
        .find(|ip| !ip.is_empty())?
        .parse()
        .ok()
}

/// 客户端身份：X-Real-IP，其次 X-Forwarded-For 第一项，最后是连接地址。
///
/// 头部由客户端提供、可以伪造，只有在可信反向代理之后部署时才应开启 `trust_proxy_headers`。
pub fn client_identity<B>(req: &Request<B>, trust_proxy_headers: bool) -> String {
    let forwarded = if trust_proxy_headers {
        header_ip(req.headers(), "x-real-ip")
            .or_else(|| header_ip(req.headers(), "x-forwarded-for"))
    } else {
        None
    };

    forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip())
        })
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub async fn rate_limit(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let ip = client_identity(&req, state.config.trust_proxy_headers);
    tracing::debug!(client = %ip, "Checking rate limit");

    let decision = state.limiter.admit(&ip).await;
    if !decision.allowed {
        let status = StatusCode::TOO_MANY_REQUESTS;
        return (
            status,
            Json(RateLimitedResponse {
                status: status.as_u16(),
                request_count: decision.current_count,
                message: format!(
                    "Too many requests, please retry in {} seconds",
                    state.limiter.window().as_secs()
                ),
            }),
        )
            .into_response();
    }

    next.run(req).await
}
