use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;

pub const X_RESPONSE_TIME: &str = "x-response-time";

/// 在响应头中记录处理耗时，格式如 `12.345ms`
pub async fn response_time(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(req).await;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if let Ok(value) = HeaderValue::from_str(&format!("{:.3}ms", elapsed_ms)) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(X_RESPONSE_TIME), value);
    }
    response
}
