use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::AppState;

/// Ping响应
#[derive(Serialize)]
pub struct PingResponse {
    /// 服务状态
    pub status: String,
    /// 存储状态，up / down
    pub store: String,
    /// 服务器时间
    pub timestamp: i64,
}

/// 健康检查接口；存储不可用时服务仍可降级运行，因此始终返回 200
pub async fn ping(State(state): State<AppState>) -> impl IntoResponse {
    let store = match state.store.ping().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "Store ping failed");
            "down"
        }
    };

    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
            store: store.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }),
    )
}
