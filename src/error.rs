use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// 键值存储错误，属于"软失败"，调用方决定如何降级
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store is not connected")]
    NotConnected,
    #[error("store has been closed")]
    Closed,
    #[error("store command failed: {0}")]
    Command(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Command(e.to_string())
    }
}

/// 上游 API 错误，属于"硬失败"，原样返回给客户端
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upstream request failed: {message}")]
pub struct UpstreamError {
    /// 上游返回的状态码；传输层失败时为 None
    pub status_code: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    pub fn status(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(status_code),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            message: message.into(),
        }
    }
}

/// CacheGateway::fetch 的失败结果
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 面向 HTTP 的错误
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Upstream(UpstreamError),
    #[error(transparent)]
    Store(StoreError),
    #[error("{0}")]
    BadRequest(String),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Upstream(e) => AppError::Upstream(e),
            GatewayError::Store(e) => AppError::Store(e),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    status_code: u16,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upstream(e) => e
                .status_code
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = match &self {
            AppError::Upstream(e) => e.message.clone(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            error,
            status_code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_mirrored() {
        let err = AppError::Upstream(UpstreamError::status(404, "Character not found"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn transport_failure_maps_to_500() {
        let err = AppError::Upstream(UpstreamError::transport("connection refused"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::Store(StoreError::NotConnected);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bogus_upstream_status_maps_to_500() {
        let err = AppError::Upstream(UpstreamError::status(42, "weird"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
