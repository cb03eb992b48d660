//! 上游数据 API 客户端

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::error::UpstreamError;

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// 读取 `resource_key` 对应的资源，非 2xx 或传输失败都返回 `UpstreamError`
    async fn fetch(&self, resource_key: &str) -> Result<Bytes, UpstreamError>;
}

/// 基于 reqwest 的实现，URL = base_url + resource_key
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUpstream {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { client, base_url }
    }

    pub fn url_for(&self, resource_key: &str) -> String {
        format!("{}{}", self.base_url, resource_key.trim_start_matches('/'))
    }
}

/// 上游错误体通常是 `{"error": "..."}`，取不到时退回状态码描述
fn error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct UpstreamErrorBody {
        error: String,
    }

    serde_json::from_slice::<UpstreamErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("upstream request failed")
                .to_string()
        })
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn fetch(&self, resource_key: &str) -> Result<Bytes, UpstreamError> {
        let url = self.url_for(resource_key);
        tracing::debug!(%url, "Fetching from upstream");

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::warn!(%url, error = %e, "Upstream request failed");
            UpstreamError::transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        if !status.is_success() {
            tracing::info!(%url, status = status.as_u16(), "Upstream returned an error status");
            return Err(UpstreamError::status(status.as_u16(), error_message(status, &body)));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_key() {
        let upstream = HttpUpstream::with_client(
            reqwest::Client::new(),
            "https://rickandmortyapi.com/api",
        );
        assert_eq!(
            upstream.url_for("character/1"),
            "https://rickandmortyapi.com/api/character/1"
        );
        assert_eq!(
            upstream.url_for("/character"),
            "https://rickandmortyapi.com/api/character"
        );
    }

    #[test]
    fn error_message_prefers_upstream_body() {
        let msg = error_message(
            reqwest::StatusCode::NOT_FOUND,
            br#"{"error":"Character not found"}"#,
        );
        assert_eq!(msg, "Character not found");

        let msg = error_message(reqwest::StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        assert_eq!(msg, "Bad Gateway");
    }
}
