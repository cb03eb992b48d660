use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub redis_url: Option<String>,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,
    pub redis_timeout_ms: u64,
    pub upstream_base_url: String,
    pub upstream_timeout_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub rate_limit_requests: u64,
    pub rate_limit_window_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_fail_open: bool,
    pub trust_proxy_headers: bool,
    pub key_namespace: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// 从任意变量来源构建配置，测试时无需修改进程环境
    pub fn from_vars<F>(lookup: F) -> Result<Self, env::VarError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_or = |name: &str, default: u64| -> u64 {
            lookup(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let flag_or = |name: &str, default: bool| -> bool {
            match lookup(name).map(|v| v.trim().to_ascii_lowercase()) {
                Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
                Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
                _ => default,
            }
        };

        Ok(Config {
            redis_url: lookup("REDIS_URL").filter(|v| !v.trim().is_empty()),
            redis_host: lookup("REDIS_HOSTNAME").unwrap_or_else(|| "127.0.0.1".into()),
            redis_port: lookup("REDIS_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(6379),
            redis_password: lookup("REDIS_PASSWORD").filter(|v| !v.is_empty()),
            redis_timeout_ms: parse_or("REDIS_TIMEOUT_MS", 1000),
            upstream_base_url: lookup("API_URL").ok_or(env::VarError::NotPresent)?,
            upstream_timeout_secs: parse_or("UPSTREAM_TIMEOUT_SECS", 10),
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "::".into()),
            server_port: lookup("SERVER_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(3000),
            api_base_uri: normalize_base_uri(&lookup("API_BASE_URI").unwrap_or_default()),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 20),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 3600),
            cache_ttl_secs: parse_or("CACHE_TTL", 10),
            cache_fail_open: flag_or("CACHE_FAIL_OPEN", true),
            trust_proxy_headers: flag_or("TRUST_PROXY_HEADERS", true),
            key_namespace: lookup("KEY_NAMESPACE").unwrap_or_default().trim().to_string(),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Redis 建连与命令超时，超时后按存储不可用处理
    pub fn redis_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_timeout_ms.max(1))
    }

    /// REDIS_URL 优先，否则由 host/port/password 组装
    pub fn redis_connection_info(&self) -> redis::RedisResult<redis::ConnectionInfo> {
        use redis::IntoConnectionInfo;

        if let Some(url) = &self.redis_url {
            return url.as_str().into_connection_info();
        }
        let mut info = format!("redis://{}:{}/", self.redis_host, self.redis_port)
            .into_connection_info()?;
        info.redis.password = self.redis_password.clone();
        Ok(info)
    }
}

/// "" 和 "/" 表示不加前缀；其他值统一成 "/api" 这种形式
fn normalize_base_uri(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
