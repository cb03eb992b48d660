//! 存储键生成
//!
//! 缓存条目: `<ns><resource_key>`；限流计数: `<ns>rate:<client_identity>`。
//! 设置了命名空间时 `<ns>` 为 `"<namespace>:"`，否则为空。

/// 限流计数键前缀
const RATE_PREFIX: &str = "rate:";

/// 集合资源的固定键
pub const CHARACTER_COLLECTION: &str = "character";

#[derive(Debug, Clone, Default)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(namespace: &str) -> Self {
        let namespace = namespace.trim().trim_end_matches(':');
        let prefix = if namespace.is_empty() {
            String::new()
        } else {
            format!("{}:", namespace)
        };
        Self { prefix }
    }

    /// 生成缓存条目键
    pub fn resource_key(&self, resource_key: &str) -> String {
        format!("{}{}", self.prefix, resource_key)
    }

    /// 生成限流计数键
    pub fn rate_key(&self, client_identity: &str) -> String {
        format!("{}{}{}", self.prefix, RATE_PREFIX, client_identity)
    }
}

/// 单个角色资源键
pub fn character_key(id: &str) -> String {
    format!("{}/{}", CHARACTER_COLLECTION, id)
}
