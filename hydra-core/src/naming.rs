//! 命名/查找协作者
//!
//! 业务方法引用的环境作用域值通过这里解析，对引擎而言是不透明的
//! 透传（pass-through）。类似 Spring Boot 的 Environment：多个命名源
//! 按优先级聚合，高优先级覆盖低优先级。

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

/// 命名源 trait
pub trait NamingSource: Send + Sync {
    /// 命名源名称
    fn name(&self) -> &str;

    /// 查找一个环境作用域值
    fn lookup(&self, key: &str) -> Option<Value>;

    /// 优先级（数字越大优先级越高）
    fn priority(&self) -> i32 {
        0
    }
}

/// 基于内存 Map 的命名源
pub struct MapNamingSource {
    name: String,
    priority: i32,
    values: HashMap<String, Value>,
}

impl MapNamingSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            values: HashMap::new(),
        }
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 添加一个条目
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl NamingSource for MapNamingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 命名上下文 - 聚合所有命名源
#[derive(Default)]
pub struct NamingContext {
    /// 命名源列表（按优先级降序）
    sources: RwLock<Vec<Box<dyn NamingSource>>>,
}

impl NamingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加命名源
    pub fn add_source(&self, source: Box<dyn NamingSource>) {
        let mut sources = self.sources.write();
        sources.push(source);
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// 查找环境作用域值
    pub fn lookup(&self, key: &str) -> Option<Value> {
        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.lookup(key) {
                tracing::debug!("Name '{}' resolved by source '{}'", key, source.name());
                return Some(value);
            }
        }
        None
    }
}

impl std::fmt::Debug for NamingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamingContext")
            .field("sources_count", &self.sources.read().len())
            .finish()
    }
}
