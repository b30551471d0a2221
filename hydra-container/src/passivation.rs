//! 钝化存储协作者
//!
//! 引擎只规定哪些字段参与钝化（组件状态 + Persisted 拦截器状态），
//! 不定义字节格式；blob 以 `serde_json::Value` 形式交给存储协作者。

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

use hydra_core::{EngineError, EngineResult};

/// 钝化存储 trait
pub trait PassivationStore: Send + Sync {
    /// 写入一个实例的钝化 blob
    fn save(&self, instance: u64, blob: Value) -> EngineResult<()>;

    /// 取出（并消费）一个实例的钝化 blob
    fn load(&self, instance: u64) -> EngineResult<Value>;

    /// 丢弃一个实例的钝化 blob（若有）
    fn discard(&self, instance: u64);
}

/// 基于内存的默认钝化存储
#[derive(Default)]
pub struct InMemoryPassivationStore {
    blobs: Mutex<HashMap<u64, Value>>,
}

impl InMemoryPassivationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

impl PassivationStore for InMemoryPassivationStore {
    fn save(&self, instance: u64, blob: Value) -> EngineResult<()> {
        tracing::debug!("Storing passivation blob for instance #{}", instance);
        self.blobs.lock().insert(instance, blob);
        Ok(())
    }

    fn load(&self, instance: u64) -> EngineResult<Value> {
        self.blobs.lock().remove(&instance).ok_or_else(|| {
            EngineError::Passivation(format!("no passivated state for instance #{}", instance))
        })
    }

    fn discard(&self, instance: u64) {
        self.blobs.lock().remove(&instance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_load_consumes_blob() {
        let store = InMemoryPassivationStore::new();
        store.save(1, json!({"component": {"value": "x"}})).unwrap();
        assert_eq!(store.len(), 1);

        let blob = store.load(1).unwrap();
        assert_eq!(blob["component"]["value"], "x");

        // load 消费 blob，二次 load 是错误
        assert!(matches!(
            store.load(1).unwrap_err(),
            EngineError::Passivation(_)
        ));
    }

    #[test]
    fn test_discard_is_idempotent() {
        let store = InMemoryPassivationStore::new();
        store.save(2, json!(null)).unwrap();
        store.discard(2);
        store.discard(2);
        assert!(store.is_empty());
    }
}
