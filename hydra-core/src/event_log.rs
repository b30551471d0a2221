//! 事件日志
//!
//! 验证链顺序的工具：钩子执行时追加一个不透明的字符串记号，
//! 测试工具将完整日志与期望的字面序列做精确比较（长度与顺序都必须一致）。
//! 只追加，除显式 `clear` 外不重排、不删除。

use parking_lot::Mutex;

/// 追加式事件日志
#[derive(Default)]
pub struct EventLog {
    entries: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个记号
    pub fn append(&self, token: impl Into<String>) {
        let token = token.into();
        tracing::trace!("Event log append: '{}'", token);
        self.entries.lock().push(token);
    }

    /// 显式清空
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// 当前日志的有序副本
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// 与期望序列做精确比较，返回第一处分歧
    pub fn expect(&self, expected: &[&str]) -> Result<(), String> {
        let actual = self.snapshot();
        if actual.len() != expected.len() {
            return Err(format!(
                "event log length mismatch: expected {} entries, found {}: {:?}",
                expected.len(),
                actual.len(),
                actual
            ));
        }
        for (index, (got, want)) in actual.iter().zip(expected.iter()).enumerate() {
            if got != want {
                return Err(format!(
                    "event log mismatch at index {}: expected '{}', found '{}'",
                    index, want, got
                ));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("entries", &self.snapshot())
            .finish()
    }
}
