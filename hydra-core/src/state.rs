//! 实例状态抽象
//!
//! 拦截器实例与组件实例的字段状态统一通过 [`ManagedState`] 管理。
//! Persisted 状态通过 `snapshot` / `restore` 参与钝化，引擎本身不定义
//! 字节格式，只规定哪些字段参与（见 `snapshot` 的返回值）。

use std::any::Any;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// 被引擎管理的状态
///
/// `snapshot` / `restore` 的默认实现是空操作：Transient 与 Shared 状态
/// 不参与钝化，只有 Persisted 状态（以及组件自身的状态）需要覆盖它们。
/// 对于实现了 serde 的类型可以直接使用 [`managed_state!`](crate::managed_state) 宏。
pub trait ManagedState: Any + Send {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// 参与钝化的字段快照
    fn snapshot(&self) -> Value {
        Value::Null
    }

    /// 从快照恢复字段
    fn restore(&mut self, _blob: Value) {}
}

/// 无状态拦截器使用的空状态
impl ManagedState for () {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 状态工厂 - 产生默认字段值的新状态实例
pub type StateFactory = Arc<dyn Fn() -> Box<dyn ManagedState> + Send + Sync>;

/// 状态单元
///
/// 粗粒度互斥锁包裹的状态实例句柄。Shared 状态的进程级唯一实例与
/// 组件独占的 Transient / Persisted 实例都以此形式存放。
#[derive(Clone)]
pub struct StateCell {
    inner: Arc<Mutex<Box<dyn ManagedState>>>,
}

impl StateCell {
    /// 包装一个状态实例
    pub fn new(state: Box<dyn ManagedState>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// 通过工厂创建默认字段值的状态单元
    pub fn from_factory(factory: &StateFactory) -> Self {
        Self::new(factory())
    }

    /// 锁定并访问原始状态
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn ManagedState>> {
        self.inner.lock()
    }

    /// 以具体类型访问状态
    pub fn with<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> EngineResult<R> {
        let mut guard = self.inner.lock();
        let state = guard
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| EngineError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
            })?;
        Ok(f(state))
    }

    /// 用全新实例替换当前状态（Transient 激活时重建）
    pub fn replace(&self, state: Box<dyn ManagedState>) {
        *self.inner.lock() = state;
    }

    /// 当前状态的钝化快照
    pub fn snapshot(&self) -> Value {
        self.inner.lock().snapshot()
    }

    /// 从钝化快照恢复
    pub fn restore(&self, blob: Value) {
        self.inner.lock().restore(blob);
    }

    /// 两个单元是否指向同一实例
    pub fn same_instance(&self, other: &StateCell) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for StateCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCell").finish_non_exhaustive()
    }
}

/// 在钩子内部以具体类型访问自身状态
pub fn expect_state<T: 'static>(state: &mut dyn ManagedState) -> EngineResult<&mut T> {
    state
        .as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| EngineError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
        })
}

/// 为实现了 serde 的状态类型生成 [`ManagedState`] 实现
///
/// 快照即整个结构体的 JSON 值，恢复失败时保留当前字段。
///
/// ```ignore
/// #[derive(Default, serde::Serialize, serde::Deserialize)]
/// struct CounterState { calls: u32 }
/// hydra_core::managed_state!(CounterState);
/// ```
#[macro_export]
macro_rules! managed_state {
    ($ty:ty) => {
        impl $crate::state::ManagedState for $ty {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn snapshot(&self) -> $crate::serde_json::Value {
                $crate::serde_json::to_value(self).unwrap_or($crate::serde_json::Value::Null)
            }

            fn restore(&mut self, blob: $crate::serde_json::Value) {
                if let Ok(value) = $crate::serde_json::from_value(blob) {
                    *self = value;
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Default, Serialize, Deserialize)]
    struct Counter {
        calls: u32,
        note: String,
    }

    crate::managed_state!(Counter);

    #[test]
    fn test_state_cell_typed_access() {
        let cell = StateCell::new(Box::new(Counter::default()));

        cell.with::<Counter, _>(|c| c.calls += 1).unwrap();
        let calls = cell.with::<Counter, _>(|c| c.calls).unwrap();
        assert_eq!(calls, 1);

        // 错误类型的访问返回 TypeMismatch
        let err = cell.with::<String, _>(|_| ()).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let cell = StateCell::new(Box::new(Counter {
            calls: 7,
            note: "before".to_string(),
        }));

        let blob = cell.snapshot();

        cell.replace(Box::new(Counter::default()));
        assert_eq!(cell.with::<Counter, _>(|c| c.calls).unwrap(), 0);

        cell.restore(blob);
        assert_eq!(cell.with::<Counter, _>(|c| c.calls).unwrap(), 7);
        assert_eq!(
            cell.with::<Counter, _>(|c| c.note.clone()).unwrap(),
            "before"
        );
    }

    #[test]
    fn test_unit_state_has_null_snapshot() {
        let cell = StateCell::new(Box::new(()));
        assert_eq!(cell.snapshot(), Value::Null);
    }

    #[test]
    fn test_same_instance() {
        let a = StateCell::new(Box::new(()));
        let b = a.clone();
        let c = StateCell::new(Box::new(()));
        assert!(a.same_instance(&b));
        assert!(!a.same_instance(&c));
    }
}
