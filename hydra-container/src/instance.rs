//! 组件实例
//!
//! 一个组件类型的存活实例：持有组件自身的状态、当前生命周期阶段，
//! 以及独占的 Transient / Persisted 拦截器实例。Shared 实例由
//! [`InstanceStore`](crate::store::InstanceStore) 进程级持有，这里只通过
//! 解析出的绑定引用，不拥有。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use hydra_core::component::LifecyclePhase;
use hydra_core::state::{ManagedState, StateCell};
use hydra_core::EngineResult;

/// 组件实例句柄
///
/// 引擎按实例串行分发（同一实例同时至多一个在途调用，由容器保证），
/// 句柄本身可以在调用方之间自由克隆。
pub type ComponentHandle = Arc<ComponentInstance>;

/// 一个存活的组件实例
pub struct ComponentInstance {
    id: u64,
    component: String,
    phase: Mutex<LifecyclePhase>,
    state: StateCell,
    /// 独占的拦截器实例（Transient 与 Persisted），随实例销毁
    owned: Mutex<HashMap<String, StateCell>>,
}

impl ComponentInstance {
    pub(crate) fn new(id: u64, component: impl Into<String>, state: Box<dyn ManagedState>) -> Self {
        Self {
            id,
            component: component.into(),
            phase: Mutex::new(LifecyclePhase::Uninitialized),
            state: StateCell::new(state),
            owned: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// 所属组件类型名
    pub fn component_type(&self) -> &str {
        &self.component
    }

    /// 当前生命周期阶段
    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.lock()
    }

    pub(crate) fn set_phase(&self, phase: LifecyclePhase) {
        let mut current = self.phase.lock();
        tracing::debug!(
            "Instance #{} phase transition: {} -> {}",
            self.id,
            *current,
            phase
        );
        *current = phase;
    }

    /// 组件自身的状态单元
    pub fn state(&self) -> &StateCell {
        &self.state
    }

    /// 以具体类型访问组件状态
    pub fn with_state<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> EngineResult<R> {
        self.state.with(f)
    }

    pub(crate) fn owned_get(&self, interceptor: &str) -> Option<StateCell> {
        self.owned.lock().get(interceptor).cloned()
    }

    pub(crate) fn owned_insert(&self, interceptor: impl Into<String>, cell: StateCell) {
        self.owned.lock().insert(interceptor.into(), cell);
    }

    /// 独占实例的快照列表（名字 + 状态单元）
    pub(crate) fn owned_entries(&self) -> Vec<(String, StateCell)> {
        self.owned
            .lock()
            .iter()
            .map(|(name, cell)| (name.clone(), cell.clone()))
            .collect()
    }

    /// 释放全部独占实例（Remove 时调用）
    pub(crate) fn owned_clear(&self) {
        self.owned.lock().clear();
    }
}

impl std::fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("component", &self.component)
            .field("phase", &self.phase())
            .field("owned", &self.owned.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}
