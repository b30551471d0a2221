//! 拦截器实例存储
//!
//! 按状态分类裁决每个拦截器实例的归属：Shared 实例进程级唯一、由存储
//! 自身持有并惰性创建；Transient / Persisted 实例归所属组件实例独占，
//! 首次被链引用时通过类型的状态工厂创建。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use hydra_core::interceptor::StatePolicy;
use hydra_core::registry::InterceptorRegistry;
use hydra_core::state::StateCell;
use hydra_core::EngineResult;

use crate::instance::ComponentInstance;

/// 拦截器实例存储
pub struct InstanceStore {
    registry: Arc<InterceptorRegistry>,
    /// 进程级唯一的 Shared 实例（按拦截器类型名）
    shared: Mutex<HashMap<String, StateCell>>,
}

impl InstanceStore {
    pub fn new(registry: Arc<InterceptorRegistry>) -> Self {
        Self {
            registry,
            shared: Mutex::new(HashMap::new()),
        }
    }

    /// 取得某个拦截器类型对给定组件实例生效的状态单元
    ///
    /// Shared 返回进程级唯一实例，其余返回组件独占实例；两者都在
    /// 首次引用时通过状态工厂惰性创建。
    pub fn get_instance(
        &self,
        instance: &ComponentInstance,
        interceptor: &str,
    ) -> EngineResult<StateCell> {
        let descriptor = self.registry.interceptor(interceptor)?;

        if descriptor.policy == StatePolicy::Shared {
            return Ok(self.shared_cell(&descriptor.name, || {
                StateCell::new(descriptor.new_state())
            }));
        }

        if let Some(cell) = instance.owned_get(interceptor) {
            return Ok(cell);
        }

        tracing::debug!(
            "Creating {} instance of '{}' for component instance #{}",
            descriptor.policy,
            interceptor,
            instance.id()
        );
        let cell = StateCell::new(descriptor.new_state());
        instance.owned_insert(interceptor, cell.clone());
        Ok(cell)
    }

    /// 进程级唯一的 Shared 实例（惰性创建）
    pub fn shared(&self, interceptor: &str) -> EngineResult<StateCell> {
        let descriptor = self.registry.interceptor(interceptor)?;
        Ok(self.shared_cell(&descriptor.name, || {
            StateCell::new(descriptor.new_state())
        }))
    }

    fn shared_cell(&self, name: &str, create: impl FnOnce() -> StateCell) -> StateCell {
        let mut shared = self.shared.lock();
        if let Some(cell) = shared.get(name) {
            return cell.clone();
        }
        tracing::debug!("Creating process-wide shared instance of '{}'", name);
        let cell = create();
        shared.insert(name.to_string(), cell.clone());
        cell
    }

    /// 显式重置一个 Shared 实例为默认字段值
    ///
    /// 就地替换状态，已持有该单元引用的调用方立即观察到重置结果。
    pub fn reset_shared(&self, interceptor: &str) -> EngineResult<()> {
        let descriptor = self.registry.interceptor(interceptor)?;
        if let Some(cell) = self.shared.lock().get(&descriptor.name) {
            tracing::debug!("Resetting shared instance of '{}'", interceptor);
            cell.replace(descriptor.new_state());
        }
        Ok(())
    }

    /// 激活前把组件独占的 Transient 实例重建为默认字段值
    pub fn reset_transients(&self, instance: &ComponentInstance) -> EngineResult<()> {
        for (name, cell) in instance.owned_entries() {
            let descriptor = self.registry.interceptor(&name)?;
            if descriptor.policy == StatePolicy::Transient {
                tracing::trace!(
                    "Rebuilding transient instance of '{}' for component instance #{}",
                    name,
                    instance.id()
                );
                cell.replace(descriptor.new_state());
            }
        }
        Ok(())
    }

    /// 组件独占的 Persisted 实例列表（参与钝化快照）
    pub fn persisted_entries(
        &self,
        instance: &ComponentInstance,
    ) -> EngineResult<Vec<(String, StateCell)>> {
        let mut entries = Vec::new();
        for (name, cell) in instance.owned_entries() {
            let descriptor = self.registry.interceptor(&name)?;
            if descriptor.policy == StatePolicy::Persisted {
                entries.push((name, cell));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// 释放一个组件实例的全部独占实例（Remove 时调用）
    pub fn release(&self, instance: &ComponentInstance) {
        instance.owned_clear();
    }
}

impl std::fmt::Debug for InstanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceStore")
            .field("shared", &self.shared.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}
