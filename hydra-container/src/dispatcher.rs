//! 生命周期分发器
//!
//! 驱动组件实例的状态机：Uninitialized -> Active <-> Passivated，以及
//! 两个终态 Removed / Broken。每次转换先解析对应触发器的链再执行；
//! 链中任一钩子失败，错误原样向上传播，实例被标记为 Broken 且不可再用。
//!
//! 钝化快照只包含组件自身状态与 Persisted 拦截器状态；激活时先把
//! Transient 实例重建为默认字段值，再恢复快照，最后运行 PostActivate 链。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use hydra_core::chain::{Chain, ChainTarget, Trigger};
use hydra_core::component::LifecyclePhase;
use hydra_core::error::{EngineError, EngineResult};
use hydra_core::event_log::EventLog;
use hydra_core::interceptor::HookCallback;
use hydra_core::invocation::{InstanceAccess, Invocation, LifecycleContext, PreparedStep};
use hydra_core::naming::NamingContext;
use hydra_core::registry::InterceptorRegistry;
use hydra_core::resolver::ChainResolver;
use hydra_core::state::StateCell;

use crate::instance::{ComponentHandle, ComponentInstance};
use crate::passivation::{InMemoryPassivationStore, PassivationStore};
use crate::store::InstanceStore;

/// 按组件实例实现 [`InstanceAccess`]，把钩子对拦截器状态的访问
/// 路由到实例存储
struct StoreAccess<'a> {
    store: &'a InstanceStore,
    instance: &'a ComponentInstance,
}

impl InstanceAccess for StoreAccess<'_> {
    fn state_of(&self, interceptor: &str) -> EngineResult<StateCell> {
        self.store.get_instance(self.instance, interceptor)
    }
}

/// 生命周期分发器
pub struct LifecycleDispatcher {
    registry: Arc<InterceptorRegistry>,
    resolver: ChainResolver,
    store: InstanceStore,
    log: Arc<EventLog>,
    naming: Arc<NamingContext>,
    passivation: Arc<dyn PassivationStore>,
    next_id: AtomicU64,
}

impl LifecycleDispatcher {
    pub fn new(registry: Arc<InterceptorRegistry>) -> Self {
        Self {
            resolver: ChainResolver::new(Arc::clone(&registry)),
            store: InstanceStore::new(Arc::clone(&registry)),
            log: Arc::new(EventLog::new()),
            naming: Arc::new(NamingContext::new()),
            passivation: Arc::new(InMemoryPassivationStore::new()),
            next_id: AtomicU64::new(1),
            registry,
        }
    }

    /// 替换钝化存储协作者
    pub fn with_passivation_store(mut self, store: Arc<dyn PassivationStore>) -> Self {
        self.passivation = store;
        self
    }

    /// 替换命名上下文
    pub fn with_naming(mut self, naming: Arc<NamingContext>) -> Self {
        self.naming = naming;
        self
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn store(&self) -> &InstanceStore {
        &self.store
    }

    pub fn resolver(&self) -> &ChainResolver {
        &self.resolver
    }

    pub fn naming(&self) -> &NamingContext {
        &self.naming
    }

    /// 创建一个组件实例并运行 Construct 链
    pub fn create(&self, component: &str) -> EngineResult<ComponentHandle> {
        let registered = self.registry.component(component)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let instance = Arc::new(ComponentInstance::new(
            id,
            component,
            registered.descriptor.new_state(),
        ));

        tracing::info!("Creating instance #{} of component '{}'", id, component);
        if let Err(err) = self.run_lifecycle(&instance, Trigger::Construct) {
            self.poison(&instance, &err);
            return Err(err);
        }
        instance.set_phase(LifecyclePhase::Active);
        Ok(instance)
    }

    /// 通过解析出的链分发一次业务方法调用
    pub fn invoke(
        &self,
        instance: &ComponentHandle,
        method: &str,
        args: Value,
    ) -> EngineResult<Value> {
        let trigger = Trigger::BusinessMethod(method.to_string());
        self.ensure_phase(instance, LifecyclePhase::Active, &trigger)?;

        let chain = self.resolver.resolve(instance.component_type(), &trigger)?;
        let steps = self.prepare_steps(instance, &chain)?;
        tracing::debug!(
            "Invoking '{}::{}' on instance #{} through {} chain link(s)",
            instance.component_type(),
            method,
            instance.id(),
            steps.len()
        );

        let access = StoreAccess {
            store: &self.store,
            instance,
        };
        let mut invocation = Invocation::new(
            &self.log,
            &self.naming,
            &access,
            instance.state().clone(),
            method,
            args,
            steps,
        );
        match invocation.proceed() {
            Ok(value) => Ok(value),
            Err(err) => {
                self.poison(instance, &err);
                Err(err)
            }
        }
    }

    /// 钝化一个实例：运行 PrePassivate 链，随后快照并交给钝化存储
    pub fn passivate(&self, instance: &ComponentHandle) -> EngineResult<()> {
        let trigger = Trigger::PrePassivate;
        self.ensure_phase(instance, LifecyclePhase::Active, &trigger)?;

        if let Err(err) = self.run_lifecycle(instance, trigger) {
            self.poison(instance, &err);
            return Err(err);
        }

        let mut interceptors = serde_json::Map::new();
        for (name, cell) in self.store.persisted_entries(instance)? {
            interceptors.insert(name, cell.snapshot());
        }
        let blob = json!({
            "component": instance.state().snapshot(),
            "interceptors": Value::Object(interceptors),
        });
        self.passivation.save(instance.id(), blob)?;

        instance.set_phase(LifecyclePhase::Passivated);
        tracing::info!("Instance #{} passivated", instance.id());
        Ok(())
    }

    /// 激活一个钝化的实例：重建 Transient、恢复快照、运行 PostActivate 链
    pub fn activate(&self, instance: &ComponentHandle) -> EngineResult<()> {
        let trigger = Trigger::PostActivate;
        self.ensure_phase(instance, LifecyclePhase::Passivated, &trigger)?;

        // Transient 先回到默认字段值，快照恢复不触碰它们
        self.store.reset_transients(instance)?;

        let blob = self.passivation.load(instance.id())?;
        if let Some(component) = blob.get("component") {
            instance.state().restore(component.clone());
        }
        if let Some(Value::Object(map)) = blob.get("interceptors") {
            for (name, snapshot) in map {
                let cell = self.store.get_instance(instance, name)?;
                cell.restore(snapshot.clone());
            }
        }

        if let Err(err) = self.run_lifecycle(instance, trigger) {
            self.poison(instance, &err);
            return Err(err);
        }
        instance.set_phase(LifecyclePhase::Active);
        tracing::info!("Instance #{} activated", instance.id());
        Ok(())
    }

    /// 移除一个实例：运行 Remove 链后进入终态，独占实例随之释放
    pub fn remove(&self, instance: &ComponentHandle) -> EngineResult<()> {
        let trigger = Trigger::Remove;
        self.ensure_phase(instance, LifecyclePhase::Active, &trigger)?;

        if let Err(err) = self.run_lifecycle(instance, trigger) {
            self.poison(instance, &err);
            return Err(err);
        }

        self.store.release(instance);
        self.passivation.discard(instance.id());
        instance.set_phase(LifecyclePhase::Removed);
        tracing::info!("Instance #{} removed", instance.id());
        Ok(())
    }

    /// 进程级唯一的 Shared 实例
    pub fn shared_state(&self, interceptor: &str) -> EngineResult<StateCell> {
        self.store.shared(interceptor)
    }

    /// 显式重置一个 Shared 实例为默认字段值
    pub fn reset_shared(&self, interceptor: &str) -> EngineResult<()> {
        self.store.reset_shared(interceptor)
    }

    fn ensure_phase(
        &self,
        instance: &ComponentInstance,
        expected: LifecyclePhase,
        trigger: &Trigger,
    ) -> EngineResult<()> {
        let phase = instance.phase();
        if phase == LifecyclePhase::Removed {
            return Err(EngineError::InstanceRemoved(instance.id()));
        }
        if phase != expected {
            return Err(EngineError::InvalidTransition {
                instance: instance.id(),
                phase,
                trigger: trigger.clone(),
            });
        }
        Ok(())
    }

    /// 平铺执行一条生命周期链；任一钩子失败即中止并传播
    fn run_lifecycle(&self, instance: &ComponentInstance, trigger: Trigger) -> EngineResult<()> {
        let chain = self.resolver.resolve(instance.component_type(), &trigger)?;
        let access = StoreAccess {
            store: &self.store,
            instance,
        };

        for entry in &chain.entries {
            let cell = self.cell_for(instance, &entry.target)?;
            let callback = match &entry.callback {
                HookCallback::Lifecycle(f) => Arc::clone(f),
                HookCallback::Around(_) => {
                    return Err(EngineError::Other(anyhow::anyhow!(
                        "around-invoke hook '{}' resolved into a lifecycle chain",
                        entry.label()
                    )))
                }
            };

            tracing::trace!("Running lifecycle link '{}'", entry.label());
            let mut context = LifecycleContext::new(
                &self.log,
                &self.naming,
                &access,
                instance.state().clone(),
                cell.clone(),
                trigger.clone(),
            );
            let mut guard = cell.lock();
            callback(&mut **guard, &mut context)?;
        }
        Ok(())
    }

    /// 把解析出的业务方法链绑定到当前实例的状态单元
    fn prepare_steps(
        &self,
        instance: &ComponentInstance,
        chain: &Chain,
    ) -> EngineResult<Vec<PreparedStep>> {
        chain
            .entries
            .iter()
            .map(|entry| {
                let cell = self.cell_for(instance, &entry.target)?;
                let callback = match &entry.callback {
                    HookCallback::Around(f) => Arc::clone(f),
                    HookCallback::Lifecycle(_) => {
                        return Err(EngineError::Other(anyhow::anyhow!(
                            "lifecycle hook '{}' resolved into a business-method chain",
                            entry.label()
                        )))
                    }
                };
                Ok(PreparedStep {
                    label: entry.label(),
                    cell,
                    callback,
                })
            })
            .collect()
    }

    fn cell_for(
        &self,
        instance: &ComponentInstance,
        target: &ChainTarget,
    ) -> EngineResult<StateCell> {
        match target {
            ChainTarget::Interceptor(name) => self.store.get_instance(instance, name),
            ChainTarget::Component => Ok(instance.state().clone()),
        }
    }

    fn poison(&self, instance: &ComponentInstance, err: &EngineError) {
        tracing::warn!(
            "Instance #{} marked broken after chain failure: {}",
            instance.id(),
            err
        );
        instance.set_phase(LifecyclePhase::Broken);
    }
}

impl std::fmt::Debug for LifecycleDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleDispatcher")
            .field("registry", &self.registry)
            .field("store", &self.store)
            .finish()
    }
}
