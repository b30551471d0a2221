//! 拦截器类型描述符
//!
//! 描述符在注册期一次性解析完成，之后不可变：状态分类、状态工厂，
//! 以及按"祖先在前、后代在后"顺序展开的生命周期钩子实现列表。
//! 深层/虚继承不依赖动态分派，而是在构建期通过 [`InterceptorDescriptor::extending`]
//! 把祖先定义的钩子显式排在列表前部。

use std::sync::Arc;

use crate::invocation::{AroundFn, Invocation, LifecycleContext, LifecycleFn};
use crate::state::{ManagedState, StateFactory};
use crate::EngineResult;
use serde_json::Value;

/// 生命周期钩子种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    PostConstruct,
    AroundInvoke,
    PrePassivate,
    PostActivate,
    PreDestroy,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::PostConstruct => "postConstruct",
            HookKind::AroundInvoke => "aroundInvoke",
            HookKind::PrePassivate => "prePassivate",
            HookKind::PostActivate => "postActivate",
            HookKind::PreDestroy => "preDestroy",
        }
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 拦截器状态分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatePolicy {
    /// 每次所属组件钝化后重新激活时重置为默认值
    Transient,
    /// 随所属组件一起序列化并原样恢复
    Persisted,
    /// 进程内每个拦截器类型仅有一个实例，只能由应用逻辑显式重置
    Shared,
}

impl std::fmt::Display for StatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatePolicy::Transient => write!(f, "transient"),
            StatePolicy::Persisted => write!(f, "persisted"),
            StatePolicy::Shared => write!(f, "shared"),
        }
    }
}

/// 钩子回调
#[derive(Clone)]
pub enum HookCallback {
    /// 生命周期钩子（平铺执行，无嵌套）
    Lifecycle(LifecycleFn),
    /// 环绕钩子（通过 proceed 嵌套执行）
    Around(AroundFn),
}

/// 一个钩子实现
///
/// `defined_in` 记录定义该实现的继承层级名，继承的钩子保留祖先层级名。
#[derive(Clone)]
pub struct HookImpl {
    pub kind: HookKind,
    pub defined_in: String,
    pub callback: HookCallback,
}

/// 拦截器类型描述符
pub struct InterceptorDescriptor {
    pub name: String,
    pub policy: StatePolicy,
    factory: StateFactory,
    hooks: Vec<HookImpl>,
}

impl InterceptorDescriptor {
    /// 创建描述符
    pub fn new(
        name: impl Into<String>,
        policy: StatePolicy,
        factory: impl Fn() -> Box<dyn ManagedState> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            factory: Arc::new(factory),
            hooks: Vec::new(),
        }
    }

    /// 以 `S::default()` 为状态工厂创建描述符
    pub fn with_state<S: ManagedState + Default>(
        name: impl Into<String>,
        policy: StatePolicy,
    ) -> Self {
        Self::new(name, policy, || Box::new(S::default()))
    }

    /// 继承一个祖先定义
    ///
    /// 复制祖先的状态分类、状态工厂与全部钩子；后代随后追加的钩子
    /// 排在祖先钩子之后，保证链展开时"祖先实现在前"。
    pub fn extending(name: impl Into<String>, parent: &InterceptorDescriptor) -> Self {
        Self {
            name: name.into(),
            policy: parent.policy,
            factory: Arc::clone(&parent.factory),
            hooks: parent.hooks.clone(),
        }
    }

    /// 覆盖状态分类
    pub fn with_policy(mut self, policy: StatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 覆盖状态工厂
    pub fn with_state_factory(
        mut self,
        factory: impl Fn() -> Box<dyn ManagedState> + Send + Sync + 'static,
    ) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// 注册一个生命周期钩子实现
    pub fn lifecycle_hook(
        mut self,
        kind: HookKind,
        f: impl Fn(&mut dyn ManagedState, &mut LifecycleContext<'_>) -> EngineResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        assert!(
            kind != HookKind::AroundInvoke,
            "around-invoke hooks must be registered through around_invoke()"
        );
        let defined_in = self.name.clone();
        self.hooks.push(HookImpl {
            kind,
            defined_in,
            callback: HookCallback::Lifecycle(Arc::new(f)),
        });
        self
    }

    /// 注册一个环绕钩子实现
    pub fn around_invoke(
        mut self,
        f: impl Fn(&mut dyn ManagedState, &mut Invocation<'_>) -> EngineResult<Value>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        let defined_in = self.name.clone();
        self.hooks.push(HookImpl {
            kind: HookKind::AroundInvoke,
            defined_in,
            callback: HookCallback::Around(Arc::new(f)),
        });
        self
    }

    /// 产生一个默认字段值的新状态实例
    pub fn new_state(&self) -> Box<dyn ManagedState> {
        (self.factory)()
    }

    /// 状态工厂
    pub fn factory(&self) -> &StateFactory {
        &self.factory
    }

    /// 全部钩子实现（祖先在前）
    pub fn hooks(&self) -> &[HookImpl] {
        &self.hooks
    }

    /// 指定种类的钩子实现（祖先在前）
    pub fn hooks_for(&self, kind: HookKind) -> impl Iterator<Item = &HookImpl> {
        self.hooks.iter().filter(move |h| h.kind == kind)
    }
}

impl std::fmt::Debug for InterceptorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorDescriptor")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
