//! 组件类型描述符与生命周期阶段
//!
//! 组件描述符包含：状态工厂、按"祖先在前"顺序排列的生命周期钩子、
//! 类级绑定声明（默认作用域排除标记、类作用域拦截器列表）以及带
//! 方法级覆盖的业务方法集合。注册后不可变。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::interceptor::{HookCallback, HookImpl, HookKind};
use crate::invocation::{AroundFn, Invocation, LifecycleContext};
use crate::state::{ManagedState, StateFactory};
use crate::EngineResult;

/// 组件实例的生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Uninitialized,
    Active,
    Passivated,
    /// 终态：显式移除
    Removed,
    /// 终态：某次转换在链中途失败，实例不可再用
    Broken,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecyclePhase::Uninitialized => write!(f, "uninitialized"),
            LifecyclePhase::Active => write!(f, "active"),
            LifecyclePhase::Passivated => write!(f, "passivated"),
            LifecyclePhase::Removed => write!(f, "removed"),
            LifecyclePhase::Broken => write!(f, "broken"),
        }
    }
}

/// 方法级绑定覆盖
///
/// 两个排除标记相互独立：排除类作用域不影响默认作用域，反之亦然。
#[derive(Debug, Clone, Default)]
pub struct MethodBindings {
    pub exclude_defaults: bool,
    pub exclude_class: bool,
    /// 方法作用域的源码级声明拦截器（声明顺序）
    pub interceptors: Vec<String>,
}

impl MethodBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// 对该方法排除默认作用域绑定
    pub fn exclude_default_interceptors(mut self) -> Self {
        self.exclude_defaults = true;
        self
    }

    /// 对该方法排除类作用域绑定
    ///
    /// 若同时声明了方法作用域拦截器，则它们替换整条拦截器列表。
    pub fn exclude_class_interceptors(mut self) -> Self {
        self.exclude_class = true;
        self
    }

    /// 追加一个方法作用域拦截器
    pub fn interceptor(mut self, name: impl Into<String>) -> Self {
        self.interceptors.push(name.into());
        self
    }
}

/// 业务方法描述符
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub bindings: MethodBindings,
    /// 方法体 - 链的最内层环节
    pub body: AroundFn,
}

/// 组件类型描述符
pub struct ComponentDescriptor {
    pub name: String,
    factory: StateFactory,
    hooks: Vec<HookImpl>,
    /// 类级默认作用域排除标记
    pub exclude_defaults: bool,
    /// 类作用域的源码级声明拦截器（声明顺序）
    pub class_interceptors: Vec<String>,
    methods: HashMap<String, MethodDescriptor>,
}

impl ComponentDescriptor {
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn ManagedState> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            hooks: Vec::new(),
            exclude_defaults: false,
            class_interceptors: Vec::new(),
            methods: HashMap::new(),
        }
    }

    /// 以 `S::default()` 为状态工厂创建描述符
    pub fn with_state<S: ManagedState + Default>(name: impl Into<String>) -> Self {
        Self::new(name, || Box::new(S::default()))
    }

    /// 继承一个祖先组件定义
    ///
    /// 复制祖先的状态工厂与生命周期钩子（保持祖先实现在前）；
    /// 绑定声明与业务方法不随继承复制。
    pub fn extending(name: impl Into<String>, parent: &ComponentDescriptor) -> Self {
        Self {
            name: name.into(),
            factory: Arc::clone(&parent.factory),
            hooks: parent.hooks.clone(),
            exclude_defaults: false,
            class_interceptors: Vec::new(),
            methods: HashMap::new(),
        }
    }

    /// 覆盖状态工厂
    pub fn with_state_factory(
        mut self,
        factory: impl Fn() -> Box<dyn ManagedState> + Send + Sync + 'static,
    ) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// 注册组件自身的生命周期钩子
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
            "components register business methods, not around-invoke hooks"
        );
        let defined_in = self.name.clone();
        self.hooks.push(HookImpl {
            kind,
            defined_in,
            callback: HookCallback::Lifecycle(Arc::new(f)),
        });
        self
    }

    /// 对整个组件排除默认作用域绑定
    pub fn exclude_default_interceptors(mut self) -> Self {
        self.exclude_defaults = true;
        self
    }

    /// 追加一个类作用域拦截器声明
    pub fn class_interceptor(mut self, name: impl Into<String>) -> Self {
        self.class_interceptors.push(name.into());
        self
    }

    /// 注册一个业务方法
    pub fn business_method(
        mut self,
        name: impl Into<String>,
        bindings: MethodBindings,
        body: impl Fn(&mut dyn ManagedState, &mut Invocation<'_>) -> EngineResult<Value>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        let name = name.into();
        self.methods.insert(
            name.clone(),
            MethodDescriptor {
                name,
                bindings,
                body: Arc::new(body),
            },
        );
        self
    }

    /// 查找业务方法
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// 产生一个默认字段值的新组件状态
    pub fn new_state(&self) -> Box<dyn ManagedState> {
        (self.factory)()
    }

    /// 组件自身指定种类的钩子（祖先在前）
    pub fn hooks_for(&self, kind: HookKind) -> impl Iterator<Item = &HookImpl> {
        self.hooks.iter().filter(move |h| h.kind == kind)
    }
}

impl std::fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("exclude_defaults", &self.exclude_defaults)
            .field("class_interceptors", &self.class_interceptors)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
