// hydra-core: 有状态组件拦截器引擎的声明模型与链解析
//
// 提供拦截器链解析与生命周期分发所需的核心抽象，支持：
// - 拦截器/组件类型描述符（注册期一次性解析，之后不可变）
// - Default / Class / Method 三级绑定作用域与 Configured / Declared 来源
// - 确定且引用稳定的链解析与缓存
// - Transient / Persisted / Shared 三种状态生命周期分类
// - 用于断言链顺序的追加式事件日志

pub mod binding;
pub mod chain;
pub mod component;
pub mod error;
pub mod event_log;
pub mod interceptor;
pub mod invocation;
pub mod logging;
pub mod naming;
pub mod registry;
pub mod resolver;
pub mod state;

// 重新导出常用类型
pub use binding::{Binding, BindingOrigin, BindingScope};
pub use chain::{Chain, ChainEntry, ChainTarget, Trigger};
pub use component::{ComponentDescriptor, LifecyclePhase, MethodBindings, MethodDescriptor};
pub use error::{EngineError, EngineResult};
pub use event_log::EventLog;
pub use interceptor::{HookCallback, HookImpl, HookKind, InterceptorDescriptor, StatePolicy};
pub use invocation::{
    AroundFn, InstanceAccess, Invocation, LifecycleContext, LifecycleFn, PreparedStep,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use naming::{MapNamingSource, NamingContext, NamingSource};
pub use registry::{InterceptorRegistry, RegisteredComponent};
pub use resolver::ChainResolver;
pub use state::{expect_state, ManagedState, StateCell, StateFactory};

// 导出 serde_json，供 managed_state! 宏使用
pub use serde_json;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::binding::{Binding, BindingOrigin, BindingScope};
    pub use crate::chain::{Chain, ChainTarget, Trigger};
    pub use crate::component::{ComponentDescriptor, LifecyclePhase, MethodBindings};
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::event_log::EventLog;
    pub use crate::interceptor::{HookKind, InterceptorDescriptor, StatePolicy};
    pub use crate::invocation::{InstanceAccess, Invocation, LifecycleContext};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::naming::{MapNamingSource, NamingContext, NamingSource};
    pub use crate::registry::InterceptorRegistry;
    pub use crate::resolver::ChainResolver;
    pub use crate::state::{expect_state, ManagedState, StateCell};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
