//! 拦截器绑定声明
//!
//! 绑定把一个拦截器类型关联到某个作用域（Default / Class / Method），
//! 并记录声明来源：外部声明式配置（Configured）或组件源码级声明
//! （Declared）。同一方法允许两种来源的绑定共存，消歧在解析期完成。

/// 绑定作用域
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingScope {
    /// 应用于所有组件（除非显式排除）
    Default,
    /// 应用于一个组件的所有方法（除非方法显式排除）
    Class,
    /// 应用于一个特定方法
    Method(String),
}

/// 声明来源
///
/// 解析时同一作用域层级内 Configured 总是排在 Declared 之前。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BindingOrigin {
    /// 外部声明式配置
    Configured,
    /// 组件自身的源码级声明
    Declared,
}

/// 拦截器绑定
#[derive(Debug, Clone)]
pub struct Binding {
    /// 被绑定的拦截器类型名
    pub interceptor: String,
    pub scope: BindingScope,
    pub origin: BindingOrigin,
}

impl Binding {
    pub fn new(
        interceptor: impl Into<String>,
        scope: BindingScope,
        origin: BindingOrigin,
    ) -> Self {
        Self {
            interceptor: interceptor.into(),
            scope,
            origin,
        }
    }

    /// 外部配置来源的绑定
    pub fn configured(interceptor: impl Into<String>, scope: BindingScope) -> Self {
        Self::new(interceptor, scope, BindingOrigin::Configured)
    }

    /// 源码声明来源的绑定
    pub fn declared(interceptor: impl Into<String>, scope: BindingScope) -> Self {
        Self::new(interceptor, scope, BindingOrigin::Declared)
    }
}

impl std::fmt::Display for BindingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingScope::Default => write!(f, "default"),
            BindingScope::Class => write!(f, "class"),
            BindingScope::Method(name) => write!(f, "method:{}", name),
        }
    }
}

impl std::fmt::Display for BindingOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingOrigin::Configured => write!(f, "configured"),
            BindingOrigin::Declared => write!(f, "declared"),
        }
    }
}
