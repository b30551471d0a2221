//! 拦截器注册表
//!
//! 持有拦截器类型描述符、组件类型描述符及其绑定声明。类型在注册期
//! 一次性解析，之后不可变；同名重复注册被拒绝。同一方法上 Configured
//! 与 Declared 来源的方法作用域绑定允许共存，由解析器在解析期消歧。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::binding::{Binding, BindingOrigin, BindingScope};
use crate::component::ComponentDescriptor;
use crate::error::{EngineError, EngineResult};
use crate::interceptor::InterceptorDescriptor;

/// 已注册的组件类型 - 描述符加上外部配置来源的绑定
pub struct RegisteredComponent {
    pub descriptor: ComponentDescriptor,
    /// Class / Method 作用域的外部配置绑定（声明顺序）
    pub configured: Vec<Binding>,
}

impl std::fmt::Debug for RegisteredComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredComponent")
            .field("descriptor", &self.descriptor.name)
            .field("configured", &self.configured)
            .finish()
    }
}

/// 拦截器注册表
#[derive(Default)]
pub struct InterceptorRegistry {
    interceptors: RwLock<HashMap<String, Arc<InterceptorDescriptor>>>,
    components: RwLock<HashMap<String, Arc<RegisteredComponent>>>,
    /// 默认作用域绑定（注册顺序）
    defaults: RwLock<Vec<Binding>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册拦截器类型
    pub fn register_interceptor_type(&self, descriptor: InterceptorDescriptor) -> EngineResult<()> {
        let name = descriptor.name.clone();
        let mut interceptors = self.interceptors.write();
        if interceptors.contains_key(&name) {
            tracing::warn!("Interceptor type '{}' already registered", name);
            return Err(EngineError::DuplicateType(name));
        }
        tracing::debug!(
            "Registered interceptor type '{}' (policy: {}, hooks: {})",
            name,
            descriptor.policy,
            descriptor.hooks().len()
        );
        interceptors.insert(name, Arc::new(descriptor));
        Ok(())
    }

    /// 注册组件类型及其外部配置绑定
    ///
    /// 传入的 Default 作用域绑定会被并入全局默认绑定列表。
    pub fn register_component_type(
        &self,
        descriptor: ComponentDescriptor,
        configured: Vec<Binding>,
    ) -> EngineResult<()> {
        let name = descriptor.name.clone();
        let mut components = self.components.write();
        if components.contains_key(&name) {
            tracing::warn!("Component type '{}' already registered", name);
            return Err(EngineError::DuplicateType(name));
        }

        let mut scoped = Vec::new();
        for binding in configured {
            if binding.scope == BindingScope::Default {
                tracing::warn!(
                    "Default-scope binding for '{}' supplied with component '{}', promoting to the global default list",
                    binding.interceptor,
                    name
                );
                self.defaults.write().push(binding);
            } else {
                scoped.push(binding);
            }
        }

        tracing::debug!(
            "Registered component type '{}' ({} configured binding(s))",
            name,
            scoped.len()
        );
        components.insert(
            name,
            Arc::new(RegisteredComponent {
                descriptor,
                configured: scoped,
            }),
        );
        Ok(())
    }

    /// 注册一个默认作用域绑定
    pub fn register_default_binding(
        &self,
        interceptor: impl Into<String>,
        origin: BindingOrigin,
    ) {
        let binding = Binding::new(interceptor, BindingScope::Default, origin);
        tracing::debug!(
            "Registered default-scope binding for '{}' ({})",
            binding.interceptor,
            binding.origin
        );
        self.defaults.write().push(binding);
    }

    /// 查找拦截器类型
    pub fn interceptor(&self, name: &str) -> EngineResult<Arc<InterceptorDescriptor>> {
        self.interceptors
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownType(name.to_string()))
    }

    /// 查找组件类型
    pub fn component(&self, name: &str) -> EngineResult<Arc<RegisteredComponent>> {
        self.components
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownType(name.to_string()))
    }

    /// 默认作用域绑定的副本（注册顺序）
    pub fn default_bindings(&self) -> Vec<Binding> {
        self.defaults.read().clone()
    }

    pub fn contains_interceptor(&self, name: &str) -> bool {
        self.interceptors.read().contains_key(name)
    }

    pub fn contains_component(&self, name: &str) -> bool {
        self.components.read().contains_key(name)
    }
}

impl std::fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field(
                "interceptors",
                &self.interceptors.read().keys().collect::<Vec<_>>(),
            )
            .field(
                "components",
                &self.components.read().keys().collect::<Vec<_>>(),
            )
            .field("defaults", &self.defaults.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::StatePolicy;

    #[test]
    fn test_duplicate_interceptor_rejected() {
        let registry = InterceptorRegistry::new();
        registry
            .register_interceptor_type(InterceptorDescriptor::with_state::<()>(
                "Audit",
                StatePolicy::Transient,
            ))
            .unwrap();

        let err = registry
            .register_interceptor_type(InterceptorDescriptor::with_state::<()>(
                "Audit",
                StatePolicy::Shared,
            ))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateType(name) if name == "Audit"));
    }

    #[test]
    fn test_duplicate_component_rejected() {
        let registry = InterceptorRegistry::new();
        registry
            .register_component_type(ComponentDescriptor::with_state::<()>("Cart"), Vec::new())
            .unwrap();

        let err = registry
            .register_component_type(ComponentDescriptor::with_state::<()>("Cart"), Vec::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateType(_)));
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = InterceptorRegistry::new();
        assert!(matches!(
            registry.interceptor("nope").unwrap_err(),
            EngineError::UnknownType(_)
        ));
        assert!(matches!(
            registry.component("nope").unwrap_err(),
            EngineError::UnknownType(_)
        ));
    }

    #[test]
    fn test_default_scope_binding_promoted() {
        let registry = InterceptorRegistry::new();
        registry
            .register_component_type(
                ComponentDescriptor::with_state::<()>("Cart"),
                vec![
                    Binding::configured("Audit", BindingScope::Default),
                    Binding::configured("Tx", BindingScope::Class),
                ],
            )
            .unwrap();

        let defaults = registry.default_bindings();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].interceptor, "Audit");

        let reg = registry.component("Cart").unwrap();
        assert_eq!(reg.configured.len(), 1);
        assert_eq!(reg.configured[0].interceptor, "Tx");
    }

    #[test]
    fn test_configured_and_declared_method_bindings_coexist() {
        let registry = InterceptorRegistry::new();
        let descriptor = ComponentDescriptor::with_state::<()>("Cart").business_method(
            "checkout",
            crate::component::MethodBindings::new().interceptor("Declared"),
            |_, inv| inv.proceed(),
        );

        registry
            .register_component_type(
                descriptor,
                vec![Binding::configured(
                    "Configured",
                    BindingScope::Method("checkout".into()),
                )],
            )
            .unwrap();

        // 两种来源都被保留，消歧交给解析器
        let reg = registry.component("Cart").unwrap();
        assert_eq!(reg.configured.len(), 1);
        assert_eq!(
            reg.descriptor.method("checkout").unwrap().bindings.interceptors,
            vec!["Declared"]
        );
    }
}
