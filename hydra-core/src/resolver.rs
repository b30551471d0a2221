//! 链解析器
//!
//! 对每个 (组件类型, 触发器) 计算有序的拦截器调用列表并缓存。
//! 解析结果确定且引用稳定：同一键的重复解析返回同一个 `Arc<Chain>`。
//!
//! 解析算法（按顺序）：
//! 1. 收集默认作用域绑定，除非组件（或业务方法自身）携带默认作用域排除标记；
//! 2. 追加类作用域绑定，除非方法携带类作用域排除标记（两个标记相互独立）；
//! 3. 方法作用域绑定追加在 1-2 的幸存者之后；若方法同时携带类作用域排除
//!    标记，则方法作用域绑定替换整条列表；
//! 4. 同一作用域层级内先按来源排序（Configured 在 Declared 之前），
//!    再按该来源内的声明顺序；
//! 5. 每个幸存的拦截器类型按"祖先实现在前"展开为对应触发器的链条目；
//! 6. 组件自身的钩子作为最内层条目追加（同样祖先在前）。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binding::{Binding, BindingScope};
use crate::chain::{Chain, ChainEntry, ChainTarget, Trigger};
use crate::component::MethodDescriptor;
use crate::error::{EngineError, EngineResult};
use crate::interceptor::HookCallback;
use crate::registry::{InterceptorRegistry, RegisteredComponent};

/// 链解析器
pub struct ChainResolver {
    registry: Arc<InterceptorRegistry>,
    /// 按 (组件, 触发器) 缓存的已解析链
    cache: Mutex<HashMap<(String, Trigger), Arc<Chain>>>,
}

impl ChainResolver {
    pub fn new(registry: Arc<InterceptorRegistry>) -> Self {
        Self {
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// 解析 (组件, 触发器) 的调用链
    ///
    /// 未注册的组件、未知的业务方法或绑定引用的未注册拦截器都返回
    /// `UnknownType`，对调用方是致命错误。
    pub fn resolve(&self, component: &str, trigger: &Trigger) -> EngineResult<Arc<Chain>> {
        let key = (component.to_string(), trigger.clone());
        if let Some(chain) = self.cache.lock().get(&key) {
            tracing::trace!("Chain cache hit for '{}' / '{}'", component, trigger);
            return Ok(Arc::clone(chain));
        }

        let chain = Arc::new(self.build(component, trigger)?);
        tracing::debug!(
            "Resolved chain for '{}' / '{}': {:?}",
            component,
            trigger,
            chain.describe()
        );

        let mut cache = self.cache.lock();
        let entry = cache.entry(key).or_insert(chain);
        Ok(Arc::clone(entry))
    }

    fn build(&self, component: &str, trigger: &Trigger) -> EngineResult<Chain> {
        let registered = self.registry.component(component)?;
        let descriptor = &registered.descriptor;
        let kind = trigger.hook_kind();

        let method = match trigger {
            Trigger::BusinessMethod(name) => Some(descriptor.method(name).ok_or_else(|| {
                EngineError::UnknownType(format!("{}::{}", component, name))
            })?),
            _ => None,
        };

        let selected = self.select_bindings(&registered, method);

        let mut entries = Vec::new();
        for binding in &selected {
            let interceptor = self.registry.interceptor(&binding.interceptor)?;
            for hook in interceptor.hooks_for(kind) {
                entries.push(ChainEntry {
                    target: ChainTarget::Interceptor(interceptor.name.clone()),
                    defined_in: hook.defined_in.clone(),
                    kind,
                    callback: hook.callback.clone(),
                });
            }
        }

        // 组件自身的钩子是最内层条目
        match method {
            Some(md) => entries.push(ChainEntry {
                target: ChainTarget::Component,
                defined_in: format!("{}::{}", descriptor.name, md.name),
                kind,
                callback: HookCallback::Around(Arc::clone(&md.body)),
            }),
            None => {
                for hook in descriptor.hooks_for(kind) {
                    entries.push(ChainEntry {
                        target: ChainTarget::Component,
                        defined_in: hook.defined_in.clone(),
                        kind,
                        callback: hook.callback.clone(),
                    });
                }
            }
        }

        Ok(Chain {
            component: descriptor.name.clone(),
            trigger: trigger.clone(),
            entries,
        })
    }

    /// 算法步骤 1-4：收集、排除与排序绑定
    fn select_bindings(
        &self,
        registered: &RegisteredComponent,
        method: Option<&MethodDescriptor>,
    ) -> Vec<Binding> {
        let descriptor = &registered.descriptor;
        let method_excludes_defaults = method.map_or(false, |m| m.bindings.exclude_defaults);
        let method_excludes_class = method.map_or(false, |m| m.bindings.exclude_class);

        // 方法作用域层级
        let mut method_level = Vec::new();
        if let Some(md) = method {
            for binding in &registered.configured {
                if matches!(&binding.scope, BindingScope::Method(name) if name == &md.name) {
                    method_level.push(binding.clone());
                }
            }
            for name in &md.bindings.interceptors {
                method_level.push(Binding::declared(
                    name.clone(),
                    BindingScope::Method(md.name.clone()),
                ));
            }
            method_level.sort_by_key(|b| b.origin);
        }

        // 步骤 3 的替换语义：类作用域排除 + 方法作用域绑定存在
        if method_excludes_class && !method_level.is_empty() {
            return dedupe(method_level);
        }

        let mut selected = Vec::new();

        // 步骤 1：默认作用域
        if !descriptor.exclude_defaults && !method_excludes_defaults {
            let mut defaults = self.registry.default_bindings();
            defaults.sort_by_key(|b| b.origin);
            selected.extend(defaults);
        }

        // 步骤 2：类作用域
        if !method_excludes_class {
            let mut class_level: Vec<Binding> = registered
                .configured
                .iter()
                .filter(|b| b.scope == BindingScope::Class)
                .cloned()
                .collect();
            for name in &descriptor.class_interceptors {
                class_level.push(Binding::declared(name.clone(), BindingScope::Class));
            }
            class_level.sort_by_key(|b| b.origin);
            selected.extend(class_level);
        }

        // 步骤 3：方法作用域追加
        selected.extend(method_level);

        dedupe(selected)
    }
}

/// 同一拦截器类型在链中只出现一次，保留首次出现的位置
fn dedupe(bindings: Vec<Binding>) -> Vec<Binding> {
    let mut seen = HashSet::new();
    bindings
        .into_iter()
        .filter(|b| seen.insert(b.interceptor.clone()))
        .collect()
}

impl std::fmt::Debug for ChainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainResolver")
            .field("cached_chains", &self.cache.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::BindingOrigin;
    use crate::component::{ComponentDescriptor, MethodBindings};
    use crate::interceptor::{HookKind, InterceptorDescriptor, StatePolicy};

    fn around_interceptor(name: &str) -> InterceptorDescriptor {
        InterceptorDescriptor::with_state::<()>(name, StatePolicy::Transient)
            .around_invoke(|_, inv| inv.proceed())
    }

    fn registry_with(interceptors: &[&str]) -> Arc<InterceptorRegistry> {
        let registry = Arc::new(InterceptorRegistry::new());
        for name in interceptors {
            registry
                .register_interceptor_type(around_interceptor(name))
                .unwrap();
        }
        registry
    }

    fn simple_component(name: &str) -> ComponentDescriptor {
        ComponentDescriptor::with_state::<()>(name).business_method(
            "ping",
            MethodBindings::new(),
            |_, inv| inv.proceed(),
        )
    }

    #[test]
    fn test_resolution_is_deterministic_and_referentially_stable() {
        let registry = registry_with(&["A"]);
        registry.register_default_binding("A", BindingOrigin::Declared);
        registry
            .register_component_type(simple_component("Cart"), Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let trigger = Trigger::BusinessMethod("ping".into());

        let first = resolver.resolve("Cart", &trigger).unwrap();
        let second = resolver.resolve("Cart", &trigger).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.describe(), second.describe());
    }

    #[test]
    fn test_opt_out_flags_are_independent() {
        let registry = registry_with(&["Def", "Cls"]);
        registry.register_default_binding("Def", BindingOrigin::Declared);

        let descriptor = ComponentDescriptor::with_state::<()>("Cart")
            .class_interceptor("Cls")
            .business_method(
                "no_defaults",
                MethodBindings::new().exclude_default_interceptors(),
                |_, inv| inv.proceed(),
            )
            .business_method(
                "no_class",
                MethodBindings::new().exclude_class_interceptors(),
                |_, inv| inv.proceed(),
            );
        registry
            .register_component_type(descriptor, Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);

        // 排除默认作用域：保留类作用域
        let chain = resolver
            .resolve("Cart", &Trigger::BusinessMethod("no_defaults".into()))
            .unwrap();
        assert_eq!(
            chain.describe(),
            vec!["Cls#aroundInvoke", "Cart::no_defaults#aroundInvoke"]
        );

        // 排除类作用域：保留默认作用域
        let chain = resolver
            .resolve("Cart", &Trigger::BusinessMethod("no_class".into()))
            .unwrap();
        assert_eq!(
            chain.describe(),
            vec!["Def#aroundInvoke", "Cart::no_class#aroundInvoke"]
        );
    }

    #[test]
    fn test_configured_precedes_declared_regardless_of_registration_order() {
        let registry = registry_with(&["Conf", "Decl"]);
        // 先注册 Declared，再注册 Configured
        registry.register_default_binding("Decl", BindingOrigin::Declared);
        registry.register_default_binding("Conf", BindingOrigin::Configured);
        registry
            .register_component_type(simple_component("Cart"), Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let chain = resolver
            .resolve("Cart", &Trigger::BusinessMethod("ping".into()))
            .unwrap();
        assert_eq!(
            chain.describe(),
            vec![
                "Conf#aroundInvoke",
                "Decl#aroundInvoke",
                "Cart::ping#aroundInvoke"
            ]
        );
    }

    #[test]
    fn test_method_bindings_augment_without_exclusion() {
        let registry = registry_with(&["Cls", "Mth"]);
        let descriptor = ComponentDescriptor::with_state::<()>("Cart")
            .class_interceptor("Cls")
            .business_method(
                "ping",
                MethodBindings::new().interceptor("Mth"),
                |_, inv| inv.proceed(),
            );
        registry
            .register_component_type(descriptor, Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let chain = resolver
            .resolve("Cart", &Trigger::BusinessMethod("ping".into()))
            .unwrap();

        // 方法作用域绑定追加在类作用域之后，而不是替换
        assert_eq!(
            chain.describe(),
            vec![
                "Cls#aroundInvoke",
                "Mth#aroundInvoke",
                "Cart::ping#aroundInvoke"
            ]
        );
    }

    #[test]
    fn test_method_bindings_replace_with_class_exclusion() {
        let registry = registry_with(&["Def", "Cls", "Mth"]);
        registry.register_default_binding("Def", BindingOrigin::Configured);
        let descriptor = ComponentDescriptor::with_state::<()>("Cart")
            .class_interceptor("Cls")
            .business_method(
                "ping",
                MethodBindings::new()
                    .exclude_class_interceptors()
                    .interceptor("Mth"),
                |_, inv| inv.proceed(),
            );
        registry
            .register_component_type(descriptor, Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let chain = resolver
            .resolve("Cart", &Trigger::BusinessMethod("ping".into()))
            .unwrap();

        // 类作用域排除 + 方法作用域绑定 => 只有方法作用域绑定生效
        assert_eq!(
            chain.describe(),
            vec!["Mth#aroundInvoke", "Cart::ping#aroundInvoke"]
        );
    }

    #[test]
    fn test_configured_method_binding_precedes_declared() {
        let registry = registry_with(&["ConfM", "DeclM"]);
        let descriptor = ComponentDescriptor::with_state::<()>("Cart").business_method(
            "ping",
            MethodBindings::new().interceptor("DeclM"),
            |_, inv| inv.proceed(),
        );
        registry
            .register_component_type(
                descriptor,
                vec![Binding::configured(
                    "ConfM",
                    BindingScope::Method("ping".into()),
                )],
            )
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let chain = resolver
            .resolve("Cart", &Trigger::BusinessMethod("ping".into()))
            .unwrap();
        assert_eq!(
            chain.describe(),
            vec![
                "ConfM#aroundInvoke",
                "DeclM#aroundInvoke",
                "Cart::ping#aroundInvoke"
            ]
        );
    }

    #[test]
    fn test_ancestor_hooks_expand_before_descendant() {
        let registry = Arc::new(InterceptorRegistry::new());
        let base = InterceptorDescriptor::with_state::<()>("Base", StatePolicy::Transient)
            .around_invoke(|_, inv| inv.proceed());
        let sub =
            InterceptorDescriptor::extending("Sub", &base).around_invoke(|_, inv| inv.proceed());
        registry.register_interceptor_type(sub).unwrap();

        let descriptor = ComponentDescriptor::with_state::<()>("Cart")
            .class_interceptor("Sub")
            .business_method("ping", MethodBindings::new(), |_, inv| inv.proceed());
        registry
            .register_component_type(descriptor, Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let chain = resolver
            .resolve("Cart", &Trigger::BusinessMethod("ping".into()))
            .unwrap();

        // 两个实现都在链中，祖先实现在前
        assert_eq!(
            chain.describe(),
            vec![
                "Base#aroundInvoke",
                "Sub#aroundInvoke",
                "Cart::ping#aroundInvoke"
            ]
        );
    }

    #[test]
    fn test_component_lifecycle_hooks_are_innermost_ancestor_first() {
        let registry = registry_with(&[]);
        registry
            .register_interceptor_type(
                InterceptorDescriptor::with_state::<()>("L", StatePolicy::Transient)
                    .lifecycle_hook(HookKind::PostConstruct, |_, _| Ok(())),
            )
            .unwrap();

        let base = ComponentDescriptor::with_state::<()>("BaseBean")
            .lifecycle_hook(HookKind::PostConstruct, |_, _| Ok(()));
        let descriptor = ComponentDescriptor::extending("Bean", &base)
            .class_interceptor("L")
            .lifecycle_hook(HookKind::PostConstruct, |_, _| Ok(()));
        registry
            .register_component_type(descriptor, Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let chain = resolver.resolve("Bean", &Trigger::Construct).unwrap();
        assert_eq!(
            chain.describe(),
            vec![
                "L#postConstruct",
                "BaseBean#postConstruct",
                "Bean#postConstruct"
            ]
        );
    }

    #[test]
    fn test_interceptor_without_matching_hook_contributes_nothing() {
        let registry = registry_with(&[]);
        registry
            .register_interceptor_type(
                InterceptorDescriptor::with_state::<()>("OnlyPassivate", StatePolicy::Transient)
                    .lifecycle_hook(HookKind::PrePassivate, |_, _| Ok(())),
            )
            .unwrap();
        let descriptor = ComponentDescriptor::with_state::<()>("Cart")
            .class_interceptor("OnlyPassivate")
            .business_method("ping", MethodBindings::new(), |_, inv| inv.proceed());
        registry
            .register_component_type(descriptor, Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let chain = resolver
            .resolve("Cart", &Trigger::BusinessMethod("ping".into()))
            .unwrap();
        assert_eq!(chain.describe(), vec!["Cart::ping#aroundInvoke"]);
    }

    #[test]
    fn test_duplicate_interceptor_across_levels_kept_once() {
        let registry = registry_with(&["A"]);
        registry.register_default_binding("A", BindingOrigin::Declared);
        let descriptor = ComponentDescriptor::with_state::<()>("Cart")
            .class_interceptor("A")
            .business_method("ping", MethodBindings::new(), |_, inv| inv.proceed());
        registry
            .register_component_type(descriptor, Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let chain = resolver
            .resolve("Cart", &Trigger::BusinessMethod("ping".into()))
            .unwrap();
        assert_eq!(
            chain.describe(),
            vec!["A#aroundInvoke", "Cart::ping#aroundInvoke"]
        );
    }

    #[test]
    fn test_unknown_component_and_method_are_fatal() {
        let registry = registry_with(&[]);
        registry
            .register_component_type(simple_component("Cart"), Vec::new())
            .unwrap();
        let resolver = ChainResolver::new(registry);

        assert!(matches!(
            resolver.resolve("Ghost", &Trigger::Construct).unwrap_err(),
            EngineError::UnknownType(_)
        ));
        assert!(matches!(
            resolver
                .resolve("Cart", &Trigger::BusinessMethod("ghost".into()))
                .unwrap_err(),
            EngineError::UnknownType(_)
        ));
    }

    #[test]
    fn test_binding_to_unregistered_interceptor_is_fatal() {
        let registry = registry_with(&[]);
        let descriptor = ComponentDescriptor::with_state::<()>("Cart")
            .class_interceptor("Ghost")
            .business_method("ping", MethodBindings::new(), |_, inv| inv.proceed());
        registry
            .register_component_type(descriptor, Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        assert!(matches!(
            resolver
                .resolve("Cart", &Trigger::BusinessMethod("ping".into()))
                .unwrap_err(),
            EngineError::UnknownType(name) if name == "Ghost"
        ));
    }

    #[test]
    fn test_component_level_default_exclusion_applies_to_lifecycle_triggers() {
        let registry = registry_with(&[]);
        registry
            .register_interceptor_type(
                InterceptorDescriptor::with_state::<()>("D", StatePolicy::Transient)
                    .lifecycle_hook(HookKind::PrePassivate, |_, _| Ok(())),
            )
            .unwrap();
        registry.register_default_binding("D", BindingOrigin::Declared);

        let descriptor = ComponentDescriptor::with_state::<()>("Cart")
            .exclude_default_interceptors()
            .lifecycle_hook(HookKind::PrePassivate, |_, _| Ok(()));
        registry
            .register_component_type(descriptor, Vec::new())
            .unwrap();

        let resolver = ChainResolver::new(registry);
        let chain = resolver.resolve("Cart", &Trigger::PrePassivate).unwrap();
        assert_eq!(chain.describe(), vec!["Cart#prePassivate"]);
    }
}
