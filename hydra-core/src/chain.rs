//! 触发器与已解析的调用链
//!
//! 链一旦由解析器计算完成即不可变，以 `Arc<Chain>` 形式从缓存共享，
//! 同一 (组件, 触发器) 的重复解析返回同一引用。

use crate::interceptor::{HookCallback, HookKind};

/// 触发链解析与分发的事件
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    Construct,
    BusinessMethod(String),
    PrePassivate,
    PostActivate,
    Remove,
}

impl Trigger {
    /// 该触发器选择的钩子种类
    pub fn hook_kind(&self) -> HookKind {
        match self {
            Trigger::Construct => HookKind::PostConstruct,
            Trigger::BusinessMethod(_) => HookKind::AroundInvoke,
            Trigger::PrePassivate => HookKind::PrePassivate,
            Trigger::PostActivate => HookKind::PostActivate,
            Trigger::Remove => HookKind::PreDestroy,
        }
    }

    /// 业务方法名（仅 BusinessMethod 有）
    pub fn method_name(&self) -> Option<&str> {
        match self {
            Trigger::BusinessMethod(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Construct => write!(f, "construct"),
            Trigger::BusinessMethod(name) => write!(f, "business:{}", name),
            Trigger::PrePassivate => write!(f, "prePassivate"),
            Trigger::PostActivate => write!(f, "postActivate"),
            Trigger::Remove => write!(f, "remove"),
        }
    }
}

/// 链条目的目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainTarget {
    /// 一个拦截器类型的实例
    Interceptor(String),
    /// 组件自身（最内层条目）
    Component,
}

/// 一个链条目
#[derive(Clone)]
pub struct ChainEntry {
    pub target: ChainTarget,
    /// 定义该钩子实现的继承层级名
    pub defined_in: String,
    pub kind: HookKind,
    pub callback: HookCallback,
}

impl ChainEntry {
    /// 条目标签，用于链自省与日志
    pub fn label(&self) -> String {
        format!("{}#{}", self.defined_in, self.kind)
    }
}

impl std::fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainEntry")
            .field("target", &self.target)
            .field("label", &self.label())
            .finish()
    }
}

/// 已解析的调用链
///
/// (组件, 触发器) 的有序钩子条目序列，组件自身的钩子是最内层条目。
pub struct Chain {
    pub component: String,
    pub trigger: Trigger,
    pub entries: Vec<ChainEntry>,
}

impl Chain {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 有序的条目标签列表，供验证工具使用
    pub fn describe(&self) -> Vec<String> {
        self.entries.iter().map(ChainEntry::label).collect()
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("component", &self.component)
            .field("trigger", &self.trigger)
            .field("entries", &self.describe())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_hook_kind_mapping() {
        assert_eq!(Trigger::Construct.hook_kind(), HookKind::PostConstruct);
        assert_eq!(
            Trigger::BusinessMethod("ping".into()).hook_kind(),
            HookKind::AroundInvoke
        );
        assert_eq!(Trigger::PrePassivate.hook_kind(), HookKind::PrePassivate);
        assert_eq!(Trigger::PostActivate.hook_kind(), HookKind::PostActivate);
        assert_eq!(Trigger::Remove.hook_kind(), HookKind::PreDestroy);
    }

    #[test]
    fn test_trigger_method_name() {
        assert_eq!(
            Trigger::BusinessMethod("ping".into()).method_name(),
            Some("ping")
        );
        assert_eq!(Trigger::Remove.method_name(), None);
    }
}
