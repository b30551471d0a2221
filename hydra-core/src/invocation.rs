//! 钩子执行上下文
//!
//! 生命周期链平铺执行，钩子拿到 [`LifecycleContext`]；业务方法链通过
//! [`Invocation::proceed`] 嵌套执行——第一个条目的前置代码最先运行、
//! 后置代码最后运行，构成严格的 LIFO 退栈，而不是平铺序列。
//! 钩子返回的错误不被吞掉，沿 proceed 调用栈原样向上传播并中止剩余链。
//!
//! 每个链环节执行期间自身的状态单元处于锁定状态（钩子通过状态参数
//! 直接拿到 `&mut`）。上下文的 `with_component` / `state_of` 对已被
//! 在途链路锁定的单元快速失败，返回 `StateReentrancy` 而不是阻塞。

use std::sync::Arc;

use serde_json::Value;

use crate::chain::Trigger;
use crate::error::{EngineError, EngineResult};
use crate::event_log::EventLog;
use crate::naming::NamingContext;
use crate::state::{ManagedState, StateCell};

/// 生命周期钩子回调
pub type LifecycleFn =
    Arc<dyn Fn(&mut dyn ManagedState, &mut LifecycleContext<'_>) -> EngineResult<()> + Send + Sync>;

/// 环绕钩子 / 业务方法体回调
pub type AroundFn =
    Arc<dyn Fn(&mut dyn ManagedState, &mut Invocation<'_>) -> EngineResult<Value> + Send + Sync>;

/// 实例访问接口
///
/// 由容器按当前组件实例实现：Shared 类型返回进程级唯一实例，
/// Transient / Persisted 类型返回该组件独占的实例。
pub trait InstanceAccess {
    fn state_of(&self, interceptor: &str) -> EngineResult<StateCell>;
}

/// 生命周期钩子的执行上下文
pub struct LifecycleContext<'a> {
    log: &'a EventLog,
    naming: &'a NamingContext,
    access: &'a dyn InstanceAccess,
    component: StateCell,
    /// 当前链环节已锁定的状态单元
    locked: StateCell,
    trigger: Trigger,
}

impl<'a> LifecycleContext<'a> {
    pub fn new(
        log: &'a EventLog,
        naming: &'a NamingContext,
        access: &'a dyn InstanceAccess,
        component: StateCell,
        locked: StateCell,
        trigger: Trigger,
    ) -> Self {
        Self {
            log,
            naming,
            access,
            component,
            locked,
            trigger,
        }
    }

    /// 向事件日志追加一个记号
    pub fn log(&self, token: impl Into<String>) {
        self.log.append(token);
    }

    /// 解析一个环境作用域值（不透明透传）
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.naming.lookup(key)
    }

    /// 当前触发器
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// 所属组件的状态单元
    pub fn component(&self) -> &StateCell {
        &self.component
    }

    /// 以具体类型访问组件状态
    ///
    /// 组件自身的钩子执行期间组件状态已被锁定（通过状态参数可见），
    /// 此时调用返回 `StateReentrancy`。
    pub fn with_component<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> EngineResult<R> {
        if self.locked.same_instance(&self.component) {
            return Err(EngineError::StateReentrancy("component".to_string()));
        }
        self.component.with(f)
    }

    /// 取得某个拦截器类型对当前实例生效的状态单元
    ///
    /// 目标单元正被当前链环节锁定时返回 `StateReentrancy`。
    pub fn state_of(&self, interceptor: &str) -> EngineResult<StateCell> {
        let cell = self.access.state_of(interceptor)?;
        if self.locked.same_instance(&cell) {
            return Err(EngineError::StateReentrancy(interceptor.to_string()));
        }
        Ok(cell)
    }
}

/// 已准备好的链环节 - 状态单元与回调在分发前一次性绑定
#[derive(Clone)]
pub struct PreparedStep {
    pub label: String,
    pub cell: StateCell,
    pub callback: AroundFn,
}

/// 业务方法调用
///
/// 每个环绕钩子可以在委派给下一环节（proceed）之前与之后运行代码；
/// 组件自身的方法是最内层环节。未调用 proceed 即返回会短路剩余链。
pub struct Invocation<'a> {
    log: &'a EventLog,
    naming: &'a NamingContext,
    access: &'a dyn InstanceAccess,
    component: StateCell,
    method: String,
    args: Value,
    steps: Vec<PreparedStep>,
    pos: usize,
    /// 在途环节锁定的状态单元（proceed 退栈时弹出）
    held: Vec<StateCell>,
}

impl<'a> Invocation<'a> {
    pub fn new(
        log: &'a EventLog,
        naming: &'a NamingContext,
        access: &'a dyn InstanceAccess,
        component: StateCell,
        method: impl Into<String>,
        args: Value,
        steps: Vec<PreparedStep>,
    ) -> Self {
        Self {
            log,
            naming,
            access,
            component,
            method: method.into(),
            args,
            steps,
            pos: 0,
            held: Vec::new(),
        }
    }

    /// 委派给链上的下一环节
    ///
    /// 同一环节允许多次调用（重试语义）；嵌套调用构成 LIFO 退栈。
    pub fn proceed(&mut self) -> EngineResult<Value> {
        if self.pos >= self.steps.len() {
            return Err(EngineError::Other(anyhow::anyhow!(
                "proceed() called past the innermost link of '{}'",
                self.method
            )));
        }
        let step = self.steps[self.pos].clone();
        self.pos += 1;
        self.held.push(step.cell.clone());
        tracing::trace!("Proceeding to chain link '{}'", step.label);
        let result = {
            let mut guard = step.cell.lock();
            (step.callback)(&mut **guard, self)
        };
        self.held.pop();
        self.pos -= 1;
        result
    }

    /// 被调用的业务方法名
    pub fn method(&self) -> &str {
        &self.method
    }

    /// 调用参数
    pub fn args(&self) -> &Value {
        &self.args
    }

    /// 替换传给内层环节的参数
    pub fn set_args(&mut self, args: Value) {
        self.args = args;
    }

    /// 向事件日志追加一个记号
    pub fn log(&self, token: impl Into<String>) {
        self.log.append(token);
    }

    /// 解析一个环境作用域值（不透明透传）
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.naming.lookup(key)
    }

    /// 所属组件的状态单元
    pub fn component(&self) -> &StateCell {
        &self.component
    }

    /// 以具体类型访问组件状态
    ///
    /// 最内层环节（方法体）执行期间组件状态已被锁定（通过状态参数
    /// 可见），此时调用返回 `StateReentrancy`。
    pub fn with_component<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> EngineResult<R> {
        self.ensure_not_held(&self.component, "component")?;
        self.component.with(f)
    }

    /// 取得某个拦截器类型对当前实例生效的状态单元
    ///
    /// 目标单元正被在途的外层环节锁定时返回 `StateReentrancy`。
    pub fn state_of(&self, interceptor: &str) -> EngineResult<StateCell> {
        let cell = self.access.state_of(interceptor)?;
        self.ensure_not_held(&cell, interceptor)?;
        Ok(cell)
    }

    fn ensure_not_held(&self, cell: &StateCell, label: &str) -> EngineResult<()> {
        if self.held.iter().any(|h| h.same_instance(cell)) {
            return Err(EngineError::StateReentrancy(label.to_string()));
        }
        Ok(())
    }
}
