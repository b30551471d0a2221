//! 引擎统一错误类型
//!
//! 注册期与解析期错误（DuplicateType / UnknownType）是致命错误，不会重试；
//! 钩子自身的失败通过 `Other` 变体沿 proceed 调用栈向上传播。

use crate::chain::Trigger;
use crate::component::LifecyclePhase;
use thiserror::Error;

/// 引擎统一的 Result 类型
pub type EngineResult<T> = Result<T, EngineError>;

/// 引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// 同名类型重复注册
    #[error("Type '{0}' is already registered")]
    DuplicateType(String),

    /// 组件、拦截器或业务方法未注册
    #[error("Unknown type '{0}'")]
    UnknownType(String),

    /// 实例已被移除，任何后续分发都是调用方的编程错误
    #[error("Component instance #{0} has been removed")]
    InstanceRemoved(u64),

    /// 当前生命周期阶段不允许该触发器
    #[error("Trigger '{trigger}' is not legal while instance #{instance} is {phase}")]
    InvalidTransition {
        instance: u64,
        phase: LifecyclePhase,
        trigger: Trigger,
    },

    /// 状态向下转型失败
    #[error("State type mismatch: expected '{expected}'")]
    TypeMismatch { expected: String },

    /// 钩子试图访问当前链路已锁定的状态单元
    #[error("State of '{0}' is locked by a running chain link; use the hook's state argument instead")]
    StateReentrancy(String),

    /// 钝化存储协作者失败
    #[error("Passivation store failure: {0}")]
    Passivation(String),

    /// 日志系统初始化失败
    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),

    /// 钩子或协作者返回的其他错误
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
