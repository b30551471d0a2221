// hydra-container: 组件实例运行时
//
// 基于 hydra-core 的声明模型与链解析，提供运行时的另一半：
// - 组件实例与其生命周期状态机（Active <-> Passivated，终态 Removed / Broken）
// - 按状态分类裁决归属的拦截器实例存储（Shared / Transient / Persisted）
// - 可替换的钝化存储协作者
// - 把解析出的链绑定到实例状态并执行的生命周期分发器

pub mod dispatcher;
pub mod instance;
pub mod passivation;
pub mod store;

// 重新导出常用类型
pub use dispatcher::LifecycleDispatcher;
pub use instance::{ComponentHandle, ComponentInstance};
pub use passivation::{InMemoryPassivationStore, PassivationStore};
pub use store::InstanceStore;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::dispatcher::LifecycleDispatcher;
    pub use crate::instance::{ComponentHandle, ComponentInstance};
    pub use crate::passivation::{InMemoryPassivationStore, PassivationStore};
    pub use crate::store::InstanceStore;

    pub use hydra_core::prelude::*;
}
