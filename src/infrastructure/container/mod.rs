//! 模块容器
//!
//! - `registry`：名称到模块定义/状态的映射
//! - `resolver`：递归解析依赖并缓存实例
//! - `lifecycle`：可启动模块的异步 start/stop 状态机
//! - `filter`：注册表上的结构化查询

mod filter;
mod lifecycle;
mod module_container;
mod registry;
mod resolver;
mod service;
mod stats;

pub use filter::{ModuleFilter, ModuleInfo, PropertiesFilter};
pub use lifecycle::{
    CompletionStrategy, ConcurrentCompletion, LifecycleFuture, LifecycleState, SequentialCompletion,
};
pub use module_container::ModuleContainer;
pub use registry::{ModuleDefinition, ModuleProperties};
pub use service::{downcast_instance, AsAny, Factory, Instance, Service};
pub use stats::ContainerStats;
