//! 基础设施层
//!
//! 提供模块容器的具体实现：注册、依赖解析、生命周期与查询。

pub mod container;

pub use container::{
    CompletionStrategy, ContainerStats, Factory, Instance, LifecycleState, ModuleContainer, ModuleDefinition,
    ModuleFilter, ModuleInfo, ModuleProperties, Service,
};
