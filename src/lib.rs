//! 模块容器
//!
//! 进程内的依赖注入组合根：模块声明依赖，按需惰性创建且只创建一次；
//! 标记为 `startable` 的模块通过异步生命周期钩子显式启动与停止。
//!
//! ```no_run
//! use std::sync::Arc;
//! use modcontainer::{Factory, ModuleContainer, ModuleDefinition, Service};
//!
//! struct Settings { url: String }
//! impl Service for Settings {}
//!
//! struct Database { url: String }
//! impl Service for Database {}
//!
//! let container = ModuleContainer::new();
//! container.register_complex(
//!     ModuleDefinition::new("settings").factory(Factory::value(Settings { url: "sqlite::memory:".into() })),
//! )?;
//! container.register_complex(
//!     ModuleDefinition::new("database")
//!         .factory(Factory::from_fn1(|s: Arc<Settings>| Database { url: s.url.clone() }))
//!         .depends_on(["settings"]),
//! )?;
//!
//! let db = container.get::<Database>("database")?;
//! assert_eq!(db.url, "sqlite::memory:");
//! # Ok::<(), modcontainer::ContainerError>(())
//! ```

pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::ContainerConfig;
pub use errors::{BoxError, ContainerError, ErrorKind};
pub use infrastructure::container::{
    downcast_instance, CompletionStrategy, ConcurrentCompletion, ContainerStats, Factory, Instance,
    LifecycleFuture, LifecycleState, ModuleContainer, ModuleDefinition, ModuleFilter, ModuleInfo,
    ModuleProperties, SequentialCompletion, Service,
};
