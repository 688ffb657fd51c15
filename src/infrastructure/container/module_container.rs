//! 模块容器
//!
//! 组合根：注册、变更与内省都是同步操作，在注册表锁内一次完成；
//! 解析见 `resolver`，生命周期操作见 `lifecycle` 模块。

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::filter::{ModuleFilter, ModuleInfo};
use super::lifecycle::{CompletionStrategy, ConcurrentCompletion, LifecycleState, SequentialCompletion};
use super::registry::{ModuleDefinition, ModuleProperties, Registry};
use super::service::{downcast_instance, Factory, Instance, Service};
use super::stats::{ContainerStats, InnerStats};
use crate::config::{BulkMode, ContainerConfig};
use crate::errors::ContainerError;

/// 单例模块容器，可通过 `Arc` 在任务间共享
pub struct ModuleContainer {
    pub(super) registry: Mutex<Registry>,
    /// 某个模块的工厂执行结束时通知
    pub(super) resolved: Condvar,
    pub(super) completion: Arc<dyn CompletionStrategy>,
    pub(super) config: ContainerConfig,
    pub(super) stats: InnerStats,
}

impl ModuleContainer {
    /// 创建使用默认配置的容器
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// 按配置创建容器，批量启停方式由 `bulk_mode` 决定
    pub fn with_config(config: ContainerConfig) -> Self {
        let completion: Arc<dyn CompletionStrategy> = match config.lifecycle.bulk_mode {
            BulkMode::Concurrent => Arc::new(ConcurrentCompletion),
            BulkMode::Sequential => Arc::new(SequentialCompletion),
        };
        Self::with_completion(config, completion)
    }

    /// 显式注入批量启停的等待策略（测试中可替换）
    pub fn with_completion(config: ContainerConfig, completion: Arc<dyn CompletionStrategy>) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            resolved: Condvar::new(),
            completion,
            config,
            stats: InnerStats::default(),
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 注册模块
    pub fn register(
        &self,
        name: impl Into<String>,
        factory: Factory,
        properties: ModuleProperties,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ContainerError> {
        self.register_complex(
            ModuleDefinition::new(name)
                .factory(factory)
                .properties(properties)
                .depends_on(dependencies),
        )
    }

    pub fn register_complex(&self, definition: ModuleDefinition) -> Result<(), ContainerError> {
        let name = definition.name.clone();
        self.registry.lock().register(definition)?;
        tracing::debug!(module = %name, "module registered");
        Ok(())
    }

    /// 替换尚未实例化的模块
    pub fn replace(
        &self,
        name: impl Into<String>,
        factory: Factory,
        properties: ModuleProperties,
        dependencies: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<(), ContainerError> {
        self.replace_complex(
            ModuleDefinition::new(name)
                .factory(factory)
                .properties(properties)
                .depends_on(dependencies),
        )
    }

    pub fn replace_complex(&self, definition: ModuleDefinition) -> Result<(), ContainerError> {
        let name = definition.name.clone();
        self.registry.lock().replace(definition).inspect_err(|err| {
            tracing::warn!(module = %name, error = %err, "module replacement rejected");
        })?;
        tracing::debug!(module = %name, "module replaced");
        Ok(())
    }

    /// 获取（必要时创建）模块实例
    pub fn get_instance(&self, name: &str) -> Result<Instance, ContainerError> {
        self.resolve(name)
    }

    /// 获取并向下转型为具体类型
    pub fn get<T: Service>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        let instance = self.get_instance(name)?;
        downcast_instance::<T>(&instance).ok_or_else(|| ContainerError::TypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
            actual: (*instance).service_type_name(),
        })
    }

    /// 移除未实例化的模块；未注册时什么也不做
    pub fn clear(&self, name: &str) -> Result<(), ContainerError> {
        self.registry.lock().clear(name).inspect_err(|err| {
            tracing::warn!(module = name, error = %err, "module clear rejected");
        })?;
        tracing::debug!(module = name, "module cleared");
        Ok(())
    }

    /// 清空容器；有模块运行时失败
    pub fn reset(&self) -> Result<(), ContainerError> {
        let mut registry = self.registry.lock();
        let count = registry.len();
        registry.reset().inspect_err(|err| {
            tracing::warn!(error = %err, "container reset rejected");
        })?;
        tracing::debug!(removed = count, "container reset");
        Ok(())
    }

    /// 按注册顺序返回匹配过滤条件的模块
    pub fn filtered_modules(&self, filter: &ModuleFilter) -> Vec<ModuleInfo> {
        self.filtered_modules_by(|module| filter.matches(module))
    }

    /// 使用任意谓词过滤
    pub fn filtered_modules_by<P>(&self, predicate: P) -> Vec<ModuleInfo>
    where
        P: Fn(&ModuleInfo) -> bool,
    {
        self.registry
            .lock()
            .entries()
            .iter()
            .map(ModuleInfo::from_entry)
            .filter(|module| predicate(module))
            .collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.lock().get(name).is_some()
    }

    /// 已注册模块名（注册顺序）
    pub fn module_names(&self) -> Vec<String> {
        self.registry
            .lock()
            .entries()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn state(&self, name: &str) -> Option<LifecycleState> {
        self.registry.lock().get(name).map(|entry| entry.state)
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 获取容器统计信息
    pub fn stats(&self) -> ContainerStats {
        self.stats.snapshot()
    }
}

impl Default for ModuleContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[derive(Debug)]
    struct Settings {
        verbose: bool,
    }
    impl Service for Settings {}

    #[derive(Debug)]
    struct Logger;
    impl Service for Logger {}

    #[test]
    fn test_typed_get() {
        let container = ModuleContainer::new();
        container
            .register("settings", Factory::value(Settings { verbose: true }), ModuleProperties::default(), Vec::<String>::new())
            .unwrap();

        let settings = container.get::<Settings>("settings").unwrap();
        assert!(settings.verbose);

        let err = container.get::<Logger>("settings").unwrap_err();
        assert!(matches!(err, ContainerError::TypeMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[test]
    fn test_introspection() {
        let container = ModuleContainer::new();
        assert!(container.is_empty());

        container
            .register_complex(ModuleDefinition::new("logger").factory(Factory::from_fn(|| Logger)))
            .unwrap();
        container
            .register_complex(ModuleDefinition::new("settings").factory(Factory::value(Settings { verbose: false })))
            .unwrap();

        assert_eq!(container.module_names(), vec!["logger", "settings"]);
        assert!(container.is_registered("logger"));
        assert!(!container.is_registered("metrics"));
        assert_eq!(container.state("logger"), Some(LifecycleState::Unstarted));
        assert_eq!(container.state("metrics"), None);
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_filtered_modules_by_predicate() {
        let container = ModuleContainer::new();
        for name in ["alpha", "beta", "gamma"] {
            container
                .register_complex(ModuleDefinition::new(name).factory(Factory::from_fn(|| Logger)))
                .unwrap();
        }
        container.get_instance("beta").unwrap();

        let instantiated = container.filtered_modules_by(|module| module.instantiated);
        assert_eq!(instantiated.len(), 1);
        assert_eq!(instantiated[0].name, "beta");

        let long_names = container.filtered_modules_by(|module| module.name.len() == 5);
        let names: Vec<_> = long_names.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "gamma"]);
    }

    #[test]
    fn test_reset_after_instantiation() {
        let container = ModuleContainer::new();
        container
            .register_complex(ModuleDefinition::new("logger").factory(Factory::from_fn(|| Logger)))
            .unwrap();
        container.get_instance("logger").unwrap();

        container.reset().unwrap();
        assert!(container.is_empty());
    }
}
