//! 依赖解析
//!
//! 分两步进行：
//!
//! 1. 在注册表锁内校验整棵尚未实例化的依赖树（缺失、自依赖、可启动依赖、循环）；
//! 2. 深度优先、严格按声明顺序创建实例。工厂在锁外执行，因此可以回调容器。
//!
//! 同一模块的并发解析通过条目上的 `resolving` 标记与条件变量串行化，
//! 工厂在每个注册周期内最多执行一次。

use std::thread;

use super::registry::Registry;
use super::service::Instance;
use super::ModuleContainer;
use crate::errors::ContainerError;

impl Registry {
    /// 校验 `name` 及其尚未实例化的依赖子树，不执行任何工厂
    pub(crate) fn check_graph(&self, name: &str, chain: &mut Vec<String>) -> Result<(), ContainerError> {
        let entry = self.get(name).ok_or_else(|| ContainerError::UnknownModule {
            name: name.to_string(),
        })?;
        if entry.instance.is_some() {
            return Ok(());
        }

        if chain.iter().any(|pending| pending == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(ContainerError::CircularDependency { chain: cycle });
        }

        chain.push(name.to_string());
        for dependency in &entry.dependencies {
            if dependency == name {
                return Err(ContainerError::SelfDependency {
                    name: name.to_string(),
                });
            }

            let child = self.get(dependency).ok_or_else(|| ContainerError::MissingDependency {
                name: name.to_string(),
                dependency: dependency.clone(),
            })?;
            if child.properties.startable {
                return Err(ContainerError::StartableDependency {
                    name: name.to_string(),
                    dependency: dependency.clone(),
                });
            }

            self.check_graph(dependency, chain)?;
        }
        chain.pop();
        Ok(())
    }
}

/// 工厂执行期间持有；提前返回或 panic 时清除 `resolving` 标记并唤醒等待者
struct PendingResolution<'a> {
    container: &'a ModuleContainer,
    name: &'a str,
    armed: bool,
}

impl PendingResolution<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingResolution<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(entry) = self.container.registry.lock().get_mut(self.name) {
            entry.resolving = None;
        }
        self.container.resolved.notify_all();
    }
}

impl ModuleContainer {
    /// 解析 `name` 对应的实例
    pub(crate) fn resolve(&self, name: &str) -> Result<Instance, ContainerError> {
        self.registry.lock().check_graph(name, &mut Vec::new())?;
        self.build(name)
    }

    fn build(&self, name: &str) -> Result<Instance, ContainerError> {
        let current = thread::current().id();
        let mut registry = self.registry.lock();

        let (factory, dependencies) = loop {
            let entry = registry.get_mut(name).ok_or_else(|| ContainerError::UnknownModule {
                name: name.to_string(),
            })?;
            if let Some(instance) = &entry.instance {
                self.stats.record_resolution(true);
                tracing::debug!(module = name, "resolved from cache");
                return Ok(instance.clone());
            }

            let owner = entry.resolving;
            match owner {
                None => {
                    entry.resolving = Some(current);
                    break (entry.factory.clone(), entry.dependencies.clone());
                }
                // 工厂回调容器请求了自身（或依赖自身的模块）
                Some(owner) if owner == current => {
                    return Err(ContainerError::ReentrantResolution {
                        name: name.to_string(),
                    });
                }
                Some(_) => self.resolved.wait(&mut registry),
            }
        };
        self.stats.record_resolution(false);
        drop(registry);

        let pending = PendingResolution {
            container: self,
            name,
            armed: true,
        };

        let mut resolved = Vec::with_capacity(dependencies.len());
        for dependency in &dependencies {
            resolved.push(self.build(dependency)?);
        }

        self.stats.record_factory_invocation();
        let instance = factory
            .instantiate(&resolved)
            .map_err(|source| ContainerError::FactoryFailed {
                name: name.to_string(),
                source,
            })?
            .ok_or_else(|| ContainerError::InstantiationFailed {
                name: name.to_string(),
            })?;

        if let Some(entry) = self.registry.lock().get_mut(name) {
            entry.instance = Some(instance.clone());
            entry.resolving = None;
        }
        pending.disarm();
        self.resolved.notify_all();

        tracing::debug!(module = name, dependencies = ?dependencies, "module instantiated");
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::container::registry::ModuleDefinition;
    use crate::infrastructure::container::service::{downcast_instance, Factory, Service};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Named(&'static str);
    impl Service for Named {}

    struct Pair {
        first: Arc<Named>,
        second: Arc<Named>,
    }
    impl Service for Pair {}

    fn instantiated(container: &ModuleContainer, name: &str) -> bool {
        container.registry.lock().get(name).is_some_and(|entry| entry.instance.is_some())
    }

    #[test]
    fn test_dependencies_passed_in_declared_order() {
        let container = ModuleContainer::new();
        container.register_complex(ModuleDefinition::new("a").factory(Factory::value(Named("a")))).unwrap();
        container.register_complex(ModuleDefinition::new("b").factory(Factory::value(Named("b")))).unwrap();
        container
            .register_complex(
                ModuleDefinition::new("pair")
                    .factory(Factory::from_fn2(|first: Arc<Named>, second: Arc<Named>| Pair { first, second }))
                    .depends_on(["b", "a"]),
            )
            .unwrap();

        let pair = container.resolve("pair").unwrap();
        let pair = downcast_instance::<Pair>(&pair).unwrap();
        assert_eq!(pair.first.0, "b");
        assert_eq!(pair.second.0, "a");
    }

    #[test]
    fn test_resolution_is_depth_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let container = ModuleContainer::new();

        for (name, deps) in [("leaf1", vec![]), ("leaf2", vec![]), ("mid", vec!["leaf1"]), ("top", vec!["mid", "leaf2"])] {
            let order = Arc::clone(&order);
            let arity = deps.len();
            container
                .register_complex(
                    ModuleDefinition::new(name)
                        .factory(Factory::dynamic(arity, move |_| {
                            order.lock().unwrap().push(name);
                            Ok(Some(Arc::new(Named(name)) as Instance))
                        }))
                        .depends_on(deps),
                )
                .unwrap();
        }

        container.resolve("top").unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["leaf1", "mid", "leaf2", "top"]);
    }

    #[test]
    fn test_factory_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let container = ModuleContainer::new();
        container
            .register_complex(ModuleDefinition::new("a").factory(Factory::from_fn(move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Named("a")
            })))
            .unwrap();

        let first = container.resolve("a").unwrap();
        let second = container.resolve("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let snapshot = container.stats();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.factory_invocations, 1);
    }

    #[test]
    fn test_indirect_cycle_detected() {
        let container = ModuleContainer::new();
        container
            .register_complex(
                ModuleDefinition::new("a")
                    .factory(Factory::from_fn1(|_: Arc<Named>| Named("a")))
                    .depends_on(["b"]),
            )
            .unwrap();
        container
            .register_complex(
                ModuleDefinition::new("b")
                    .factory(Factory::from_fn1(|_: Arc<Named>| Named("b")))
                    .depends_on(["a"]),
            )
            .unwrap();

        let err = container.resolve("a").unwrap_err();
        match err {
            ContainerError::CircularDependency { chain } => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!instantiated(&container, "a"));
        assert_eq!(container.stats().factory_invocations, 0);
    }

    #[test]
    fn test_invalid_graph_runs_no_factory() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let container = ModuleContainer::new();
        container
            .register_complex(ModuleDefinition::new("ok").factory(Factory::from_fn(move || {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Named("ok")
            })))
            .unwrap();
        container
            .register_complex(
                ModuleDefinition::new("top")
                    .factory(Factory::from_fn2(|_: Arc<Named>, _: Arc<Named>| Named("top")))
                    .depends_on(["ok", "ghost"]),
            )
            .unwrap();

        let err = container.resolve("top").unwrap_err();
        assert!(matches!(err, ContainerError::MissingDependency { ref dependency, .. } if dependency == "ghost"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!instantiated(&container, "ok"));
    }

    #[test]
    fn test_factory_without_instance() {
        let container = ModuleContainer::new();
        container
            .register_complex(ModuleDefinition::new("empty").factory(Factory::dynamic(0, |_| Ok(None))))
            .unwrap();

        let err = container.resolve("empty").unwrap_err();
        assert!(matches!(err, ContainerError::InstantiationFailed { .. }));
        assert!(!instantiated(&container, "empty"));
        assert!(container.registry.lock().get("empty").unwrap().resolving.is_none());
    }

    #[test]
    fn test_factory_error_is_wrapped() {
        let container = ModuleContainer::new();
        container
            .register_complex(ModuleDefinition::new("broken").factory(Factory::dynamic(0, |_| Err("disk full".into()))))
            .unwrap();

        let err = container.resolve("broken").unwrap_err();
        assert_eq!(err.to_string(), "Factory of module 'broken' failed: disk full");

        // 失败后可以重新解析
        assert!(container.resolve("broken").is_err());
        assert_eq!(container.stats().factory_invocations, 2);
    }
}
