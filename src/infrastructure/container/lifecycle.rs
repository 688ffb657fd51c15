//! 生命周期管理
//!
//! 每个可启动模块的状态机：
//!
//! ```text
//! Unstarted --start--> Starting --hook ok--> Started
//! Started   --stop---> Stopping --hook ok--> Unstarted (实例被丢弃)
//! ```
//!
//! 注册表锁只在同步区段内持有：工厂、`has_hook` 与钩子都在锁外运行，
//! 钩子的 `.await` 是 start/stop 唯一的挂起点。

use std::fmt;

use futures_util::future::{self, BoxFuture};
use parking_lot::Mutex;

use super::filter::ModuleFilter;
use super::registry::Registry;
use super::service::Instance;
use super::ModuleContainer;
use crate::errors::ContainerError;
use crate::logging::OperationTimer;

/// 模块的生命周期状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    #[default]
    Unstarted,
    Starting,
    Started,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleState::Unstarted => "unstarted",
            LifecycleState::Starting => "starting",
            LifecycleState::Started => "started",
            LifecycleState::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// 单个 start/stop 操作的完成句柄
pub type LifecycleFuture<'a> = BoxFuture<'a, Result<(), ContainerError>>;

/// 批量启停时等待多个操作完成的方式，可在构造容器时注入
pub trait CompletionStrategy: Send + Sync {
    /// 等待全部操作结束；任一失败则整体失败（返回注册顺序中第一个错误）
    fn join_all<'a>(&self, operations: Vec<LifecycleFuture<'a>>) -> LifecycleFuture<'a>;
}

/// 并发推进所有操作（默认）
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrentCompletion;

impl CompletionStrategy for ConcurrentCompletion {
    fn join_all<'a>(&self, operations: Vec<LifecycleFuture<'a>>) -> LifecycleFuture<'a> {
        Box::pin(async move {
            // 已开始的钩子不会被取消，所以不用 try_join_all
            future::join_all(operations).await.into_iter().collect()
        })
    }
}

/// 按注册顺序逐个等待
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialCompletion;

impl CompletionStrategy for SequentialCompletion {
    fn join_all<'a>(&self, operations: Vec<LifecycleFuture<'a>>) -> LifecycleFuture<'a> {
        Box::pin(async move {
            let mut first_error = None;
            for operation in operations {
                if let Err(err) = operation.await {
                    first_error.get_or_insert(err);
                }
            }
            first_error.map_or(Ok(()), Err)
        })
    }
}

/// start/stop 的 future 在钩子执行期间被丢弃时，把状态恢复为 `restore`
struct TransitionGuard<'a> {
    registry: &'a Mutex<Registry>,
    name: &'a str,
    restore: LifecycleState,
    armed: bool,
}

impl<'a> TransitionGuard<'a> {
    fn new(registry: &'a Mutex<Registry>, name: &'a str, restore: LifecycleState) -> Self {
        Self {
            registry,
            name,
            restore,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(entry) = self.registry.lock().get_mut(self.name) {
            entry.state = self.restore;
        }
        tracing::warn!(module = self.name, state = %self.restore, "lifecycle transition abandoned");
    }
}

impl ModuleContainer {
    /// 使用配置中的默认钩子（`start`）启动模块
    pub async fn start(&self, name: &str) -> Result<Instance, ContainerError> {
        let hook = self.config.lifecycle.start_hook.clone();
        self.start_with_hook(name, &hook).await
    }

    /// 启动模块：解析实例、调用钩子并等待完成。已启动时直接返回缓存实例。
    pub async fn start_with_hook(&self, name: &str, hook: &str) -> Result<Instance, ContainerError> {
        if let Some(instance) = self.check_startable(name)? {
            return Ok(instance);
        }

        // 工厂与 has_hook 都是用户代码，在锁外执行
        let instance = self.resolve(name)?;
        if !instance.has_hook(hook) {
            return Err(ContainerError::MissingHook {
                name: name.to_string(),
                hook: hook.to_string(),
            });
        }

        {
            let mut registry = self.registry.lock();
            let entry = registry.get_mut(name).ok_or_else(|| ContainerError::UnknownModule {
                name: name.to_string(),
            })?;
            match entry.state {
                LifecycleState::Unstarted => entry.state = LifecycleState::Starting,
                // 解析期间另一个 start 已完成
                LifecycleState::Started => {
                    return entry.instance.clone().ok_or_else(|| ContainerError::InconsistentState {
                        name: name.to_string(),
                    });
                }
                state => {
                    return Err(ContainerError::TransitionInProgress {
                        name: name.to_string(),
                        state,
                    });
                }
            }
            if entry.instance.is_none() {
                entry.instance = Some(instance.clone());
            }
        }

        let guard = TransitionGuard::new(&self.registry, name, LifecycleState::Unstarted);
        let timer = OperationTimer::new("module.start")
            .with_metadata("module", name)
            .with_metadata("hook", hook);
        let outcome = instance.call_hook(hook).await;
        timer.finish();
        guard.disarm();

        let mut registry = self.registry.lock();
        let entry = registry.get_mut(name);
        match outcome {
            Ok(()) => {
                if let Some(entry) = entry {
                    entry.state = LifecycleState::Started;
                }
                self.stats.record_start();
                tracing::info!(module = name, hook, "module started");
                Ok(instance)
            }
            Err(source) => {
                if let Some(entry) = entry {
                    entry.state = LifecycleState::Unstarted;
                }
                tracing::warn!(module = name, hook, error = %source, "module failed to start");
                Err(ContainerError::HookFailed {
                    name: name.to_string(),
                    hook: hook.to_string(),
                    source,
                })
            }
        }
    }

    /// 使用配置中的默认钩子（`stop`）停止模块
    pub async fn stop(&self, name: &str) -> Result<(), ContainerError> {
        let hook = self.config.lifecycle.stop_hook.clone();
        self.stop_with_hook(name, &hook).await
    }

    /// 停止模块：调用钩子并等待完成，随后丢弃缓存实例，下次解析会重新执行工厂
    pub async fn stop_with_hook(&self, name: &str, hook: &str) -> Result<(), ContainerError> {
        let instance = self.check_stoppable(name)?;
        if !instance.has_hook(hook) {
            return Err(ContainerError::MissingHook {
                name: name.to_string(),
                hook: hook.to_string(),
            });
        }

        {
            let mut registry = self.registry.lock();
            let entry = registry.get_mut(name).ok_or_else(|| ContainerError::UnknownModule {
                name: name.to_string(),
            })?;
            match entry.state {
                LifecycleState::Started => entry.state = LifecycleState::Stopping,
                LifecycleState::Unstarted => {
                    return Err(ContainerError::NotStarted {
                        name: name.to_string(),
                    });
                }
                state => {
                    return Err(ContainerError::TransitionInProgress {
                        name: name.to_string(),
                        state,
                    });
                }
            }
        }

        let guard = TransitionGuard::new(&self.registry, name, LifecycleState::Started);
        let timer = OperationTimer::new("module.stop")
            .with_metadata("module", name)
            .with_metadata("hook", hook);
        let outcome = instance.call_hook(hook).await;
        timer.finish();
        guard.disarm();

        let mut registry = self.registry.lock();
        let entry = registry.get_mut(name);
        match outcome {
            Ok(()) => {
                if let Some(entry) = entry {
                    entry.instance = None;
                    entry.state = LifecycleState::Unstarted;
                }
                self.stats.record_stop();
                tracing::info!(module = name, hook, "module stopped");
                Ok(())
            }
            Err(source) => {
                if let Some(entry) = entry {
                    entry.state = LifecycleState::Started;
                }
                tracing::warn!(module = name, hook, error = %source, "module failed to stop");
                Err(ContainerError::HookFailed {
                    name: name.to_string(),
                    hook: hook.to_string(),
                    source,
                })
            }
        }
    }

    /// start 的前置检查；已启动时返回缓存实例
    fn check_startable(&self, name: &str) -> Result<Option<Instance>, ContainerError> {
        let registry = self.registry.lock();
        let entry = registry.get(name).ok_or_else(|| ContainerError::UnknownModule {
            name: name.to_string(),
        })?;

        if !entry.properties.startable {
            return Err(ContainerError::NotStartable {
                name: name.to_string(),
            });
        }

        match entry.state {
            LifecycleState::Unstarted => Ok(None),
            LifecycleState::Started => entry
                .instance
                .clone()
                .map(Some)
                .ok_or_else(|| ContainerError::InconsistentState {
                    name: name.to_string(),
                }),
            state => Err(ContainerError::TransitionInProgress {
                name: name.to_string(),
                state,
            }),
        }
    }

    /// stop 的前置检查，返回正在运行的实例
    fn check_stoppable(&self, name: &str) -> Result<Instance, ContainerError> {
        let registry = self.registry.lock();
        let entry = registry.get(name).ok_or_else(|| ContainerError::UnknownModule {
            name: name.to_string(),
        })?;

        match entry.state {
            LifecycleState::Started => entry.instance.clone().ok_or_else(|| ContainerError::InconsistentState {
                name: name.to_string(),
            }),
            LifecycleState::Unstarted => Err(ContainerError::NotStarted {
                name: name.to_string(),
            }),
            state => Err(ContainerError::TransitionInProgress {
                name: name.to_string(),
                state,
            }),
        }
    }

    /// 启动所有尚未启动的可启动模块
    pub async fn start_all(&self) -> Result<(), ContainerError> {
        let targets = self.filtered_modules(
            &ModuleFilter::new()
                .state(LifecycleState::Unstarted)
                .startable(true),
        );
        if targets.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = targets.len(), "starting modules");
        let operations: Vec<LifecycleFuture<'_>> = targets
            .into_iter()
            .map(|module| {
                let operation: LifecycleFuture<'_> =
                    Box::pin(async move { self.start(&module.name).await.map(|_| ()) });
                operation
            })
            .collect();
        self.completion.join_all(operations).await
    }

    /// 停止所有已启动的模块
    pub async fn stop_all(&self) -> Result<(), ContainerError> {
        let targets = self.filtered_modules(&ModuleFilter::new().state(LifecycleState::Started));
        if targets.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = targets.len(), "stopping modules");
        let operations: Vec<LifecycleFuture<'_>> = targets
            .into_iter()
            .map(|module| {
                let operation: LifecycleFuture<'_> = Box::pin(async move { self.stop(&module.name).await });
                operation
            })
            .collect();
        self.completion.join_all(operations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::ready;

    fn op<'a>(result: Result<(), ContainerError>) -> LifecycleFuture<'a> {
        Box::pin(ready(result))
    }

    fn failure(name: &str) -> ContainerError {
        ContainerError::NotStarted { name: name.to_string() }
    }

    #[tokio::test]
    async fn test_concurrent_reports_first_error() {
        let result = ConcurrentCompletion
            .join_all(vec![op(Ok(())), op(Err(failure("b"))), op(Err(failure("c")))])
            .await;
        assert_eq!(result.unwrap_err().module_name(), Some("b"));
    }

    #[tokio::test]
    async fn test_sequential_runs_every_operation() {
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let operations: Vec<LifecycleFuture<'_>> = (0..3)
            .map(|i| {
                let counter = counter.clone();
                let operation: LifecycleFuture<'_> = Box::pin(async move {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    if i == 0 {
                        Err(failure("first"))
                    } else {
                        Ok(())
                    }
                });
                operation
            })
            .collect();

        let result = SequentialCompletion.join_all(operations).await;
        assert_eq!(result.unwrap_err().module_name(), Some("first"));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_join_succeeds() {
        assert!(ConcurrentCompletion.join_all(Vec::new()).await.is_ok());
        assert!(SequentialCompletion.join_all(Vec::new()).await.is_ok());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LifecycleState::Starting.to_string(), "starting");
        assert_eq!(LifecycleState::default(), LifecycleState::Unstarted);
    }
}
