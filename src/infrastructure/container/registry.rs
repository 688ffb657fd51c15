//! 模块注册表
//!
//! 保存名称到模块定义/状态的映射，在注册时校验唯一性与结构合法性。
//! 条目按注册顺序存放，过滤查询依赖这一顺序。

use std::thread::ThreadId;

use serde::{Deserialize, Serialize};

use super::lifecycle::LifecycleState;
use super::service::{Factory, Instance};
use crate::errors::ContainerError;

/// 模块属性
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleProperties {
    /// 可启动模块只能显式 start/stop，不能作为其他模块的依赖
    pub startable: bool,
}

impl ModuleProperties {
    pub fn startable() -> Self {
        Self { startable: true }
    }
}

/// 完整的模块定义（`register_complex` 的输入）
#[derive(Debug, Clone, Default)]
pub struct ModuleDefinition {
    pub name: String,
    pub factory: Option<Factory>,
    pub properties: ModuleProperties,
    pub dependencies: Vec<String>,
}

impl ModuleDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn factory(mut self, factory: Factory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn properties(mut self, properties: ModuleProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn startable(mut self) -> Self {
        self.properties.startable = true;
        self
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// 检查必填字段
    pub(crate) fn check_required(&self) -> Result<(), ContainerError> {
        if self.name.is_empty() {
            return Err(ContainerError::MissingField { field: "name" });
        }
        if self.factory.is_none() {
            return Err(ContainerError::MissingField { field: "factory" });
        }
        Ok(())
    }
}

/// 注册表中的一个条目
pub(crate) struct ModuleEntry {
    pub name: String,
    pub factory: Factory,
    pub properties: ModuleProperties,
    pub dependencies: Vec<String>,
    pub instance: Option<Instance>,
    pub state: LifecycleState,
    /// 正在执行工厂的线程；工厂在锁外运行期间置位
    pub resolving: Option<ThreadId>,
}

impl ModuleEntry {
    pub fn is_started(&self) -> bool {
        self.state == LifecycleState::Started
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<ModuleEntry>,
}

impl Registry {
    pub fn get(&self, name: &str) -> Option<&ModuleEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ModuleEntry> {
        self.entries.iter_mut().find(|entry| entry.name == name)
    }

    pub fn entries(&self) -> &[ModuleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 校验并新增一个模块
    pub fn register(&mut self, definition: ModuleDefinition) -> Result<(), ContainerError> {
        definition.check_required()?;
        let ModuleDefinition {
            name,
            factory,
            properties,
            dependencies,
        } = definition;
        let factory = factory.ok_or(ContainerError::MissingField { field: "factory" })?;

        if self.get(&name).is_some() {
            return Err(ContainerError::AlreadyRegistered { name });
        }

        if factory.is_value() {
            if !dependencies.is_empty() {
                return Err(ContainerError::ValueWithDependencies { name });
            }
        } else if factory.arity() != dependencies.len() {
            return Err(ContainerError::ArityMismatch {
                arity: factory.arity(),
                declared: dependencies.len(),
                name,
            });
        }

        for (index, dependency) in dependencies.iter().enumerate() {
            if dependencies[..index].contains(dependency) {
                return Err(ContainerError::DuplicateDependency {
                    dependency: dependency.clone(),
                    name,
                });
            }
        }

        self.entries.push(ModuleEntry {
            name,
            factory,
            properties,
            dependencies,
            instance: None,
            state: LifecycleState::Unstarted,
            resolving: None,
        });
        Ok(())
    }

    /// 移除未实例化的模块；未注册时静默成功
    pub fn clear(&mut self, name: &str) -> Result<(), ContainerError> {
        let Some(position) = self.entries.iter().position(|entry| entry.name == name) else {
            return Ok(());
        };

        let entry = &self.entries[position];
        if entry.instance.is_some() {
            return Err(ContainerError::AlreadyInstantiated {
                name: name.to_string(),
            });
        }
        if entry.resolving.is_some() {
            return Err(ContainerError::ResolutionInProgress {
                name: name.to_string(),
            });
        }

        self.entries.remove(position);
        Ok(())
    }

    /// 先 clear 再 register；已实例化的模块不能被替换
    pub fn replace(&mut self, definition: ModuleDefinition) -> Result<(), ContainerError> {
        definition.check_required()?;
        self.clear(&definition.name)?;
        self.register(definition)
    }

    /// 清空注册表；有模块在运行（或正处于启停过程中）时失败
    pub fn reset(&mut self) -> Result<(), ContainerError> {
        let running: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.state != LifecycleState::Unstarted)
            .map(|entry| entry.name.clone())
            .collect();

        if !running.is_empty() {
            return Err(ContainerError::ModulesRunning { names: running });
        }
        if let Some(entry) = self.entries.iter().find(|entry| entry.resolving.is_some()) {
            return Err(ContainerError::ResolutionInProgress {
                name: entry.name.clone(),
            });
        }

        self.entries.clear();
        Ok(())
    }
}
