//! 结构化过滤查询
//!
//! `ModuleFilter` 的每个字段都是可选条件，只有全部指定条件都满足的模块才会命中。
//! `properties` 为嵌套条件；`dependencies` 作为整体比较，不逐元素匹配。

use super::lifecycle::LifecycleState;
use super::registry::{ModuleEntry, ModuleProperties};

/// 模块快照，供过滤与内省使用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub properties: ModuleProperties,
    pub dependencies: Vec<String>,
    pub state: LifecycleState,
    pub started: bool,
    pub instantiated: bool,
}

impl ModuleInfo {
    pub(crate) fn from_entry(entry: &ModuleEntry) -> Self {
        Self {
            name: entry.name.clone(),
            properties: entry.properties,
            dependencies: entry.dependencies.clone(),
            state: entry.state,
            started: entry.is_started(),
            instantiated: entry.instance.is_some(),
        }
    }
}

/// `properties` 上的嵌套条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertiesFilter {
    pub startable: Option<bool>,
}

impl PropertiesFilter {
    pub fn matches(&self, properties: &ModuleProperties) -> bool {
        self.startable.map_or(true, |startable| properties.startable == startable)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleFilter {
    pub name: Option<String>,
    pub started: Option<bool>,
    pub state: Option<LifecycleState>,
    pub instantiated: Option<bool>,
    pub properties: PropertiesFilter,
    pub dependencies: Option<Vec<String>>,
}

impl ModuleFilter {
    /// 空过滤器匹配所有模块
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn started(mut self, started: bool) -> Self {
        self.started = Some(started);
        self
    }

    pub fn state(mut self, state: LifecycleState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn instantiated(mut self, instantiated: bool) -> Self {
        self.instantiated = Some(instantiated);
        self
    }

    pub fn startable(mut self, startable: bool) -> Self {
        self.properties.startable = Some(startable);
        self
    }

    pub fn dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(dependencies.into_iter().map(Into::into).collect());
        self
    }

    pub fn matches(&self, module: &ModuleInfo) -> bool {
        self.name.as_ref().map_or(true, |name| &module.name == name)
            && self.started.map_or(true, |started| module.started == started)
            && self.state.map_or(true, |state| module.state == state)
            && self
                .instantiated
                .map_or(true, |instantiated| module.instantiated == instantiated)
            && self.properties.matches(&module.properties)
            && self
                .dependencies
                .as_ref()
                .map_or(true, |dependencies| &module.dependencies == dependencies)
    }
}
