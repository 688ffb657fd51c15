use thiserror::Error;

use crate::infrastructure::container::LifecycleState;

/// 工厂与生命周期钩子返回的装箱错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 容器可能报告的四类错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 模块定义非法或冲突
    Registration,
    /// 无法构建实例依赖图
    Resolution,
    /// `clear`/`reset` 会破坏已有状态
    Mutation,
    /// 在错误的状态下调用 `start`/`stop`，或钩子执行失败
    Lifecycle,
}

/// 容器产生的所有错误
#[derive(Debug, Error)]
pub enum ContainerError {
    // 注册
    #[error("Module definition is missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Module '{name}' has already been registered, see replace()")]
    AlreadyRegistered { name: String },

    #[error("Cannot register value module '{name}' with dependencies, use a factory to receive dependencies")]
    ValueWithDependencies { name: String },

    #[error("Factory of module '{name}' takes {arity} parameter(s) but {declared} dependencies were declared")]
    ArityMismatch {
        name: String,
        arity: usize,
        declared: usize,
    },

    #[error("Module '{name}' declares dependency '{dependency}' more than once")]
    DuplicateDependency { name: String, dependency: String },

    // 解析
    #[error("Module '{name}' has not been registered")]
    UnknownModule { name: String },

    #[error("Module '{name}' depends on '{dependency}', which has not been registered")]
    MissingDependency { name: String, dependency: String },

    #[error("Module '{name}' cannot depend on itself")]
    SelfDependency { name: String },

    #[error("Module '{name}' cannot depend on startable module '{dependency}'")]
    StartableDependency { name: String, dependency: String },

    #[error("Module '{name}' was requested again while its own factory was running")]
    ReentrantResolution { name: String },

    #[error("Circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("Factory of module '{name}' failed: {source}")]
    FactoryFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to instantiate module '{name}', factory produced no instance")]
    InstantiationFailed { name: String },

    #[error("Module '{name}' holds a {actual}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    // 变更
    #[error("Module '{name}' was already instantiated, cannot modify")]
    AlreadyInstantiated { name: String },

    #[error("Module '{name}' is being instantiated, cannot modify")]
    ResolutionInProgress { name: String },

    #[error("Cannot reset container while modules are running, stop them first. Running modules: {}", .names.join(", "))]
    ModulesRunning { names: Vec<String> },

    // 生命周期
    #[error("Cannot start non-startable module '{name}'")]
    NotStartable { name: String },

    #[error("Cannot stop module '{name}', it has not been started")]
    NotStarted { name: String },

    #[error("Module '{name}' is currently {state}")]
    TransitionInProgress { name: String, state: LifecycleState },

    #[error("Module '{name}' has no lifecycle hook '{hook}()'")]
    MissingHook { name: String, hook: String },

    #[error("Lifecycle hook '{hook}()' of module '{name}' failed: {source}")]
    HookFailed {
        name: String,
        hook: String,
        #[source]
        source: BoxError,
    },

    #[error("Module '{name}' is marked started but holds no instance")]
    InconsistentState { name: String },
}

impl ContainerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ContainerError::MissingField { .. }
            | ContainerError::AlreadyRegistered { .. }
            | ContainerError::ValueWithDependencies { .. }
            | ContainerError::ArityMismatch { .. }
            | ContainerError::DuplicateDependency { .. } => ErrorKind::Registration,

            ContainerError::UnknownModule { .. }
            | ContainerError::MissingDependency { .. }
            | ContainerError::SelfDependency { .. }
            | ContainerError::StartableDependency { .. }
            | ContainerError::CircularDependency { .. }
            | ContainerError::ReentrantResolution { .. }
            | ContainerError::FactoryFailed { .. }
            | ContainerError::InstantiationFailed { .. }
            | ContainerError::TypeMismatch { .. } => ErrorKind::Resolution,

            ContainerError::AlreadyInstantiated { .. }
            | ContainerError::ResolutionInProgress { .. }
            | ContainerError::ModulesRunning { .. } => ErrorKind::Mutation,

            ContainerError::NotStartable { .. }
            | ContainerError::NotStarted { .. }
            | ContainerError::TransitionInProgress { .. }
            | ContainerError::MissingHook { .. }
            | ContainerError::HookFailed { .. }
            | ContainerError::InconsistentState { .. } => ErrorKind::Lifecycle,
        }
    }

    /// 出错的模块名（错误只涉及单个模块时）
    pub fn module_name(&self) -> Option<&str> {
        match self {
            ContainerError::MissingField { .. } | ContainerError::ModulesRunning { .. } => None,
            ContainerError::CircularDependency { chain } => chain.first().map(String::as_str),
            ContainerError::AlreadyRegistered { name }
            | ContainerError::ValueWithDependencies { name }
            | ContainerError::ArityMismatch { name, .. }
            | ContainerError::DuplicateDependency { name, .. }
            | ContainerError::UnknownModule { name }
            | ContainerError::MissingDependency { name, .. }
            | ContainerError::SelfDependency { name }
            | ContainerError::StartableDependency { name, .. }
            | ContainerError::ReentrantResolution { name }
            | ContainerError::FactoryFailed { name, .. }
            | ContainerError::InstantiationFailed { name }
            | ContainerError::TypeMismatch { name, .. }
            | ContainerError::AlreadyInstantiated { name }
            | ContainerError::ResolutionInProgress { name }
            | ContainerError::NotStartable { name }
            | ContainerError::NotStarted { name }
            | ContainerError::TransitionInProgress { name, .. }
            | ContainerError::MissingHook { name, .. }
            | ContainerError::HookFailed { name, .. }
            | ContainerError::InconsistentState { name } => Some(name),
        }
    }
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
