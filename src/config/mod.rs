//! 容器配置
//!
//! 从 TOML 文件和/或 `MODCONTAINER_*` 环境变量加载。
//!
//! ```toml
//! [lifecycle]
//! start_hook = "start"
//! stop_hook = "stop"
//! bulk_mode = "concurrent"
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

pub mod loader;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::logging::LogFormat;

pub use loader::ConfigLoader;

// 环境变量名
pub const ENV_START_HOOK: &str = "MODCONTAINER_START_HOOK";
pub const ENV_STOP_HOOK: &str = "MODCONTAINER_STOP_HOOK";
pub const ENV_BULK_MODE: &str = "MODCONTAINER_BULK_MODE";
pub const ENV_LOG_LEVEL: &str = "MODCONTAINER_LOG_LEVEL";

pub const DEFAULT_START_HOOK: &str = "start";
pub const DEFAULT_STOP_HOOK: &str = "stop";

/// `start_all`/`stop_all` 等待各个操作的方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkMode {
    #[default]
    Concurrent,
    Sequential,
}

impl std::str::FromStr for BulkMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(BulkMode::Concurrent),
            "sequential" => Ok(BulkMode::Sequential),
            other => Err(ConfigError::InvalidValue {
                field: "lifecycle.bulk_mode".to_string(),
                reason: format!("expected 'concurrent' or 'sequential', got '{other}'"),
            }),
        }
    }
}

/// 生命周期设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// `start()` 调用的钩子
    pub start_hook: String,
    /// `stop()` 调用的钩子
    pub stop_hook: String,
    pub bulk_mode: BulkMode,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            start_hook: DEFAULT_START_HOOK.to_string(),
            stop_hook: DEFAULT_STOP_HOOK.to_string(),
            bulk_mode: BulkMode::default(),
        }
    }
}

/// 日志设置，见 [`crate::logging::LoggingConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` 过滤指令，例如 `info` 或 `modcontainer=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// 容器主配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub lifecycle: LifecycleConfig,
    pub logging: LoggingSettings,
}

impl ContainerConfig {
    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse("<inline>".to_string(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置（展开 `~`）
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        ConfigLoader::new().load_file(path)
    }

    /// 默认配置，再由进程环境变量覆盖
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_map = ConfigLoader::new().collect_env_vars();
        let mut config = Self::default();
        config.apply_env_overrides(&env_map)?;
        Ok(config)
    }

    /// 应用预先收集的 `MODCONTAINER_*` 环境变量覆盖
    pub fn apply_env_overrides(&mut self, env_map: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(hook) = env_map.get(ENV_START_HOOK) {
            self.lifecycle.start_hook = hook.clone();
        }
        if let Some(hook) = env_map.get(ENV_STOP_HOOK) {
            self.lifecycle.stop_hook = hook.clone();
        }
        if let Some(mode) = env_map.get(ENV_BULK_MODE) {
            self.lifecycle.bulk_mode = mode.parse()?;
        }
        if let Some(level) = env_map.get(ENV_LOG_LEVEL) {
            self.logging.level = level.clone();
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lifecycle.start_hook.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "lifecycle.start_hook".to_string(),
                reason: "hook name must not be empty".to_string(),
            });
        }
        if self.lifecycle.stop_hook.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "lifecycle.stop_hook".to_string(),
                reason: "hook name must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
