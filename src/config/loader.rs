use std::{collections::HashMap, env, fs, path::PathBuf};

use super::ContainerConfig;
use crate::errors::ConfigError;

const ENV_PREFIX: &str = "MODCONTAINER_";

/// 配置加载器，负责从文件和环境变量读取配置
#[derive(Debug, Default)]
pub struct ConfigLoader {
    base_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// 创建使用默认路径的加载器
    pub fn new() -> Self {
        Self { base_path: None }
    }

    /// 创建使用自定义基础路径的加载器（用于测试）
    pub fn with_base_path(base_path: PathBuf) -> Self {
        Self {
            base_path: Some(base_path),
        }
    }

    /// 读取 TOML 文件，再应用环境变量覆盖
    pub fn load_config(&self, path: &str) -> Result<ContainerConfig, ConfigError> {
        let mut config = self.load_file(path)?;
        config.apply_env_overrides(&self.collect_env_vars())?;
        Ok(config)
    }

    /// 只读取 TOML 文件，不看环境变量
    pub fn load_file(&self, path: &str) -> Result<ContainerConfig, ConfigError> {
        let path = self.resolve_path(path);
        let path_display = path.display().to_string();
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path_display.clone(), e))?;
        let config: ContainerConfig =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParse(path_display.clone(), e))?;
        config.validate()?;
        tracing::debug!(path = %path_display, "configuration loaded");
        Ok(config)
    }

    /// 收集 `MODCONTAINER_*` 环境变量
    pub fn collect_env_vars(&self) -> HashMap<String, String> {
        env::vars().filter(|(key, _)| key.starts_with(ENV_PREFIX)).collect()
    }

    /// 展开 `~`；设置了基础路径时改为相对基础路径拼接
    fn resolve_path(&self, path: &str) -> PathBuf {
        if let Some(base_path) = &self.base_path {
            return base_path.join(path.trim_start_matches("~/"));
        }
        PathBuf::from(shellexpand::tilde(path).as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BulkMode;

    #[test]
    fn test_load_with_base_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("container.toml"),
            "[lifecycle]\nstop_hook = \"shutdown\"\nbulk_mode = \"sequential\"\n",
        )
        .unwrap();

        let loader = ConfigLoader::with_base_path(dir.path().to_path_buf());
        let config = loader.load_file("~/container.toml").unwrap();
        assert_eq!(config.lifecycle.stop_hook, "shutdown");
        assert_eq!(config.lifecycle.bulk_mode, BulkMode::Sequential);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::with_base_path(dir.path().to_path_buf());
        let err = loader.load_file("absent.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(..)));
    }
}
