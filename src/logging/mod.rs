use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// 日志环境配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingEnvironment {
    /// 开发环境
    Development,
    /// 测试环境
    Testing,
    /// 生产环境
    Production,
}

/// 日志格式配置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 人类可读格式
    #[default]
    Pretty,
    /// JSON 格式
    Json,
    /// 紧凑格式
    Compact,
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 环境
    pub environment: LoggingEnvironment,
    /// `EnvFilter` 过滤指令
    pub filter: String,
    /// 输出格式
    pub format: LogFormat,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            filter: "info".to_string(),
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            filter: "debug".to_string(),
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: true,
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        Self {
            environment: LoggingEnvironment::Production,
            filter: "info".to_string(),
            format: LogFormat::Json,
            show_target: false,
            show_thread_ids: false,
        }
    }

    /// 创建测试环境配置
    pub fn testing() -> Self {
        Self {
            environment: LoggingEnvironment::Testing,
            filter: "error".to_string(),
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
        }
    }

    /// 由容器配置文件中的 `[logging]` 段生成
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            filter: settings.level.clone(),
            format: settings.format,
            ..Self::default()
        }
    }
}

/// 初始化日志系统；全局订阅者已存在时返回错误
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(&config.filter)?;
    let ansi = config.environment != LoggingEnvironment::Production;

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);
            tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids);
            tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);
            tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
        }
    }

    tracing::info!(
        environment = ?config.environment,
        filter = %config.filter,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

/// 操作性能计时器
pub struct OperationTimer {
    start: Instant,
    operation: String,
    metadata: HashMap<String, String>,
    finished: bool,
}

impl OperationTimer {
    /// 创建新的计时器
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
            finished: false,
        }
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// 完成计时并记录日志
    pub fn finish(mut self) {
        self.finished = true;
        let duration = self.start.elapsed();

        tracing::debug!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            metadata = ?self.metadata,
            "Operation completed"
        );
    }

    /// 获取当前经过时间
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        tracing::debug!(
            operation = %self.operation,
            duration_ms = self.start.elapsed().as_millis() as u64,
            metadata = ?self.metadata,
            "Operation timer dropped before completion"
        );
    }
}
