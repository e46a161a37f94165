//! Ember App Core 错误处理模块
//!
//! 提供统一的错误类型，覆盖配置解析、资源构建与类型收窄等失败路径

use thiserror::Error;

/// 统一结果类型
pub type Result<T> = std::result::Result<T, CoreError>;

/// 底层构建错误的通用载体
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Ember App Core 统一错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    /// 配置中不存在请求的条目（可恢复：调用方可换一个名称重试）
    #[error("configuration entry `{key}.{name}` not found")]
    ConfigNotFound { key: String, name: String },

    /// 类型收窄失败（工厂返回了与类别不符的实例，属于协作方的编码错误）
    #[error("resource `{name}` has unexpected underlying type, expected {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    /// 资源构建失败（来自底层客户端库，始终向调用方传播）
    #[error("failed to build resource `{name}`")]
    Build {
        name: String,
        #[source]
        source: BoxError,
    },

    /// 配置解析失败
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Cron 表达式解析失败
    #[error("invalid cron expression `{spec}`")]
    Cron {
        spec: String,
        #[source]
        source: BoxError,
    },

    /// IO 错误
    #[error("io error")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 创建配置缺失错误
    pub fn config_not_found(key: impl Into<String>, name: impl Into<String>) -> Self {
        CoreError::ConfigNotFound {
            key: key.into(),
            name: name.into(),
        }
    }

    /// 创建类型收窄错误
    pub fn type_mismatch(name: impl Into<String>, expected: &'static str) -> Self {
        CoreError::TypeMismatch {
            name: name.into(),
            expected,
        }
    }

    /// 创建资源构建错误
    pub fn build(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CoreError::Build {
            name: name.into(),
            source: source.into(),
        }
    }

    /// 创建配置解析错误
    pub fn config(msg: impl Into<String>) -> Self {
        CoreError::Config(msg.into())
    }
}
