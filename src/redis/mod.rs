//! Redis 资源提供方
//!
//! 基于命名资源工厂按逻辑名称惰性构建 redis 客户端。配置来自
//! 顶层 `redis` 键下的 `名称 -> 连接配置` 映射：
//!
//! ```toml
//! [service]
//! name = "my-service"
//!
//! [redis.default]
//! url = "redis://127.0.0.1:6379/"
//!
//! [redis.session]
//! url = "redis://10.0.0.2:6379/1"
//! ```
//!
//! `default` 条目缺失时回退到环境默认配置（`REDIS_URL` 环境变量或
//! 本机默认地址）；其余名称缺失时返回配置缺失错误

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::container::{CloserProvider, Module};
use crate::error::{CoreError, Result};
use crate::factory::{Factory, Pair, TypedFactory};

/// 回退到环境默认配置的保留名称
pub const DEFAULT_NAME: &str = "default";

const CONFIG_KEY: &str = "redis";

/// 单个 redis 客户端的连接配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/".to_string(),
        }
    }
}

impl RedisConfig {
    /// 环境默认配置：`REDIS_URL` 优先，否则本机默认地址
    pub fn from_env() -> Self {
        match std::env::var("REDIS_URL") {
            Ok(url) => Self { url },
            Err(_) => Self::default(),
        }
    }
}

/// 配置拦截器
///
/// 在客户端构建前修改已解析的配置，用于无法在静态配置中表达的
/// 设置（例如按环境切换传输安全参数）
pub type RedisInterceptor = Box<dyn Fn(&str, &mut RedisConfig) + Send + Sync>;

/// Redis 资源提供方
///
/// 作为模块注册进容器后，容器关闭时会统一释放它构建过的所有客户端
pub struct RedisProvider {
    factory: TypedFactory<redis::Client>,
}

impl RedisProvider {
    pub fn new(conf: &Config) -> Self {
        Self::with_interceptor(conf, None)
    }

    /// 创建提供方，并挂接可选的配置拦截器
    ///
    /// `redis` 配置段格式非法时记录警告并按空映射处理（非致命），
    /// 此时 `default` 仍可构建，其余名称返回配置缺失错误
    pub fn with_interceptor(conf: &Config, interceptor: Option<RedisInterceptor>) -> Self {
        let entries: HashMap<String, RedisConfig> = match conf.section(CONFIG_KEY) {
            Ok(Some(map)) => map,
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(error = %e, "⚠️ Malformed redis configuration, falling back to defaults");
                HashMap::new()
            }
        };

        let factory = Factory::new(move |name| {
            let mut conf = match entries.get(name) {
                Some(c) => c.clone(),
                None if name == DEFAULT_NAME => RedisConfig::from_env(),
                None => return Err(CoreError::config_not_found(CONFIG_KEY, name)),
            };

            if let Some(interceptor) = &interceptor {
                interceptor(name, &mut conf);
            }

            // 构建失败始终向 make 调用方传播，失败不会被记忆化
            let client =
                redis::Client::open(conf.url.as_str()).map_err(|e| CoreError::build(name, e))?;
            debug!(name, url = %conf.url, "Redis client created");

            let closer_name = name.to_string();
            Ok(Pair::new(client, move || {
                debug!(name = %closer_name, "Redis client released");
            }))
        });

        Self {
            factory: TypedFactory::new(Arc::new(factory)),
        }
    }

    /// 获取或构建名为 `name` 的 redis 客户端
    pub fn make(&self, name: &str) -> Result<Arc<redis::Client>> {
        self.factory.make(name)
    }

    /// 克隆一份收窄后的工厂句柄，供其他组件按名称取客户端
    pub fn factory(&self) -> TypedFactory<redis::Client> {
        self.factory.clone()
    }
}

impl CloserProvider for RedisProvider {
    fn provide_closer(&self) {
        self.factory.close();
    }
}

impl Module for RedisProvider {
    fn as_closer(&self) -> Option<&dyn CloserProvider> {
        Some(self)
    }
}
