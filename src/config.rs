use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// 应用配置
///
/// `service` 为固定段，其余顶层键（如 `redis`）由各资源提供方
/// 通过 [`Config::section`] 自行解析
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(flatten)]
    sections: toml::value::Table,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CoreError::config(e.to_string()))
    }

    /// 按顶层键解析出一个配置段
    ///
    /// 键不存在时返回 `Ok(None)`；键存在但无法反序列化为 `T` 时返回错误，
    /// 由调用方决定是否降级处理
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.sections.get(key) {
            Some(value) => value
                .clone()
                .try_into()
                .map(Some)
                .map_err(|e| CoreError::config(format!("section `{key}`: {e}"))),
            None => Ok(None),
        }
    }
}
