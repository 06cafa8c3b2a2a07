// crates/cf_config/src/kernel_config.rs

//! 内核运行配置
//!
//! 进程级的运行参数，JSON 文件格式：
//!
//! ```json
//! {
//!   "root_name": "Root",
//!   "processor_name": "cf-processor",
//!   "fanout_timeout_ms": 5000,
//!   "reply_cache_capacity": 256
//! }
//! ```
//!
//! 缺省字段取默认值。

use cf_foundation::uri::is_valid_name;
use cf_foundation::{CfError, CfResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 内核配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// 组件树根节点名
    pub root_name: String,
    /// 处理线程名
    pub processor_name: String,
    /// 扇出屏障超时（毫秒）
    pub fanout_timeout_ms: u64,
    /// 服务端记忆的已处理调用数量，用于重复调用的应答重放
    pub reply_cache_capacity: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            root_name: "Root".to_string(),
            processor_name: "cf-processor".to_string(),
            fanout_timeout_ms: 5000,
            reply_cache_capacity: 256,
        }
    }
}

impl KernelConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 扇出超时
    pub fn fanout_timeout(&self) -> Duration {
        Duration::from_millis(self.fanout_timeout_ms)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> CfResult<()> {
        if !is_valid_name(&self.root_name) {
            return Err(CfError::config(format!(
                "root_name '{}' 不是合法的组件名",
                self.root_name
            )));
        }
        if self.processor_name.trim().is_empty() {
            return Err(CfError::config("processor_name 不能为空"));
        }
        if self.fanout_timeout_ms == 0 {
            return Err(CfError::config("fanout_timeout_ms 必须大于 0"));
        }
        Ok(())
    }

    /// 从JSON字符串解析并验证
    pub fn from_json(json: &str) -> CfResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CfError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 转换为JSON字符串
    pub fn to_json_pretty(&self) -> CfResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CfError::config(e.to_string()))
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> CfResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CfError::io(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&content)?;
        tracing::debug!(path = %path.display(), "kernel config loaded");
        Ok(config)
    }

    /// 保存到文件
    pub fn save(&self, path: impl AsRef<Path>) -> CfResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?)
            .map_err(|e| CfError::io(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = KernelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fanout_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = KernelConfig::from_json(r#"{ "fanout_timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.fanout_timeout_ms, 250);
        assert_eq!(config.root_name, "Root");
    }

    #[test]
    fn test_invalid_values() {
        assert!(KernelConfig::from_json(r#"{ "fanout_timeout_ms": 0 }"#).is_err());
        assert!(KernelConfig::from_json(r#"{ "root_name": "a/b" }"#).is_err());
        assert!(KernelConfig::from_json("not json").is_err());
    }
}
