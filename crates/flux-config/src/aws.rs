use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 云实例轮询守护进程配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AwsConfig {
    /// 每个账号/区域一个实例数据源
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// 告警存储 API 基础地址；不配置时跳过对账
    #[serde(default)]
    pub store_url: Option<String>,

    #[serde(default = "default_store_filter")]
    pub store_filter: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// 告警超时（秒）
    #[serde(default = "default_alert_timeout_secs")]
    pub alert_timeout_secs: u64,
}

/// 实例数据源
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub account: String,
    pub region: String,
    pub url: String,
}

/// 检查命令行配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckerConfig {
    /// 插件目录
    #[serde(default = "default_plugin_dir")]
    pub plugin_dir: String,

    /// 消息过期时间（秒）
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,
}

fn default_store_filter() -> String {
    "tags=cloud:AWS/EC2".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_alert_timeout_secs() -> u64 {
    86400
}

fn default_plugin_dir() -> String {
    "/usr/lib64/nagios/plugins".to_string()
}

fn default_expiration_secs() -> u64 {
    600
}

impl AwsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            store_url: None,
            store_filter: default_store_filter(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            alert_timeout_secs: default_alert_timeout_secs(),
        }
    }
}

impl CheckerConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            plugin_dir: default_plugin_dir(),
            expiration_secs: default_expiration_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aws_defaults() {
        let config = AwsConfig::default();
        assert!(config.sources.is_empty());
        assert!(config.store_url.is_none());
        assert_eq!(config.store_filter, "tags=cloud:AWS/EC2");
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.alert_timeout_secs, 86400);
    }

    #[test]
    fn test_checker_defaults() {
        assert_eq!(CheckerConfig::default().expiration(), Duration::from_secs(600));
    }
}
