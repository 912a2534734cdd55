use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 消息代理类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    #[default]
    Mqtt,
    /// 进程内代理，用于本地演练
    Memory,
}

/// 消息代理配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub kind: BrokerKind,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// 客户端 ID；持久会话依赖固定的客户端 ID
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// 等待代理确认的超时（秒）
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,

    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// 重连退避配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// 每次尝试的增长系数
    #[serde(default = "default_increase")]
    pub increase: f64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_ack_timeout_secs() -> u64 {
    10
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_increase() -> f64 {
    5.0
}

fn default_max_delay_secs() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    20
}

impl BrokerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    /// 客户端 ID，未配置时使用 `{program}-{hostname}`
    pub fn client_id_for(&self, program: &str, hostname: &str) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", program, hostname))
    }
}

impl ReconnectConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            kind: BrokerKind::default(),
            host: default_host(),
            port: default_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: default_keep_alive_secs(),
            ack_timeout_secs: default_ack_timeout_secs(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            increase: default_increase(),
            max_delay_secs: default_max_delay_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.kind, BrokerKind::Mqtt);
        assert_eq!(config.port, 1883);
        assert_eq!(config.reconnect.initial_delay(), Duration::from_millis(100));
        assert_eq!(config.reconnect.max_delay(), Duration::from_secs(120));
        assert_eq!(config.reconnect.max_attempts, 20);
    }

    #[test]
    fn test_client_id() {
        let mut config = BrokerConfig::default();
        assert_eq!(config.client_id_for("alert-mailer", "host1"), "alert-mailer-host1");

        config.client_id = Some("mailer".to_string());
        assert_eq!(config.client_id_for("alert-mailer", "host1"), "mailer");
    }
}
