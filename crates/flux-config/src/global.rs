use serde::{Deserialize, Serialize};

use crate::aws::{AwsConfig, CheckerConfig};
use crate::broker::BrokerConfig;
use crate::mailer::{MailerConfig, NotifyConfig};

/// 全局配置（alerta.toml）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AlertaConfig {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub destinations: DestinationConfig,

    #[serde(default)]
    pub mailer: MailerConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub checker: CheckerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 消息总线目的地
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    /// 告警队列
    #[serde(default = "default_alerts")]
    pub alerts: String,

    /// 通知主题
    #[serde(default = "default_notify")]
    pub notify: String,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_alerts() -> String {
    "alerta/queue/alerts".to_string()
}

fn default_notify() -> String {
    "alerta/topic/notify".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AlertaConfig {
    /// 序列化为 TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            alerts: default_alerts(),
            notify: default_notify(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AlertaConfig::default();
        assert_eq!(config.destinations.alerts, "alerta/queue/alerts");
        assert_eq!(config.destinations.notify, "alerta/topic/notify");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_toml_output_parses_back() {
        let config = AlertaConfig::default();
        let raw = config.to_toml().unwrap();
        assert!(raw.contains("[broker]"));

        let parsed: AlertaConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.mailer.token_limit, config.mailer.token_limit);
        assert_eq!(parsed.broker.reconnect.max_attempts, 20);
    }
}
