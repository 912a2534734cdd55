use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// 通知渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    #[default]
    Email,
    Webhook,
}

/// 通知守护进程配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailerConfig {
    /// 告警详情页链接的前缀
    #[serde(default = "default_alerta_url")]
    pub alerta_url: String,

    /// 令牌桶容量
    #[serde(default = "default_token_limit")]
    pub token_limit: u32,

    /// 补充一个令牌的间隔（秒）
    #[serde(default = "default_refill_interval_secs")]
    pub refill_interval_secs: u64,

    /// 退出时等待补充任务结束的上限（秒）
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// 存在该文件时暂停启动
    #[serde(default)]
    pub disable_file: Option<PathBuf>,

    #[serde(default = "default_disable_poll_secs")]
    pub disable_poll_secs: u64,

    #[serde(default)]
    pub channel: NotifyChannel,

    /// 时区偏移（秒）；不设置时使用本地时区
    #[serde(default)]
    pub utc_offset_secs: Option<i32>,
}

/// 通知渠道配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub smtp: SmtpConfig,

    #[serde(default)]
    pub webhook: Option<WebhookSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub tls: bool,

    #[serde(default = "default_from")]
    pub from: String,

    #[serde(default)]
    pub to: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookSettings {
    pub url: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_alerta_url() -> String {
    "http://localhost".to_string()
}

fn default_token_limit() -> u32 {
    20
}

fn default_refill_interval_secs() -> u64 {
    30
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

fn default_disable_poll_secs() -> u64 {
    120
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_from() -> String {
    "alerta@localhost".to_string()
}

impl MailerConfig {
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.refill_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn disable_poll(&self) -> Duration {
        Duration::from_secs(self.disable_poll_secs)
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            alerta_url: default_alerta_url(),
            token_limit: default_token_limit(),
            refill_interval_secs: default_refill_interval_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            disable_file: None,
            disable_poll_secs: default_disable_poll_secs(),
            channel: NotifyChannel::default(),
            utc_offset_secs: None,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            tls: false,
            from: default_from(),
            to: Vec::new(),
        }
    }
}
