use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::mailer::NotifyChannel;
use crate::AlertaConfig;

/// 默认配置文件名
pub const CONFIG_FILE: &str = "alerta.toml";

/// 默认环境变量前缀，如 `FLUX_BROKER__HOST`
pub const ENV_PREFIX: &str = "FLUX";

/// 配置加载器
pub struct ConfigLoader {
    config_path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// 从配置目录加载 `alerta.toml`
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self::from_file(config_dir.as_ref().join(CONFIG_FILE))
    }

    /// 指定配置文件路径
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// 加载配置
    ///
    /// 文件不存在时使用默认值，环境变量覆盖文件中的值。
    pub fn load(&self) -> Result<AlertaConfig> {
        let path = self
            .config_path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid config path"))?;

        let config = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// 校验配置
pub fn validate(config: &AlertaConfig) -> Result<()> {
    if config.destinations.alerts.trim().is_empty() {
        return Err(anyhow!("destinations.alerts must not be empty"));
    }
    if config.destinations.notify.trim().is_empty() {
        return Err(anyhow!("destinations.notify must not be empty"));
    }

    let reconnect = &config.broker.reconnect;
    if reconnect.max_attempts == 0 {
        return Err(anyhow!("broker.reconnect.max_attempts must be greater than 0"));
    }
    if reconnect.increase < 0.0 || !reconnect.increase.is_finite() {
        return Err(anyhow!(
            "broker.reconnect.increase ({}) must be a non-negative number",
            reconnect.increase
        ));
    }
    if reconnect.initial_delay() > reconnect.max_delay() {
        return Err(anyhow!(
            "broker.reconnect.initial_delay_ms ({}) cannot be greater than max_delay_secs ({})",
            reconnect.initial_delay_ms,
            reconnect.max_delay_secs
        ));
    }

    if config.mailer.token_limit == 0 {
        return Err(anyhow!("mailer.token_limit must be greater than 0"));
    }
    if config.mailer.refill_interval_secs == 0 {
        return Err(anyhow!("mailer.refill_interval_secs must be greater than 0"));
    }
    if config.aws.poll_interval_secs == 0 {
        return Err(anyhow!("aws.poll_interval_secs must be greater than 0"));
    }
    for source in &config.aws.sources {
        if source.account.is_empty() || source.region.is_empty() || source.url.is_empty() {
            return Err(anyhow!(
                "aws source {}/{} needs account, region and url",
                source.account,
                source.region
            ));
        }
    }

    Ok(())
}

/// 校验通知守护进程需要的配置
pub fn validate_mailer(config: &AlertaConfig) -> Result<()> {
    validate(config)?;

    match config.mailer.channel {
        NotifyChannel::Email if config.notify.smtp.to.is_empty() => {
            Err(anyhow!("notify.smtp.to must list at least one recipient"))
        }
        NotifyChannel::Webhook if config.notify.webhook.is_none() => {
            Err(anyhow!("notify.webhook must be set for the webhook channel"))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrokerKind, WebhookSettings};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    fn valid() -> AlertaConfig {
        let mut config = AlertaConfig::default();
        config.notify.smtp.to = vec!["ops@example.com".to_string()];
        config
    }

    #[test]
    fn test_load_default_config() {
        let temp_dir = tempdir().unwrap();
        let loader = ConfigLoader::new(temp_dir.path()).with_env_prefix("FLUXTEST_DEFAULT");

        let config = loader.load().unwrap();
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.mailer.token_limit, 20);
        assert_eq!(config.destinations.notify, "alerta/topic/notify");
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_content = r#"
[broker]
kind = "memory"
host = "mq.example.com"
port = 8883

[broker.reconnect]
max_attempts = 5

[destinations]
notify = "alerta/topic/mail"

[mailer]
alerta_url = "http://monitoring.example.com"
token_limit = 10
refill_interval_secs = 15

[notify.smtp]
host = "mx"
to = ["ops@example.com", "oncall@example.com"]

[[aws.sources]]
account = "prod"
region = "eu-west-1"
url = "http://ec2-proxy/prod/eu-west-1"

[logging]
level = "debug"
json = true
"#;
        fs::write(temp_dir.path().join(CONFIG_FILE), config_content).unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).with_env_prefix("FLUXTEST_FILE");
        let config = loader.load().unwrap();
        assert!(validate_mailer(&config).is_ok());

        assert_eq!(config.broker.kind, BrokerKind::Memory);
        assert_eq!(config.broker.port, 8883);
        assert_eq!(config.broker.reconnect.max_attempts, 5);
        assert_eq!(config.broker.reconnect.max_delay_secs, 120);
        assert_eq!(config.destinations.alerts, "alerta/queue/alerts");
        assert_eq!(config.destinations.notify, "alerta/topic/mail");
        assert_eq!(config.mailer.token_limit, 10);
        assert_eq!(config.notify.smtp.host, "mx");
        assert_eq!(config.notify.smtp.to.len(), 2);
        assert_eq!(config.aws.sources[0].region, "eu-west-1");
        assert!(config.logging.json);
    }

    #[test]
    fn test_environment_overrides_file() {
        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "[broker]\nhost = \"from-file\"\n",
        )
        .unwrap();

        std::env::set_var("FLUXTEST_ENV_BROKER__HOST", "from-env");
        std::env::set_var("FLUXTEST_ENV_MAILER__TOKEN_LIMIT", "7");

        let loader = ConfigLoader::new(temp_dir.path()).with_env_prefix("FLUXTEST_ENV");
        let config = loader.load().unwrap();

        assert_eq!(config.broker.host, "from-env");
        assert_eq!(config.mailer.token_limit, 7);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "[broker\nhost = ").unwrap();

        let loader = ConfigLoader::new(temp_dir.path()).with_env_prefix("FLUXTEST_BAD");
        assert!(loader.load().is_err());
    }

    #[test]
    fn test_validate_config() {
        assert!(validate(&AlertaConfig::default()).is_ok());
        assert!(validate_mailer(&valid()).is_ok());

        // 默认配置没有收件人
        assert!(validate_mailer(&AlertaConfig::default()).is_err());

        let mut config = valid();
        config.mailer.token_limit = 0;
        assert!(validate(&config).is_err());

        let mut config = valid();
        config.mailer.refill_interval_secs = 0;
        assert!(validate(&config).is_err());

        let mut config = valid();
        config.destinations.notify = " ".to_string();
        assert!(validate(&config).is_err());

        let mut config = valid();
        config.broker.reconnect.max_attempts = 0;
        assert!(validate(&config).is_err());

        let mut config = valid();
        config.aws.poll_interval_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_webhook_channel() {
        let mut config = AlertaConfig::default();
        config.mailer.channel = NotifyChannel::Webhook;
        assert!(validate_mailer(&config).is_err());

        config.notify.webhook = Some(WebhookSettings {
            url: "http://hooks.local/alerts".to_string(),
            headers: HashMap::new(),
        });
        assert!(validate_mailer(&config).is_ok());
    }
}
