pub mod aws;
pub mod broker;
pub mod global;
pub mod loader;
pub mod mailer;

pub use aws::{AwsConfig, CheckerConfig, SourceConfig};
pub use broker::{BrokerConfig, BrokerKind, ReconnectConfig};
pub use global::{AlertaConfig, DestinationConfig, LoggingConfig};
pub use loader::{validate, validate_mailer, ConfigLoader, CONFIG_FILE, ENV_PREFIX};
pub use mailer::{MailerConfig, NotifyChannel, NotifyConfig, SmtpConfig, WebhookSettings};
