pub mod aws;
pub mod bus;
pub mod checker;
pub mod logging;
pub mod mailer;

pub use bus::{bus_client, reconnect_policy, DynBusClient};
pub use checker::{CheckError, CheckerArgs, PluginOutput};
pub use logging::{hostname, init_logging};
pub use mailer::MailerContext;
