pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod message;
pub mod notifier;
pub mod providers;
pub mod render;

pub use dispatcher::{parse_alert, DispatchStats, Dispatcher, Outcome};
pub use error::{NotifyError, ParseError};
pub use filter::{Decision, FilterRule, NotificationFilter};
pub use message::{InlineGraph, NotifyMessage};
pub use notifier::{Notifier, NotifyResult};
pub use providers::{EmailConfig, EmailNotifier, WebhookConfig, WebhookNotifier};
pub use render::Renderer;
