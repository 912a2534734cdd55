pub mod alert;
pub mod message;
pub mod severity;

pub use alert::{Alert, AlertStatus};
pub use message::{BusMessage, MessageHeaders};
pub use severity::{ColorHint, Severity};
