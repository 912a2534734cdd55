pub mod signal;

pub use signal::{ShutdownListener, ShutdownSignal, SignalHandler};
