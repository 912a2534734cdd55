pub mod client;
pub mod error;
pub mod memory;
pub mod policy;
pub mod state;
pub mod transport;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use client::BusClient;
pub use error::{BusError, Result};
pub use memory::{MemoryBroker, MemoryTransport};
pub use policy::ReconnectPolicy;
pub use state::{ConnectionEvent, ConnectionStatus};
pub use transport::{Delivery, Transport, TransportEvent};

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttSettings, MqttTransport};
