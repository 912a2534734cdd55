use flux_bus::{BusClient, MemoryBroker, MqttSettings, MqttTransport, ReconnectPolicy, Transport};
use flux_config::{BrokerConfig, BrokerKind, ReconnectConfig};
use flux_shutdown::ShutdownListener;
use tracing::info;

/// 运行时选择的总线客户端
pub type DynBusClient = BusClient<Box<dyn Transport>>;

pub fn reconnect_policy(config: &ReconnectConfig) -> ReconnectPolicy {
    ReconnectPolicy::new(
        config.initial_delay(),
        config.increase,
        config.max_delay(),
        config.max_attempts,
    )
}

/// 按配置创建传输层
pub fn transport(config: &BrokerConfig, client_id: &str) -> Box<dyn Transport> {
    match config.kind {
        BrokerKind::Mqtt => {
            let mut settings = MqttSettings::new(&config.host, config.port, client_id)
                .with_ack_timeout(config.ack_timeout());
            settings.keep_alive = config.keep_alive();
            if let (Some(username), Some(password)) = (&config.username, &config.password) {
                settings = settings.with_credentials(username, password);
            }
            info!(host = %config.host, port = config.port, client_id = %client_id, "Using MQTT broker");
            Box::new(MqttTransport::new(settings))
        }
        BrokerKind::Memory => {
            info!("Using in-process broker");
            Box::new(MemoryBroker::default().transport())
        }
    }
}

/// 创建总线客户端
pub fn bus_client(
    config: &BrokerConfig,
    program: &str,
    hostname: &str,
    shutdown: ShutdownListener,
) -> DynBusClient {
    let client_id = config.client_id_for(program, hostname);
    BusClient::new(transport(config, &client_id), reconnect_policy(&config.reconnect))
        .with_shutdown(shutdown)
}
