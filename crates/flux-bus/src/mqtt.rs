use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeReasonCode};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{BusError, Result};
use crate::transport::{Delivery, Transport, TransportEvent};

/// MQTT 连接参数
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    /// 持久会话按 client_id 识别，重启后需保持不变
    pub client_id: String,
    pub keep_alive: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 等待 CONNACK / SUBACK / PUBACK 的超时
    pub ack_timeout: Duration,
    pub capacity: usize,
}

impl MqttSettings {
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            keep_alive: Duration::from_secs(30),
            username: None,
            password: None,
            ack_timeout: Duration::from_secs(10),
            capacity: 10,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        // 持久会话：断线期间的 QoS1 消息由代理保留
        options.set_clean_session(false);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options.set_credentials(username, password);
        }
        options
    }
}

/// 基于 rumqttc 的传输层
///
/// 每次 `connect` 都新建客户端和事件循环；事件循环出错后立即丢弃，
/// 由上层决定何时重连。
pub struct MqttTransport {
    settings: MqttSettings,
    connection: Option<(AsyncClient, EventLoop)>,
    pending: VecDeque<Delivery>,
}

impl MqttTransport {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            connection: None,
            pending: VecDeque::new(),
        }
    }
}

enum Ack {
    ConnAck,
    SubAck,
    PubAck,
}

/// 驱动事件循环直到收到指定的确认包；期间收到的消息放入缓冲区
async fn drive_until(
    eventloop: &mut EventLoop,
    pending: &mut VecDeque<Delivery>,
    ack: Ack,
    bound: Duration,
) -> std::result::Result<(), String> {
    loop {
        let event = match timeout(bound, eventloop.poll()).await {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => return Err(format!("no acknowledgement within {:?}", bound)),
        };

        match (event, &ack) {
            (Event::Incoming(Packet::Publish(publish)), _) => {
                pending.push_back(Delivery {
                    destination: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                });
            }
            (Event::Incoming(Packet::ConnAck(_)), Ack::ConnAck) => return Ok(()),
            (Event::Incoming(Packet::SubAck(suback)), Ack::SubAck) => {
                if suback
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure))
                {
                    return Err("subscription rejected by broker".to_string());
                }
                return Ok(());
            }
            (Event::Incoming(Packet::PubAck(_)), Ack::PubAck) => return Ok(()),
            (Event::Incoming(packet), _) => {
                debug!(?packet, "Received MQTT packet");
            }
            (Event::Outgoing(_), _) => {}
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connection = None;

        let (client, mut eventloop) = AsyncClient::new(self.settings.options(), self.settings.capacity);
        drive_until(
            &mut eventloop,
            &mut self.pending,
            Ack::ConnAck,
            self.settings.ack_timeout,
        )
        .await
        .map_err(BusError::Connect)?;

        info!(
            broker = %self.describe(),
            client_id = %self.settings.client_id,
            "MQTT connected"
        );

        self.connection = Some((client, eventloop));
        Ok(())
    }

    async fn subscribe(&mut self, destination: &str) -> Result<()> {
        let (client, eventloop) = self.connection.as_mut().ok_or(BusError::NotConnected)?;

        let subscribe_error = |reason: String| BusError::Subscribe {
            destination: destination.to_string(),
            reason,
        };

        client
            .subscribe(destination, QoS::AtLeastOnce)
            .await
            .map_err(|e| subscribe_error(e.to_string()))?;

        let acked = drive_until(
            eventloop,
            &mut self.pending,
            Ack::SubAck,
            self.settings.ack_timeout,
        )
        .await;

        if let Err(reason) = acked {
            self.connection = None;
            return Err(subscribe_error(reason));
        }

        debug!(destination = %destination, "MQTT subscribed");
        Ok(())
    }

    async fn publish(&mut self, destination: &str, payload: Vec<u8>) -> Result<()> {
        let publish_error = |reason: String| BusError::Publish {
            destination: destination.to_string(),
            reason,
        };

        let (client, eventloop) = self
            .connection
            .as_mut()
            .ok_or_else(|| publish_error("not connected".to_string()))?;

        client
            .publish(destination, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| publish_error(e.to_string()))?;

        let acked = drive_until(
            eventloop,
            &mut self.pending,
            Ack::PubAck,
            self.settings.ack_timeout,
        )
        .await;

        if let Err(reason) = acked {
            self.connection = None;
            return Err(publish_error(reason));
        }

        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        if let Some(delivery) = self.pending.pop_front() {
            return TransportEvent::Message(delivery);
        }

        let Some((_, eventloop)) = self.connection.as_mut() else {
            return TransportEvent::Disconnected("not connected".to_string());
        };

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return TransportEvent::Message(Delivery {
                        destination: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.connection = None;
                    return TransportEvent::Disconnected("broker sent DISCONNECT".to_string());
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "MQTT connection error");
                    self.connection = None;
                    return TransportEvent::Disconnected(e.to_string());
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some((client, mut eventloop)) = self.connection.take() {
            if client.disconnect().await.is_ok() {
                // 把 DISCONNECT 包发出去
                let _ = timeout(Duration::from_millis(500), eventloop.poll()).await;
            }
            info!(broker = %self.describe(), "MQTT disconnected");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }
}
