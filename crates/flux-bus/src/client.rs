use tracing::{debug, error, info, warn};

use flux_shutdown::ShutdownListener;
use flux_types::{Alert, BusMessage, MessageHeaders};

use crate::error::{BusError, Result};
use crate::policy::ReconnectPolicy;
use crate::state::{ConnectionEvent, ConnectionStatus};
use crate::transport::{Delivery, Transport, TransportEvent};

/// 消息总线客户端
///
/// 在传输层之上负责：
/// - 有界重连（指数退避，次数耗尽后返回 [`BusError::ReconnectExhausted`]）
/// - 重连后自动恢复订阅
/// - 重连等待期间响应关闭信号
pub struct BusClient<T: Transport> {
    transport: T,
    policy: ReconnectPolicy,
    status: ConnectionStatus,
    subscription: Option<String>,
    shutdown: ShutdownListener,
}

impl<T: Transport> BusClient<T> {
    pub fn new(transport: T, policy: ReconnectPolicy) -> Self {
        Self {
            transport,
            policy,
            status: ConnectionStatus::Disconnected,
            subscription: None,
            shutdown: ShutdownListener::never(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownListener) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    fn transition(&mut self, event: ConnectionEvent) {
        let next = self.status.on(event);
        if next != self.status {
            debug!(from = ?self.status, to = ?next, event = ?event, "Bus connection state changed");
        }
        self.status = next;
    }

    /// 连接（含重连）；成功后若已登记订阅则重新订阅
    pub async fn connect(&mut self) -> Result<()> {
        if self.shutdown.is_shutdown() {
            return Err(BusError::Cancelled);
        }

        let broker = self.transport.describe();
        let attempts = self.policy.max_attempts;
        self.transition(ConnectionEvent::Connect);

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.policy.delay(attempt - 1);
                debug!(broker = %broker, attempt, delay = ?delay, "Waiting before reconnect");

                let cancelled = tokio::select! {
                    biased;
                    _ = self.shutdown.recv() => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if cancelled {
                    info!(broker = %broker, "Reconnect cancelled by shutdown");
                    self.transition(ConnectionEvent::Closed);
                    return Err(BusError::Cancelled);
                }
            }

            if let Err(e) = self.transport.connect().await {
                warn!(broker = %broker, attempt = attempt + 1, error = %e, "Bus connect failed");
                continue;
            }
            self.transition(ConnectionEvent::Connected);
            info!(broker = %broker, attempt = attempt + 1, "Connected to message bus");

            if let Some(destination) = self.subscription.clone() {
                match self.transport.subscribe(&destination).await {
                    Ok(()) => {
                        self.transition(ConnectionEvent::Subscribed);
                        info!(destination = %destination, "Subscribed to destination");
                    }
                    Err(e) => {
                        warn!(destination = %destination, error = %e, "Subscribe after connect failed");
                        self.transition(ConnectionEvent::Lost);
                        continue;
                    }
                }
            }

            return Ok(());
        }

        error!(broker = %broker, attempts, "Giving up on message bus");
        self.transition(ConnectionEvent::GaveUp);
        Err(BusError::ReconnectExhausted { attempts })
    }

    /// 订阅目的地；订阅会在每次重连后恢复
    pub async fn subscribe(&mut self, destination: &str) -> Result<()> {
        self.subscription = Some(destination.to_string());

        if !self.status.is_connected() {
            return self.connect().await;
        }

        match self.transport.subscribe(destination).await {
            Ok(()) => {
                self.transition(ConnectionEvent::Subscribed);
                info!(destination = %destination, "Subscribed to destination");
                Ok(())
            }
            Err(e) => {
                warn!(destination = %destination, error = %e, "Subscribe failed, reconnecting");
                self.transition(ConnectionEvent::Lost);
                self.connect().await
            }
        }
    }

    /// 发布告警
    pub async fn publish(
        &mut self,
        destination: &str,
        alert: &Alert,
        headers: MessageHeaders,
    ) -> Result<()> {
        let message = BusMessage::from_alert(alert, headers)?;
        self.publish_message(destination, &message).await?;

        info!(
            alert_id = %alert.id,
            resource = %alert.resource,
            event = %alert.event,
            severity = %alert.severity,
            destination = %destination,
            "Alert published"
        );
        Ok(())
    }

    /// 发布消息信封；连接断开时重连并重试一次
    pub async fn publish_message(&mut self, destination: &str, message: &BusMessage) -> Result<()> {
        let payload = message.to_bytes()?;

        if !self.status.is_connected() {
            self.connect().await?;
        }

        match self.transport.publish(destination, payload.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(destination = %destination, error = %e, "Publish failed, reconnecting");
                self.transition(ConnectionEvent::Lost);
                self.connect().await?;
                self.transport.publish(destination, payload).await
            }
        }
    }

    /// 接收下一条消息
    ///
    /// 连接断开时自动重连并恢复订阅；收到关闭信号时返回 `Ok(None)`。
    /// 重连次数耗尽时返回错误。
    pub async fn recv(&mut self) -> Result<Option<Delivery>> {
        if self.subscription.is_none() {
            return Err(BusError::NotConnected);
        }

        loop {
            if !self.status.can_process_messages() {
                match self.connect().await {
                    Ok(()) => {}
                    Err(BusError::Cancelled) => return Ok(None),
                    Err(e) => return Err(e),
                }
            }

            let event = tokio::select! {
                biased;
                _ = self.shutdown.recv() => None,
                event = self.transport.next_event() => Some(event),
            };

            match event {
                None => return Ok(None),
                Some(TransportEvent::Message(delivery)) => return Ok(Some(delivery)),
                Some(TransportEvent::Disconnected(reason)) => {
                    warn!(broker = %self.transport.describe(), reason = %reason, "Lost connection to message bus");
                    self.transition(ConnectionEvent::Lost);
                }
            }
        }
    }

    /// 断开连接
    pub async fn disconnect(&mut self) -> Result<()> {
        let result = self.transport.disconnect().await;
        self.transition(ConnectionEvent::Closed);
        info!(broker = %self.transport.describe(), "Disconnected from message bus");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBroker;
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_millis(10), 1.0, Duration::from_millis(50), max_attempts)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_until_success() {
        let broker = MemoryBroker::default();
        broker.fail_next_connects(3);

        let mut client = BusClient::new(broker.transport(), fast_policy(5));
        client.connect().await.unwrap();

        assert_eq!(broker.connect_attempts(), 4);
        assert_eq!(client.status(), ConnectionStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_gives_up_after_max_attempts() {
        let broker = MemoryBroker::default();
        broker.set_available(false);

        let mut client = BusClient::new(broker.transport(), fast_policy(3));
        let err = client.connect().await.unwrap_err();

        assert!(matches!(err, BusError::ReconnectExhausted { attempts: 3 }));
        assert!(err.is_fatal());
        assert_eq!(broker.connect_attempts(), 3);
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_marks_subscribed() {
        let broker = MemoryBroker::default();
        let mut client = BusClient::new(broker.transport(), fast_policy(1));

        client.subscribe("alerta/topic/notify").await.unwrap();
        assert_eq!(client.status(), ConnectionStatus::Subscribed);
        assert_eq!(client.subscription(), Some("alerta/topic/notify"));
    }

    #[tokio::test]
    async fn test_recv_without_subscription_is_an_error() {
        let broker = MemoryBroker::default();
        let mut client = BusClient::new(broker.transport(), fast_policy(1));
        assert!(matches!(client.recv().await, Err(BusError::NotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_closes() {
        let broker = MemoryBroker::default();
        let mut client = BusClient::new(broker.transport(), fast_policy(1));
        client.subscribe("alerta/topic/notify").await.unwrap();

        client.disconnect().await.unwrap();
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }
}
