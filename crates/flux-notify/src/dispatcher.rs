use std::sync::Arc;
use tracing::{debug, error, info, warn};

use flux_bus::{BusClient, BusError, Transport};
use flux_ratelimit::TokenBucket;
use flux_types::{Alert, BusMessage};

use crate::error::ParseError;
use crate::filter::{Decision, NotificationFilter};
use crate::notifier::Notifier;
use crate::render::Renderer;

/// 单条消息的处理结果，每种结果都视为已处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Malformed,
    Suppressed,
    RateLimited,
    DeliveryFailed,
    Delivered,
}

/// 处理统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub malformed: u64,
    pub suppressed: u64,
    pub rate_limited: u64,
    pub delivery_failed: u64,
    pub delivered: u64,
}

impl DispatchStats {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Malformed => self.malformed += 1,
            Outcome::Suppressed => self.suppressed += 1,
            Outcome::RateLimited => self.rate_limited += 1,
            Outcome::DeliveryFailed => self.delivery_failed += 1,
            Outcome::Delivered => self.delivered += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.malformed + self.suppressed + self.rate_limited + self.delivery_failed + self.delivered
    }
}

/// 解析通知负载：优先按消息信封解析，也接受直接的告警 JSON
pub fn parse_alert(payload: &[u8]) -> Result<Alert, ParseError> {
    match BusMessage::from_slice(payload) {
        Ok(message) => message.alert().map_err(|e| ParseError(e.to_string())),
        Err(envelope_err) => serde_json::from_slice::<Alert>(payload)
            .map_err(|e| ParseError(format!("{} (as envelope: {})", e, envelope_err))),
    }
}

/// 通知分发器
///
/// 解析 → 过滤 → 限流 → 渲染 → 发送，每条消息最多发送一次。
pub struct Dispatcher {
    filter: NotificationFilter,
    bucket: Arc<TokenBucket>,
    renderer: Renderer,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(bucket: Arc<TokenBucket>, renderer: Renderer, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            filter: NotificationFilter::default(),
            bucket,
            renderer,
            notifier,
        }
    }

    pub fn with_filter(mut self, filter: NotificationFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> &NotificationFilter {
        &self.filter
    }

    /// 处理一条消息
    pub async fn handle(&self, payload: &[u8]) -> Outcome {
        debug!(bytes = payload.len(), "Received notification");

        let alert = match parse_alert(payload) {
            Ok(alert) => alert,
            Err(e) => {
                warn!(error = %e, "Dropping malformed notification");
                return Outcome::Malformed;
            }
        };
        let alert_id = alert.log_id();

        info!(
            alert_id = %alert_id,
            status = %alert.status,
            summary = %alert.summary,
            "Received alert"
        );

        if self.filter.decide(alert.previous_severity, alert.severity) == Decision::Suppress {
            let rule = self
                .filter
                .matching_rule(alert.previous_severity, alert.severity)
                .map(|rule| rule.name().to_string())
                .unwrap_or_default();
            info!(
                alert_id = %alert_id,
                previous = %alert.previous_severity,
                severity = %alert.severity,
                rule = %rule,
                "Skipping notification"
            );
            return Outcome::Suppressed;
        }

        if !self.bucket.try_consume() {
            warn!(alert_id = %alert_id, "No tokens left, rate limiting this alert");
            return Outcome::RateLimited;
        }
        debug!(alert_id = %alert_id, tokens = self.bucket.available(), "Token taken");

        let message = match self.renderer.render(&alert) {
            Ok(message) => message,
            Err(e) => {
                error!(alert_id = %alert_id, error = %e, "Failed to render notification");
                return Outcome::DeliveryFailed;
            }
        };

        info!(
            alert_id = %alert_id,
            notifier = self.notifier.name(),
            recipients = %self.notifier.recipients(),
            "Sending notification"
        );

        match self.notifier.send(&message).await {
            Ok(result) if result.success => {
                info!(alert_id = %alert_id, notifier = self.notifier.name(), "Notification sent");
                Outcome::Delivered
            }
            Ok(result) => {
                error!(alert_id = %alert_id, notifier = self.notifier.name(), reason = %result.message, "Notification failed");
                Outcome::DeliveryFailed
            }
            Err(e) => {
                error!(alert_id = %alert_id, notifier = self.notifier.name(), error = %e, "Notification error");
                Outcome::DeliveryFailed
            }
        }
    }

    /// 订阅目的地并逐条处理消息，直到收到关闭信号
    ///
    /// 重连次数耗尽时返回错误。
    pub async fn run<T: Transport>(
        &self,
        bus: &mut BusClient<T>,
        destination: &str,
    ) -> Result<DispatchStats, BusError> {
        let mut stats = DispatchStats::default();

        match bus.subscribe(destination).await {
            Ok(()) => {}
            Err(BusError::Cancelled) => return Ok(stats),
            Err(e) => return Err(e),
        }
        info!(destination = %destination, "Dispatcher listening");

        while let Some(delivery) = bus.recv().await? {
            let outcome = self.handle(&delivery.payload).await;
            stats.record(outcome);
        }

        info!(
            delivered = stats.delivered,
            suppressed = stats.suppressed,
            rate_limited = stats.rate_limited,
            failed = stats.delivery_failed,
            malformed = stats.malformed,
            "Dispatcher stopped"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::{MessageHeaders, Severity};
    use serde_json::json;

    fn raw_alert() -> serde_json::Value {
        json!({
            "id": "5f0c2a52-9d2c-4d2e-8d43-1f3f0fa3b0f1",
            "resource": "web01",
            "event": "HostAvail",
            "severity": "CRITICAL",
            "previousSeverity": "NORMAL",
            "status": "OPEN",
            "summary": "PROD - CRITICAL HostAvail is down on Web web01",
            "createTime": "2013-03-04T10:11:12.345Z",
            "type": "exceptionAlert"
        })
    }

    #[test]
    fn test_parse_envelope_and_bare_alert() {
        let bare = serde_json::to_vec(&raw_alert()).unwrap();
        let alert = parse_alert(&bare).unwrap();
        assert_eq!(alert.severity, Severity::Critical);

        let headers = MessageHeaders::for_alert(&alert);
        let envelope = BusMessage::from_alert(&alert, headers).unwrap().to_bytes().unwrap();
        assert_eq!(parse_alert(&envelope).unwrap().id, alert.id);
    }

    #[test]
    fn test_parse_rejects_incomplete_alert() {
        let mut raw = raw_alert();
        raw.as_object_mut().unwrap().remove("previousSeverity");
        assert!(parse_alert(&serde_json::to_vec(&raw).unwrap()).is_err());
        assert!(parse_alert(b"{").is_err());
    }

    #[test]
    fn test_stats() {
        let mut stats = DispatchStats::default();
        for outcome in [Outcome::Delivered, Outcome::Suppressed, Outcome::Delivered, Outcome::Malformed] {
            stats.record(outcome);
        }
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.total(), 4);
    }
}
