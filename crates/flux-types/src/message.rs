use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::Alert;

/// 消息头
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeaders {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(rename = "correlation-id")]
    pub correlation_id: String,
    pub persistent: bool,
    /// 过期时间（epoch 毫秒）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

impl MessageHeaders {
    /// 按告警生成消息头，关联 ID 即告警 ID
    pub fn for_alert(alert: &Alert) -> Self {
        Self {
            message_type: alert.alert_type.clone(),
            correlation_id: alert.id.to_string(),
            persistent: true,
            expires: None,
        }
    }

    /// 设置过期时间：创建时间 + 过期窗口
    pub fn expiring(mut self, created: DateTime<Utc>, window: Duration) -> Self {
        self.expires = Some((created + window).timestamp_millis());
        self
    }
}

/// 总线消息信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub headers: MessageHeaders,
    pub payload: serde_json::Value,
}

impl BusMessage {
    pub fn new(headers: MessageHeaders, payload: serde_json::Value) -> Self {
        Self { headers, payload }
    }

    pub fn from_alert(alert: &Alert, headers: MessageHeaders) -> serde_json::Result<Self> {
        Ok(Self {
            headers,
            payload: serde_json::to_value(alert)?,
        })
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// 解析负载中的告警
    pub fn alert(&self) -> serde_json::Result<Alert> {
        Alert::deserialize(&self.payload)
    }
}
