use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use flux_types::AlertStatus;

/// 告警服务错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("alert store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("alert store rejected update of {id}: {message}")]
    Rejected { id: String, message: String },

    #[error("unexpected alert store response: {0}")]
    Malformed(String),
}

/// 告警服务中的告警（只取对账需要的字段）
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredAlert {
    pub id: String,
    pub resource: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub status: AlertStatus,
}

/// 告警服务 trait
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// 列出本进程关心的告警
    async fn list(&self) -> Result<Vec<StoredAlert>, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn acknowledge(&self, id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: ApiResponse,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    alerts: Option<AlertList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertList {
    #[serde(default)]
    alert_details: Vec<StoredAlert>,
}

/// HTTP 告警服务客户端
pub struct HttpAlertStore {
    base_url: String,
    filter: String,
    client: reqwest::Client,
}

impl HttpAlertStore {
    pub const DEFAULT_FILTER: &'static str = "tags=cloud:AWS/EC2";

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            filter: Self::DEFAULT_FILTER.to_string(),
            client,
        })
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    fn list_url(&self) -> String {
        format!("{}/alerts?{}", self.base_url, self.filter)
    }

    fn alert_url(&self, id: &str) -> String {
        format!("{}/alerts/alert/{}", self.base_url, id)
    }

    async fn update(&self, id: &str, body: serde_json::Value) -> Result<(), StoreError> {
        let url = self.alert_url(id);
        debug!(alert_id = %id, url = %url, body = %body, "Updating alert");

        let envelope: Envelope = self.client.post(&url).json(&body).send().await?.json().await?;
        check_status(id, envelope.response)
    }
}

fn check_status(id: &str, response: ApiResponse) -> Result<(), StoreError> {
    if response.status.as_deref() == Some("ok") {
        Ok(())
    } else {
        Err(StoreError::Rejected {
            id: id.to_string(),
            message: response
                .message
                .unwrap_or_else(|| "no message".to_string()),
        })
    }
}

fn alert_details(response: ApiResponse) -> Result<Vec<StoredAlert>, StoreError> {
    response
        .alerts
        .map(|list| list.alert_details)
        .ok_or_else(|| StoreError::Malformed("missing alerts.alertDetails".to_string()))
}

#[async_trait]
impl AlertStore for HttpAlertStore {
    async fn list(&self) -> Result<Vec<StoredAlert>, StoreError> {
        let url = self.list_url();
        debug!(url = %url, "Listing alerts");

        let envelope: Envelope = self.client.get(&url).send().await?.json().await?;
        alert_details(envelope.response)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.update(id, json!({"_method": "delete"})).await
    }

    async fn acknowledge(&self, id: &str) -> Result<(), StoreError> {
        self.update(id, json!({"status": "ACK"})).await
    }
}
