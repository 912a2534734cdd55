use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 数据源标识（账号 × 区域）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub account: String,
    pub region: String,
}

impl SourceId {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.region)
    }
}

/// 数据源错误（单个数据源的临时故障）
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source {source_id} request failed: {reason}")]
    Request { source_id: String, reason: String },

    #[error("source {source_id} returned HTTP {status}")]
    Status { source_id: String, status: u16 },

    #[error("source {source_id} returned an invalid body: {reason}")]
    Decode { source_id: String, reason: String },
}

impl SourceError {
    pub fn request(source: &SourceId, reason: impl Into<String>) -> Self {
        SourceError::Request {
            source_id: source.to_string(),
            reason: reason.into(),
        }
    }
}

/// 实例列表条目
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstance {
    pub id: String,
    #[serde(default)]
    pub private_dns_name: String,
    pub state: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// 状态检查条目
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatus {
    pub id: String,
    pub system_status: String,
    pub instance_status: String,
}

/// 云实例数据源 trait
#[async_trait]
pub trait InstanceSource: Send + Sync {
    fn id(&self) -> &SourceId;

    /// 列出全部实例
    async fn instances(&self) -> Result<Vec<RawInstance>, SourceError>;

    /// 查询系统/实例状态检查
    async fn instance_status(&self) -> Result<Vec<RawStatus>, SourceError>;
}

/// HTTP 数据源
///
/// 每个 (账号, 区域) 对应一个代理服务地址，接口如下：
///
/// `GET {url}/instances` 返回实例列表（[`RawInstance`]）：
///
/// ```json
/// [
///   {
///     "id": "i-0a1b2c3d",
///     "privateDnsName": "ip-10-0-0-1.eu-west-1.compute.internal",
///     "state": "running",
///     "tags": {"Stage": "PROD", "Role": "web"}
///   }
/// ]
/// ```
///
/// `privateDnsName` 和 `tags` 可省略；没有标签的实例会被忽略。
///
/// `GET {url}/instance-status` 返回状态检查（[`RawStatus`]）：
///
/// ```json
/// [{"id": "i-0a1b2c3d", "systemStatus": "ok", "instanceStatus": "impaired"}]
/// ```
///
/// 非 2xx 响应返回 [`SourceError::Status`]，无法解析的正文返回 [`SourceError::Decode`]。
pub struct HttpInstanceSource {
    id: SourceId,
    base_url: String,
    client: reqwest::Client,
}

impl HttpInstanceSource {
    pub fn new(id: SourceId, base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::request(&id, e.to_string()))?;

        Ok(Self {
            id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(source = %self.id, url = %url, "Fetching instance data");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SourceError::request(&self.id, e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                source_id: self.id.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| SourceError::Decode {
            source_id: self.id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl InstanceSource for HttpInstanceSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn instances(&self) -> Result<Vec<RawInstance>, SourceError> {
        self.get("instances").await
    }

    async fn instance_status(&self) -> Result<Vec<RawStatus>, SourceError> {
        self.get("instance-status").await
    }
}
