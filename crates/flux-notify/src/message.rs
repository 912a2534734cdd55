use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flux_types::{Alert, Severity};

/// 内嵌图表（HTML 中以 `cid:` 引用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineGraph {
    pub content_id: String,
    pub url: String,
}

/// 通知消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyMessage {
    /// 标题：`[{status}] {summary}`
    pub subject: String,

    /// 纯文本正文
    pub text: String,

    /// HTML 正文
    pub html: String,

    /// 告警 ID（用于日志）
    pub alert_id: String,

    pub severity: Severity,

    /// 告警创建时间
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub graphs: Vec<InlineGraph>,
}

impl NotifyMessage {
    pub fn new(alert: &Alert, subject: impl Into<String>, text: String, html: String) -> Self {
        Self {
            subject: subject.into(),
            text,
            html,
            alert_id: alert.log_id(),
            severity: alert.severity,
            timestamp: alert.create_time,
            graphs: Vec::new(),
        }
    }

    pub fn with_graphs(mut self, graphs: Vec<InlineGraph>) -> Self {
        self.graphs = graphs;
        self
    }
}
