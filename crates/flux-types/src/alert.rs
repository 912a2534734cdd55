use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::severity::Severity;

/// 告警状态（由告警服务维护）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Open,
    Ack,
    Closed,
    Expired,
    #[serde(other)]
    Unknown,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "OPEN",
            AlertStatus::Ack => "ACK",
            AlertStatus::Closed => "CLOSED",
            AlertStatus::Expired => "EXPIRED",
            AlertStatus::Unknown => "UNKNOWN",
        }
    }
}

impl Default for AlertStatus {
    fn default() -> Self {
        AlertStatus::Open
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 告警记录，字段与线上 JSON 一一对应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub resource: String,
    pub event: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub value: String,
    pub severity: Severity,
    #[serde(default)]
    pub severity_code: u8,
    pub previous_severity: Severity,
    pub status: AlertStatus,
    #[serde(default)]
    pub environment: Vec<String>,
    #[serde(default)]
    pub service: Vec<String>,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub alert_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub summary: String,
    #[serde(with = "timestamp")]
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub threshold_info: String,
    /// 超时时间（秒）
    #[serde(default)]
    pub timeout: u64,
    #[serde(default, deserialize_with = "correlated::deserialize")]
    pub correlated_events: Vec<String>,

    // 以下字段由告警服务补充，通知渲染时使用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_receive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_info: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub graphs: Vec<String>,
}

impl Alert {
    /// 告警摘要：`{环境} - {级别} {事件} is {值} on {服务} {资源}`
    pub fn summary_for(
        environment: &[String],
        severity: Severity,
        event: &str,
        value: &str,
        service: &[String],
        resource: &str,
    ) -> String {
        format!(
            "{} - {} {} is {} on {} {}",
            environment.join(","),
            severity,
            event,
            value,
            service.join(","),
            resource
        )
    }

    /// 日志中引用告警时使用的 ID（优先使用服务端的 lastReceiveId）
    pub fn log_id(&self) -> String {
        self.last_receive_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    /// 格式化后的创建时间
    pub fn create_time_string(&self) -> String {
        timestamp::format(&self.create_time)
    }
}

/// 关联事件：接受列表，也接受逗号分隔的字符串（空串即为空列表）
mod correlated {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let events = match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::List(events)) => events,
            Some(Raw::Text(text)) => text
                .split(',')
                .map(str::trim)
                .filter(|event| !event.is_empty())
                .map(String::from)
                .collect(),
            None => Vec::new(),
        };
        Ok(events)
    }
}

/// 毫秒精度、以字面 `Z` 结尾的 ISO-8601 时间戳
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    pub fn format(time: &DateTime<Utc>) -> String {
        time.format(FORMAT).to_string()
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.fZ")
            .map(|naive| naive.and_utc())
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|t| t.with_timezone(&Utc))
            })
    }

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid createTime: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> Alert {
        let create_time = Utc.with_ymd_and_hms(2013, 3, 4, 10, 11, 12).unwrap()
            + chrono::Duration::microseconds(345_678);
        Alert {
            id: Uuid::new_v4(),
            resource: "i-1234".to_string(),
            event: "Ec2InstanceState".to_string(),
            group: "AWS/EC2".to_string(),
            value: "running".to_string(),
            severity: Severity::Normal,
            severity_code: Severity::Normal.rank(),
            previous_severity: Severity::Warning,
            status: AlertStatus::Open,
            environment: vec!["PROD".to_string()],
            service: vec!["EC2".to_string()],
            text: "Instance was pending now it is running".to_string(),
            alert_type: "statusAlert".to_string(),
            tags: vec!["cloud:AWS/EC2".to_string()],
            summary: "PROD - NORMAL Ec2InstanceState is running on EC2 i-1234".to_string(),
            create_time,
            origin: "alert-aws/host".to_string(),
            threshold_info: "n/a".to_string(),
            timeout: 86400,
            correlated_events: Vec::new(),
            last_receive_id: None,
            duplicate_count: None,
            more_info: None,
            graphs: Vec::new(),
        }
    }

    #[test]
    fn test_create_time_has_millisecond_precision() {
        let alert = sample();
        assert_eq!(alert.create_time_string(), "2013-03-04T10:11:12.345Z");

        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["createTime"], "2013-03-04T10:11:12.345Z");
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        for key in [
            "id", "resource", "event", "group", "value", "severity", "severityCode",
            "previousSeverity", "status", "environment", "service", "text", "type", "tags",
            "summary", "createTime", "origin", "thresholdInfo", "timeout", "correlatedEvents",
        ] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["severity"], "NORMAL");
        assert_eq!(value["previousSeverity"], "WARNING");
        assert_eq!(value["timeout"], 86400);
        assert!(value.get("graphs").is_none());
    }

    #[test]
    fn test_parse_minimal_server_record() {
        let raw = json!({
            "id": "5f0c2a52-9d2c-4d2e-8d43-1f3f0fa3b0f1",
            "resource": "web01",
            "event": "HostAvail",
            "severity": "critical",
            "previousSeverity": "NORMAL",
            "status": "OPEN",
            "summary": "PROD - CRITICAL HostAvail is down on Web web01",
            "createTime": "2013-03-04T10:11:12.345Z",
            "lastReceiveId": "abc",
            "duplicateCount": 3
        });
        let alert: Alert = serde_json::from_value(raw).unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.status, AlertStatus::Open);
        assert_eq!(alert.log_id(), "abc");
        assert_eq!(alert.duplicate_count, Some(3));
        assert!(alert.environment.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let raw = json!({
            "id": "5f0c2a52-9d2c-4d2e-8d43-1f3f0fa3b0f1",
            "resource": "web01",
            "event": "HostAvail",
            "severity": "critical",
            "status": "OPEN",
            "summary": "s",
            "createTime": "2013-03-04T10:11:12.345Z"
        });
        assert!(serde_json::from_value::<Alert>(raw).is_err());
    }

    #[test]
    fn test_correlated_events_accepts_string_or_list() {
        let mut raw = serde_json::to_value(sample()).unwrap();

        raw["correlatedEvents"] = json!("");
        let alert: Alert = serde_json::from_value(raw.clone()).unwrap();
        assert!(alert.correlated_events.is_empty());

        raw["correlatedEvents"] = json!("NodeDown, NodeUp");
        let alert: Alert = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(alert.correlated_events, vec!["NodeDown", "NodeUp"]);

        raw["correlatedEvents"] = json!(["NodeDown"]);
        let alert: Alert = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(alert.correlated_events, vec!["NodeDown"]);

        raw["correlatedEvents"] = json!(null);
        let alert: Alert = serde_json::from_value(raw.clone()).unwrap();
        assert!(alert.correlated_events.is_empty());

        raw.as_object_mut().unwrap().remove("correlatedEvents");
        let alert: Alert = serde_json::from_value(raw).unwrap();
        assert!(alert.correlated_events.is_empty());
    }

    #[test]
    fn test_unrecognised_severity_maps_to_unknown() {
        let mut raw = serde_json::to_value(sample()).unwrap();
        raw["severity"] = json!("BOGUS");
        raw["previousSeverity"] = json!("");

        let alert: Alert = serde_json::from_value(raw).unwrap();
        assert_eq!(alert.severity, Severity::Unknown);
        assert_eq!(alert.previous_severity, Severity::Unknown);
    }

    #[test]
    fn test_unrecognised_status_maps_to_unknown() {
        let status: AlertStatus = serde_json::from_str("\"SHELVED\"").unwrap();
        assert_eq!(status, AlertStatus::Unknown);
    }

    #[test]
    fn test_summary_template() {
        let summary = Alert::summary_for(
            &["PROD".to_string(), "REL".to_string()],
            Severity::Warning,
            "Ec2StatusChecks",
            "ok:impaired",
            &["EC2".to_string()],
            "i-1",
        );
        assert_eq!(summary, "PROD,REL - WARNING Ec2StatusChecks is ok:impaired on EC2 i-1");
    }
}
