use chrono::{DateTime, Utc};
use uuid::Uuid;

use flux_types::{Alert, AlertStatus, Severity};

use crate::classify::{Classification, ClassificationError, Classifier};
use crate::diff::TransitionEvent;
use crate::snapshot::InstanceInfo;

pub const DEFAULT_TIMEOUT: u64 = 86400;
pub const STATUS_ALERT: &str = "statusAlert";
pub const EXCEPTION_ALERT: &str = "exceptionAlert";
pub const EC2_GROUP: &str = "AWS/EC2";
pub const EC2_SERVICE: &str = "EC2";

/// 外部检查（插件或命令行参数）的结果
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub resource: String,
    pub event: String,
    pub group: String,
    pub value: String,
    pub severity: Severity,
    pub environment: Vec<String>,
    pub service: Vec<String>,
    pub tags: Vec<String>,
    pub text: String,
    pub timeout: u64,
    /// 插件命令行；没有运行插件时为 `n/a`
    pub threshold_info: String,
}

/// 告警构造器
pub struct AlertFactory {
    origin: String,
    timeout: u64,
    classifier: Classifier,
}

impl AlertFactory {
    pub fn new(program: &str, hostname: &str) -> Self {
        Self {
            origin: format!("{}/{}", program, hostname),
            timeout: DEFAULT_TIMEOUT,
            classifier: Classifier::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// 分类并构造告警
    pub fn from_transition(
        &self,
        transition: &TransitionEvent,
        instance: &InstanceInfo,
    ) -> Result<Alert, ClassificationError> {
        let classification = self.classifier.classify(transition)?;
        Ok(self.build(transition, &classification, instance))
    }

    /// 由状态变化构造告警，每次都生成新的随机 ID
    pub fn build(
        &self,
        transition: &TransitionEvent,
        classification: &Classification,
        instance: &InstanceInfo,
    ) -> Alert {
        let event = transition.check.event();
        let value = transition.new.to_string();
        let environment = vec![instance.stage.clone()];
        let service = vec![EC2_SERVICE.to_string()];
        let severity = classification.severity;

        Alert {
            id: Uuid::new_v4(),
            summary: Alert::summary_for(
                &environment,
                severity,
                event,
                &value,
                &service,
                &transition.resource,
            ),
            resource: transition.resource.clone(),
            event: event.to_string(),
            group: EC2_GROUP.to_string(),
            value,
            severity,
            severity_code: severity.rank(),
            previous_severity: self.classifier.severity_of(transition.check, &transition.old),
            status: AlertStatus::Open,
            environment,
            service,
            text: classification.text.clone(),
            alert_type: STATUS_ALERT.to_string(),
            tags: instance.tags.clone(),
            create_time: now_millis(),
            origin: self.origin.clone(),
            threshold_info: "n/a".to_string(),
            timeout: self.timeout,
            correlated_events: Vec::new(),
            last_receive_id: None,
            duplicate_count: None,
            more_info: None,
            graphs: Vec::new(),
        }
    }

    /// 由外部检查结果构造告警
    pub fn from_check(&self, check: CheckResult) -> Alert {
        let severity = check.severity;
        Alert {
            id: Uuid::new_v4(),
            summary: Alert::summary_for(
                &check.environment,
                severity,
                &check.event,
                &check.value,
                &check.service,
                &check.resource,
            ),
            resource: check.resource,
            event: check.event,
            group: check.group,
            value: check.value,
            severity,
            severity_code: severity.rank(),
            previous_severity: Severity::Unknown,
            status: AlertStatus::Open,
            environment: check.environment,
            service: check.service,
            text: check.text,
            alert_type: EXCEPTION_ALERT.to_string(),
            tags: check.tags,
            create_time: now_millis(),
            origin: self.origin.clone(),
            threshold_info: check.threshold_info,
            timeout: check.timeout,
            correlated_events: Vec::new(),
            last_receive_id: None,
            duplicate_count: None,
            more_info: None,
            graphs: Vec::new(),
        }
    }
}

/// 当前 UTC 时间，截断到毫秒
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
