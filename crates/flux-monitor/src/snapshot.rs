use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

use crate::source::{RawInstance, RawStatus, SourceError, SourceId};

/// 被跟踪的检查项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Check {
    /// 实例状态：pending | running | shutting-down | terminated | stopping | stopped
    State,
    /// 系统/实例状态检查，形如 `ok:impaired`
    Status,
}

impl Check {
    pub const ALL: [Check; 2] = [Check::State, Check::Status];

    pub fn name(&self) -> &'static str {
        match self {
            Check::State => "state",
            Check::Status => "status",
        }
    }

    /// 对应的告警事件名
    pub fn event(&self) -> &'static str {
        match self {
            Check::State => "Ec2InstanceState",
            Check::Status => "Ec2StatusChecks",
        }
    }

    pub fn is_own_event(event: &str) -> bool {
        Self::ALL.iter().any(|check| check.event() == event)
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 检查值
///
/// 复合值（`ok:impaired`）在构建快照时解析为 `Pair`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckValue {
    /// 从未观测到
    Unknown,
    Single(String),
    Pair(String, String),
}

impl CheckValue {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((first, second)) => CheckValue::Pair(first.to_string(), second.to_string()),
            None => CheckValue::Single(raw.to_string()),
        }
    }

    pub fn pair(first: impl Into<String>, second: impl Into<String>) -> Self {
        CheckValue::Pair(first.into(), second.into())
    }

    pub fn single(value: impl Into<String>) -> Self {
        CheckValue::Single(value.into())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, CheckValue::Unknown)
    }
}

impl fmt::Display for CheckValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckValue::Unknown => f.write_str("unknown"),
            CheckValue::Single(value) => f.write_str(value),
            CheckValue::Pair(first, second) => write!(f, "{}:{}", first, second),
        }
    }
}

/// 单个实例的观测结果
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    pub checks: BTreeMap<Check, CheckValue>,
    pub stage: String,
    pub role: String,
    pub tags: Vec<String>,
    pub source: SourceId,
}

impl InstanceInfo {
    pub fn new(source: SourceId, stage: impl Into<String>, role: impl Into<String>) -> Self {
        let stage = stage.into();
        let role = role.into();
        let tags = vec![
            "os:Linux".to_string(),
            format!("role:{}", role),
            format!("datacentre:{}", source.region),
            "virtual:xen".to_string(),
            "cloud:AWS/EC2".to_string(),
            format!("account:{}", source.account),
            format!("cluster:{}_{}", role, source.region),
        ];
        Self {
            checks: BTreeMap::new(),
            stage,
            role,
            tags,
            source,
        }
    }

    pub fn with_check(mut self, check: Check, value: CheckValue) -> Self {
        self.checks.insert(check, value);
        self
    }

    pub fn check(&self, check: Check) -> Option<&CheckValue> {
        self.checks.get(&check)
    }

    /// 实例状态是否为指定值
    pub fn state_is(&self, state: &str) -> bool {
        matches!(self.check(Check::State), Some(CheckValue::Single(s)) if s == state)
    }
}

/// 一个轮询周期的实例快照
#[derive(Debug, Clone, Default)]
pub struct InstanceSnapshot {
    instances: BTreeMap<String, InstanceInfo>,
    /// 私有 DNS 短名 -> 实例 ID
    lookup: HashMap<String, String>,
    failed_sources: Vec<SourceId>,
}

impl InstanceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, info: InstanceInfo) {
        self.instances.insert(id.into(), info);
    }

    pub fn add_alias(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.lookup.insert(name.into(), id.into());
    }

    pub fn get(&self, id: &str) -> Option<&InstanceInfo> {
        self.instances.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.instances.contains_key(id)
    }

    /// 按资源 ID 排序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&String, &InstanceInfo)> {
        self.instances.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.instances.keys()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// 把别名解析为实例 ID；无法解析时原样返回
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.lookup.get(name).map(String::as_str).unwrap_or(name)
    }

    /// 本周期失败的数据源
    pub fn failed_sources(&self) -> &[SourceId] {
        &self.failed_sources
    }

    pub fn is_complete(&self) -> bool {
        self.failed_sources.is_empty()
    }
}

/// 快照构建器
///
/// 每个数据源独立处理。失败数据源的上一周期条目原样沿用，
/// 因此既不会被判定为已删除，也不会产生状态变化。
pub struct SnapshotBuilder<'a> {
    previous: &'a InstanceSnapshot,
    current: InstanceSnapshot,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(previous: &'a InstanceSnapshot) -> Self {
        Self {
            previous,
            current: InstanceSnapshot::new(),
        }
    }

    /// 加入一个数据源的实例列表和状态检查结果
    pub fn add_source(
        &mut self,
        source: &SourceId,
        instances: Vec<RawInstance>,
        status: Result<Vec<RawStatus>, SourceError>,
    ) {
        let status: Option<HashMap<String, CheckValue>> = match status {
            Ok(list) => Some(
                list.into_iter()
                    .map(|s| (s.id, CheckValue::pair(s.system_status, s.instance_status)))
                    .collect(),
            ),
            Err(e) => {
                warn!(source = %source, error = %e, "Instance status call failed, keeping previous status");
                None
            }
        };

        let mut added = 0usize;
        for raw in instances {
            // 没有标签的实例不纳入监控
            if raw.tags.is_empty() {
                continue;
            }

            let stage = raw.tags.get("Stage").cloned().unwrap_or_else(|| "unknown".to_string());
            let role = raw.tags.get("Role").cloned().unwrap_or_else(|| "unknown".to_string());
            let mut info = InstanceInfo::new(source.clone(), stage, role)
                .with_check(Check::State, CheckValue::parse(&raw.state));

            let status_value = match &status {
                Some(results) => Some(
                    results
                        .get(&raw.id)
                        .cloned()
                        .unwrap_or_else(|| CheckValue::pair("not-available", "not-available")),
                ),
                None => self
                    .previous
                    .get(&raw.id)
                    .and_then(|prev| prev.check(Check::Status))
                    .cloned(),
            };
            if let Some(value) = status_value {
                info.checks.insert(Check::Status, value);
            }

            if let Some(short) = raw.private_dns_name.split('.').next().filter(|s| !s.is_empty()) {
                debug!(alias = %short, instance_id = %raw.id, "Instance alias");
                self.current.add_alias(short, raw.id.clone());
            }

            self.current.insert(raw.id, info);
            added += 1;
        }

        debug!(source = %source, instances = added, "Source added to snapshot");
    }

    /// 标记数据源失败，并沿用其上一周期的条目
    pub fn source_failed(&mut self, source: &SourceId, error: &SourceError) {
        warn!(source = %source, error = %error, "Instance source failed, carrying previous entries forward");

        let carried: Vec<(String, InstanceInfo)> = self
            .previous
            .iter()
            .filter(|(id, info)| info.source == *source && !self.current.contains(id))
            .map(|(id, info)| (id.clone(), info.clone()))
            .collect();

        for (name, id) in &self.previous.lookup {
            if carried.iter().any(|(carried_id, _)| carried_id == id) {
                self.current.add_alias(name.clone(), id.clone());
            }
        }
        for (id, info) in carried {
            self.current.insert(id, info);
        }

        self.current.failed_sources.push(source.clone());
    }

    pub fn build(self) -> InstanceSnapshot {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(region: &str) -> SourceId {
        SourceId::new("prod", region)
    }

    fn raw(id: &str, state: &str, dns: &str) -> RawInstance {
        let mut tags = HashMap::new();
        tags.insert("Stage".to_string(), "PROD".to_string());
        tags.insert("Role".to_string(), "web".to_string());
        RawInstance {
            id: id.to_string(),
            private_dns_name: dns.to_string(),
            state: state.to_string(),
            tags,
        }
    }

    fn status(id: &str, system: &str, instance: &str) -> RawStatus {
        RawStatus {
            id: id.to_string(),
            system_status: system.to_string(),
            instance_status: instance.to_string(),
        }
    }

    #[test]
    fn test_check_value_display() {
        assert_eq!(CheckValue::parse("ok:impaired"), CheckValue::pair("ok", "impaired"));
        assert_eq!(CheckValue::parse("running"), CheckValue::single("running"));
        assert_eq!(CheckValue::parse("ok:impaired").to_string(), "ok:impaired");
        assert_eq!(CheckValue::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_builder_fills_missing_status() {
        let previous = InstanceSnapshot::new();
        let mut builder = SnapshotBuilder::new(&previous);
        builder.add_source(
            &source("eu-west-1"),
            vec![
                raw("i-1", "running", "ip-10-0-0-1.eu-west-1.compute.internal"),
                raw("i-2", "pending", "ip-10-0-0-2.eu-west-1.compute.internal"),
            ],
            Ok(vec![status("i-1", "ok", "impaired")]),
        );
        let snapshot = builder.build();

        assert_eq!(snapshot.len(), 2);
        let i1 = snapshot.get("i-1").unwrap();
        assert_eq!(i1.check(Check::Status), Some(&CheckValue::pair("ok", "impaired")));
        assert_eq!(i1.stage, "PROD");
        assert!(i1.tags.contains(&"cluster:web_eu-west-1".to_string()));
        assert!(i1.tags.contains(&"account:prod".to_string()));

        let i2 = snapshot.get("i-2").unwrap();
        assert_eq!(
            i2.check(Check::Status),
            Some(&CheckValue::pair("not-available", "not-available"))
        );

        assert_eq!(snapshot.resolve("ip-10-0-0-1"), "i-1");
        assert_eq!(snapshot.resolve("ip-10-9-9-9"), "ip-10-9-9-9");
        assert!(snapshot.is_complete());
    }

    #[test]
    fn test_untagged_instances_are_ignored() {
        let previous = InstanceSnapshot::new();
        let mut builder = SnapshotBuilder::new(&previous);
        let mut untagged = raw("i-3", "running", "");
        untagged.tags.clear();
        builder.add_source(&source("us-east-1"), vec![untagged], Ok(Vec::new()));

        assert!(builder.build().is_empty());
    }

    #[test]
    fn test_missing_tags_default_to_unknown() {
        let previous = InstanceSnapshot::new();
        let mut builder = SnapshotBuilder::new(&previous);
        let mut instance = raw("i-4", "running", "");
        instance.tags.clear();
        instance.tags.insert("Name".to_string(), "db".to_string());
        builder.add_source(&source("us-east-1"), vec![instance], Ok(Vec::new()));

        let snapshot = builder.build();
        let info = snapshot.get("i-4").unwrap();
        assert_eq!(info.stage, "unknown");
        assert_eq!(info.role, "unknown");
    }

    #[test]
    fn test_failed_source_carries_previous_entries() {
        let eu = source("eu-west-1");
        let us = source("us-east-1");

        let empty = InstanceSnapshot::new();
        let mut builder = SnapshotBuilder::new(&empty);
        builder.add_source(&eu, vec![raw("i-1", "running", "ip-10-0-0-1.x")], Ok(Vec::new()));
        builder.add_source(&us, vec![raw("i-2", "running", "ip-10-0-0-2.x")], Ok(Vec::new()));
        let previous = builder.build();

        let mut builder = SnapshotBuilder::new(&previous);
        builder.add_source(&eu, vec![raw("i-1", "stopped", "ip-10-0-0-1.x")], Ok(Vec::new()));
        builder.source_failed(&us, &SourceError::request(&us, "timeout"));
        let current = builder.build();

        assert_eq!(current.get("i-2"), previous.get("i-2"));
        assert_eq!(current.resolve("ip-10-0-0-2"), "i-2");
        assert!(current.get("i-1").unwrap().state_is("stopped"));
        assert_eq!(current.failed_sources(), &[us]);
    }

    #[test]
    fn test_failed_status_call_keeps_previous_status() {
        let eu = source("eu-west-1");

        let empty = InstanceSnapshot::new();
        let mut builder = SnapshotBuilder::new(&empty);
        builder.add_source(&eu, vec![raw("i-1", "running", "")], Ok(vec![status("i-1", "ok", "ok")]));
        let previous = builder.build();

        let mut builder = SnapshotBuilder::new(&previous);
        builder.add_source(
            &eu,
            vec![raw("i-1", "running", ""), raw("i-9", "pending", "")],
            Err(SourceError::request(&eu, "throttled")),
        );
        let current = builder.build();

        assert_eq!(
            current.get("i-1").unwrap().check(Check::Status),
            Some(&CheckValue::pair("ok", "ok"))
        );
        // 从未观测过的实例没有状态检查值
        assert_eq!(current.get("i-9").unwrap().check(Check::Status), None);
    }
}
