//! 状态变化分类
//!
//! 有序规则表，第一条匹配的规则生效。规则可以插入到任意位置。

use thiserror::Error;

use flux_types::Severity;

use crate::diff::TransitionEvent;
use crate::snapshot::{Check, CheckValue};

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub severity: Severity,
    pub text: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no rule matches {check} value {value}")]
pub struct ClassificationError {
    pub check: Check,
    pub value: String,
}

type Matcher = Box<dyn Fn(&CheckValue) -> bool + Send + Sync>;
type Describe = Box<dyn Fn(&CheckValue, &CheckValue) -> String + Send + Sync>;

/// 分类规则
pub struct Rule {
    name: String,
    check: Check,
    severity: Severity,
    matches: Matcher,
    describe: Describe,
}

impl Rule {
    /// `matches` 作用于新值；`describe(old, new)` 生成告警文本
    pub fn new(
        name: impl Into<String>,
        check: Check,
        severity: Severity,
        matches: impl Fn(&CheckValue) -> bool + Send + Sync + 'static,
        describe: impl Fn(&CheckValue, &CheckValue) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check,
            severity,
            matches: Box::new(matches),
            describe: Box::new(describe),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self) -> Check {
        self.check
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    fn applies(&self, check: Check, value: &CheckValue) -> bool {
        self.check == check && (self.matches)(value)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("check", &self.check)
            .field("severity", &self.severity)
            .finish()
    }
}

fn instance_was(old: &CheckValue, new: &CheckValue) -> String {
    format!("Instance was {} now it is {}", old, new)
}

fn is_pair(value: &CheckValue, first: Option<&str>, second: Option<&str>) -> bool {
    match value {
        CheckValue::Pair(a, b) => {
            first.map_or(true, |f| a == f) && second.map_or(true, |s| b == s)
        }
        _ => false,
    }
}

/// 分类器
#[derive(Debug)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    /// 空规则表
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// 追加规则
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// 在指定位置插入规则（超出范围时追加）
    pub fn insert(&mut self, index: usize, rule: Rule) {
        let index = index.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// 对状态变化分类
    pub fn classify(&self, transition: &TransitionEvent) -> Result<Classification, ClassificationError> {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.applies(transition.check, &transition.new))
            .ok_or_else(|| ClassificationError {
                check: transition.check,
                value: transition.new.to_string(),
            })?;

        Ok(Classification {
            severity: rule.severity,
            text: (rule.describe)(&transition.old, &transition.new),
        })
    }

    /// 单个值对应的级别；`Unknown` 或无法分类时为 UNKNOWN
    pub fn severity_of(&self, check: Check, value: &CheckValue) -> Severity {
        if value.is_unknown() {
            return Severity::Unknown;
        }
        self.rules
            .iter()
            .find(|rule| rule.applies(check, value))
            .map(|rule| rule.severity)
            .unwrap_or(Severity::Unknown)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        let mut classifier = Self::empty();

        classifier.push(Rule::new(
            "state-running",
            Check::State,
            Severity::Normal,
            |value| matches!(value, CheckValue::Single(s) if s == "running"),
            instance_was,
        ));
        classifier.push(Rule::new(
            "state-other",
            Check::State,
            Severity::Warning,
            |value| !value.is_unknown(),
            instance_was,
        ));
        classifier.push(Rule::new(
            "status-ok",
            Check::Status,
            Severity::Normal,
            |value| is_pair(value, Some("ok"), Some("ok")),
            |_, _| "System and instance status checks are ok".to_string(),
        ));
        classifier.push(Rule::new(
            "status-instance",
            Check::Status,
            Severity::Warning,
            |value| is_pair(value, Some("ok"), None),
            |_, new| match new {
                CheckValue::Pair(_, instance) => format!("Instance status check is {}", instance),
                other => format!("Instance status check is {}", other),
            },
        ));
        classifier.push(Rule::new(
            "status-system",
            Check::Status,
            Severity::Warning,
            |value| is_pair(value, None, Some("ok")),
            |_, new| match new {
                CheckValue::Pair(system, _) => format!("System status check is {}", system),
                other => format!("System status check is {}", other),
            },
        ));
        classifier.push(Rule::new(
            "status-both",
            Check::Status,
            Severity::Warning,
            |value| is_pair(value, None, None),
            |_, new| match new {
                CheckValue::Pair(system, instance) => format!(
                    "System status check is {} and instance status check is {}",
                    system, instance
                ),
                other => format!("Status checks are {}", other),
            },
        ));

        classifier
    }
}
