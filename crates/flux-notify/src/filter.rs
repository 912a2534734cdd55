//! 通知过滤
//!
//! 按顺序匹配规则，第一条匹配的规则决定结果；没有规则匹配时发送通知。

use flux_types::Severity;

/// 过滤结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Notify,
    Suppress,
}

type Predicate = Box<dyn Fn(Severity, Severity) -> bool + Send + Sync>;

/// 过滤规则
pub struct FilterRule {
    name: String,
    decision: Decision,
    /// `(previous, current)`
    predicate: Predicate,
}

impl FilterRule {
    pub fn new(
        name: impl Into<String>,
        decision: Decision,
        predicate: impl Fn(Severity, Severity) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            decision,
            predicate: Box::new(predicate),
        }
    }

    /// 匹配时抑制通知的规则
    pub fn suppress(
        name: impl Into<String>,
        predicate: impl Fn(Severity, Severity) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, Decision::Suppress, predicate)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn matches(&self, previous: Severity, current: Severity) -> bool {
        (self.predicate)(previous, current)
    }
}

impl std::fmt::Debug for FilterRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRule")
            .field("name", &self.name)
            .field("decision", &self.decision)
            .finish()
    }
}

/// 通知过滤器
#[derive(Debug)]
pub struct NotificationFilter {
    rules: Vec<FilterRule>,
}

impl NotificationFilter {
    /// 空规则表（全部通知）
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn push(&mut self, rule: FilterRule) {
        self.rules.push(rule);
    }

    /// 在指定位置插入规则（超出范围时追加）
    pub fn insert(&mut self, index: usize, rule: FilterRule) {
        let index = index.min(self.rules.len());
        self.rules.insert(index, rule);
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// 第一条匹配的规则
    pub fn matching_rule(&self, previous: Severity, current: Severity) -> Option<&FilterRule> {
        self.rules.iter().find(|rule| rule.matches(previous, current))
    }

    pub fn decide(&self, previous: Severity, current: Severity) -> Decision {
        self.matching_rule(previous, current)
            .map(FilterRule::decision)
            .unwrap_or(Decision::Notify)
    }
}

impl Default for NotificationFilter {
    fn default() -> Self {
        let mut filter = Self::empty();

        // 只有清除已知告警时才发送 NORMAL
        filter.push(FilterRule::suppress("normal-from-unknown", |previous, current| {
            current == Severity::Normal && previous == Severity::Unknown
        }));

        // WARNING 与 NORMAL/UNKNOWN 之间的变化不发送
        filter.push(FilterRule::suppress("warning-flap", |previous, current| {
            (current == Severity::Warning
                && matches!(previous, Severity::Normal | Severity::Unknown))
                || (current == Severity::Normal && previous == Severity::Warning)
        }));

        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let filter = NotificationFilter::default();

        assert_eq!(filter.decide(Severity::Unknown, Severity::Normal), Decision::Suppress);
        assert_eq!(filter.decide(Severity::Normal, Severity::Warning), Decision::Suppress);
        assert_eq!(filter.decide(Severity::Unknown, Severity::Warning), Decision::Suppress);
        assert_eq!(filter.decide(Severity::Warning, Severity::Normal), Decision::Suppress);

        assert_eq!(filter.decide(Severity::Normal, Severity::Critical), Decision::Notify);
        assert_eq!(filter.decide(Severity::Critical, Severity::Normal), Decision::Notify);
        assert_eq!(filter.decide(Severity::Major, Severity::Warning), Decision::Notify);
        assert_eq!(filter.decide(Severity::Unknown, Severity::Clear), Decision::Notify);
    }

    #[test]
    fn test_total_over_all_pairs() {
        let filter = NotificationFilter::default();
        let mut suppressed = 0;

        for previous in Severity::ALL {
            for current in Severity::ALL {
                if filter.decide(previous, current) == Decision::Suppress {
                    suppressed += 1;
                }
            }
        }

        assert_eq!(suppressed, 4);
    }

    #[test]
    fn test_matching_rule_names() {
        let filter = NotificationFilter::default();
        let names: Vec<&str> = filter.rules().iter().map(FilterRule::name).collect();
        assert_eq!(names, vec!["normal-from-unknown", "warning-flap"]);

        assert_eq!(
            filter.matching_rule(Severity::Warning, Severity::Normal).map(FilterRule::name),
            Some("warning-flap")
        );
        assert!(filter.matching_rule(Severity::Minor, Severity::Major).is_none());
    }

    #[test]
    fn test_inserted_rule_overrides_default() {
        let mut filter = NotificationFilter::default();
        filter.insert(
            0,
            FilterRule::new("notify-warning-clear", Decision::Notify, |previous, current| {
                previous == Severity::Warning && current == Severity::Normal
            }),
        );

        assert_eq!(filter.decide(Severity::Warning, Severity::Normal), Decision::Notify);
        assert_eq!(filter.decide(Severity::Unknown, Severity::Normal), Decision::Suppress);
    }

    #[test]
    fn test_empty_filter_notifies() {
        let filter = NotificationFilter::empty();
        assert_eq!(filter.decide(Severity::Unknown, Severity::Normal), Decision::Notify);
    }
}
