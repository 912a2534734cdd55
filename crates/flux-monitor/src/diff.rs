use crate::snapshot::{Check, CheckValue, InstanceSnapshot};

/// 状态变化事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub resource: String,
    pub check: Check,
    pub old: CheckValue,
    pub new: CheckValue,
}

/// 比较结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// 按资源 ID、检查项排序
    pub transitions: Vec<TransitionEvent>,
    /// 上一周期存在、本周期消失的资源
    pub retired: Vec<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty() && self.retired.is_empty()
    }
}

/// 比较两个快照
///
/// 新出现的资源以 `Unknown` 作为旧值，因此首次观测也会产生事件。
/// 本周期没有值的检查项直接跳过。
pub fn diff(previous: &InstanceSnapshot, current: &InstanceSnapshot, tracked: &[Check]) -> DiffResult {
    let mut checks = tracked.to_vec();
    checks.sort();
    checks.dedup();

    let mut transitions = Vec::new();
    for (resource, info) in current.iter() {
        let before = previous.get(resource);

        for check in &checks {
            let Some(new) = info.check(*check) else {
                continue;
            };
            let old = before
                .and_then(|prev| prev.check(*check))
                .cloned()
                .unwrap_or(CheckValue::Unknown);

            if old != *new {
                transitions.push(TransitionEvent {
                    resource: resource.clone(),
                    check: *check,
                    old,
                    new: new.clone(),
                });
            }
        }
    }

    let retired = previous
        .ids()
        .filter(|id| !current.contains(id))
        .cloned()
        .collect();

    DiffResult { transitions, retired }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::InstanceInfo;
    use crate::source::SourceId;

    fn info(state: &str, status: Option<CheckValue>) -> InstanceInfo {
        let mut info = InstanceInfo::new(SourceId::new("prod", "eu-west-1"), "PROD", "web")
            .with_check(Check::State, CheckValue::single(state));
        if let Some(status) = status {
            info.checks.insert(Check::Status, status);
        }
        info
    }

    #[test]
    fn test_identical_snapshots_produce_nothing() {
        let mut snapshot = InstanceSnapshot::new();
        snapshot.insert("i-1", info("running", Some(CheckValue::pair("ok", "ok"))));

        assert!(diff(&snapshot, &snapshot, &Check::ALL).is_empty());
    }

    #[test]
    fn test_state_change() {
        let mut previous = InstanceSnapshot::new();
        previous.insert("i-1", info("pending", Some(CheckValue::pair("ok", "ok"))));
        let mut current = InstanceSnapshot::new();
        current.insert("i-1", info("running", Some(CheckValue::pair("ok", "ok"))));

        let result = diff(&previous, &current, &Check::ALL);
        assert_eq!(
            result.transitions,
            vec![TransitionEvent {
                resource: "i-1".to_string(),
                check: Check::State,
                old: CheckValue::single("pending"),
                new: CheckValue::single("running"),
            }]
        );
        assert!(result.retired.is_empty());
    }

    #[test]
    fn test_new_resource_reports_every_check() {
        let previous = InstanceSnapshot::new();
        let mut current = InstanceSnapshot::new();
        current.insert("i-2", info("running", Some(CheckValue::pair("ok", "impaired"))));

        let result = diff(&previous, &current, &Check::ALL);
        assert_eq!(result.transitions.len(), 2);
        assert!(result.transitions.iter().all(|t| t.old == CheckValue::Unknown));
        assert_eq!(result.transitions[0].check, Check::State);
        assert_eq!(result.transitions[1].check, Check::Status);
    }

    #[test]
    fn test_retired_resources() {
        let mut previous = InstanceSnapshot::new();
        previous.insert("i-1", info("running", None));
        previous.insert("i-2", info("running", None));
        let mut current = InstanceSnapshot::new();
        current.insert("i-2", info("running", None));

        let result = diff(&previous, &current, &Check::ALL);
        assert!(result.transitions.is_empty());
        assert_eq!(result.retired, vec!["i-1".to_string()]);
    }

    #[test]
    fn test_absent_check_is_skipped() {
        let mut previous = InstanceSnapshot::new();
        previous.insert("i-1", info("running", Some(CheckValue::pair("ok", "ok"))));
        let mut current = InstanceSnapshot::new();
        current.insert("i-1", info("running", None));

        assert!(diff(&previous, &current, &Check::ALL).is_empty());
    }

    #[test]
    fn test_sorted_by_resource_then_check() {
        let previous = InstanceSnapshot::new();
        let mut current = InstanceSnapshot::new();
        current.insert("i-b", info("running", Some(CheckValue::pair("ok", "ok"))));
        current.insert("i-a", info("stopped", Some(CheckValue::pair("ok", "ok"))));

        let result = diff(&previous, &current, &[Check::Status, Check::State]);
        let order: Vec<(&str, Check)> = result
            .transitions
            .iter()
            .map(|t| (t.resource.as_str(), t.check))
            .collect();
        assert_eq!(
            order,
            vec![
                ("i-a", Check::State),
                ("i-a", Check::Status),
                ("i-b", Check::State),
                ("i-b", Check::Status),
            ]
        );
    }

    #[test]
    fn test_untracked_checks_are_ignored() {
        let mut previous = InstanceSnapshot::new();
        previous.insert("i-1", info("running", Some(CheckValue::pair("ok", "ok"))));
        let mut current = InstanceSnapshot::new();
        current.insert("i-1", info("running", Some(CheckValue::pair("impaired", "ok"))));

        assert!(diff(&previous, &current, &[Check::State]).is_empty());
        assert_eq!(diff(&previous, &current, &[Check::Status]).transitions.len(), 1);
    }
}
