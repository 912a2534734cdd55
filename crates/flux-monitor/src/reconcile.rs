use tracing::{debug, info, warn};

use flux_types::AlertStatus;

use crate::snapshot::{Check, InstanceSnapshot};
use crate::store::{AlertStore, StoredAlert};

/// 对账动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 实例已不存在
    Delete,
    /// 实例已终止
    Ack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub alert_id: String,
    pub resource: String,
    pub action: Action,
}

/// 对账统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub examined: usize,
    pub deleted: usize,
    pub acked: usize,
    pub failed: usize,
    /// 因数据源失败而跳过的删除
    pub deferred: usize,
}

/// 告警资源名对应的实例 ID
///
/// `i-01234567:/tmp` 截断到冒号；`ip-10-x-x-x` 通过快照别名解析。
pub fn canonical_resource<'a>(resource: &'a str, snapshot: &'a InstanceSnapshot) -> &'a str {
    let resource = resource.split(':').next().unwrap_or(resource);
    if resource.starts_with("ip-") {
        snapshot.resolve(resource)
    } else {
        resource
    }
}

/// 计算单个告警的对账动作
pub fn decide(alert: &StoredAlert, snapshot: &InstanceSnapshot) -> Option<Action> {
    let resource = canonical_resource(&alert.resource, snapshot);

    match snapshot.get(resource) {
        None => Some(Action::Delete),
        Some(info)
            if info.state_is("terminated")
                && alert.status != AlertStatus::Ack
                && !Check::is_own_event(&alert.event) =>
        {
            Some(Action::Ack)
        }
        Some(_) => None,
    }
}

/// 计算全部对账动作
pub fn plan(alerts: &[StoredAlert], snapshot: &InstanceSnapshot) -> Vec<Reconciliation> {
    alerts
        .iter()
        .filter_map(|alert| {
            decide(alert, snapshot).map(|action| Reconciliation {
                alert_id: alert.id.clone(),
                resource: canonical_resource(&alert.resource, snapshot).to_string(),
                action,
            })
        })
        .collect()
}

/// 与告警服务对账；单个告警失败不影响其它告警
pub async fn reconcile(store: &dyn AlertStore, snapshot: &InstanceSnapshot) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let alerts = match store.list().await {
        Ok(alerts) => alerts,
        Err(e) => {
            warn!(error = %e, "Could not list alerts from alert store");
            return report;
        }
    };
    report.examined = alerts.len();
    info!(alerts = alerts.len(), "Retrieved EC2 alerts");

    for step in plan(&alerts, snapshot) {
        // 数据源失败时快照不完整，不能据此删除
        if step.action == Action::Delete && !snapshot.is_complete() {
            debug!(alert_id = %step.alert_id, resource = %step.resource, "Snapshot incomplete, deferring delete");
            report.deferred += 1;
            continue;
        }

        let result = match step.action {
            Action::Delete => {
                info!(alert_id = %step.alert_id, resource = %step.resource, "Instance no longer listed, deleting alert");
                store.delete(&step.alert_id).await
            }
            Action::Ack => {
                info!(alert_id = %step.alert_id, resource = %step.resource, "Instance terminated, acknowledging alert");
                store.acknowledge(&step.alert_id).await
            }
        };

        match (result, step.action) {
            (Ok(()), Action::Delete) => report.deleted += 1,
            (Ok(()), Action::Ack) => report.acked += 1,
            (Err(e), _) => {
                warn!(alert_id = %step.alert_id, error = %e, "Failed to update alert");
                report.failed += 1;
            }
        }
    }

    report
}
