use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use flux_bus::{BusClient, BusError, Transport};
use flux_shutdown::ShutdownListener;
use flux_types::{Alert, MessageHeaders};

use crate::diff::diff;
use crate::factory::AlertFactory;
use crate::reconcile::{reconcile, ReconcileReport};
use crate::snapshot::{Check, InstanceSnapshot, SnapshotBuilder};
use crate::source::InstanceSource;
use crate::store::AlertStore;

/// 单个轮询周期的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub instances: usize,
    pub failed_sources: usize,
    pub transitions: usize,
    pub retired: usize,
    /// 无法分类而丢弃的变化
    pub unclassified: usize,
    pub reconcile: ReconcileReport,
}

/// 单个轮询周期的结果
#[derive(Debug, Clone, Default)]
pub struct Cycle {
    pub alerts: Vec<Alert>,
    pub report: CycleReport,
}

/// 云实例轮询器
///
/// 每个周期：采集快照 → 与告警服务对账 → 与上一快照比较 → 构造告警。
/// 周期之间只保留上一周期的快照。
pub struct Poller {
    sources: Vec<Arc<dyn InstanceSource>>,
    store: Option<Arc<dyn AlertStore>>,
    factory: AlertFactory,
    tracked: Vec<Check>,
    previous: InstanceSnapshot,
    interval: Duration,
}

impl Poller {
    pub fn new(factory: AlertFactory, interval: Duration) -> Self {
        Self {
            sources: Vec::new(),
            store: None,
            factory,
            tracked: Check::ALL.to_vec(),
            previous: InstanceSnapshot::new(),
            interval,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn InstanceSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn AlertStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_tracked(mut self, tracked: Vec<Check>) -> Self {
        self.tracked = tracked;
        self
    }

    /// 上一周期的快照
    pub fn snapshot(&self) -> &InstanceSnapshot {
        &self.previous
    }

    /// 采集所有数据源；单个数据源失败不影响其它数据源
    async fn collect(&self) -> InstanceSnapshot {
        let mut builder = SnapshotBuilder::new(&self.previous);

        for source in &self.sources {
            let id = source.id();
            info!(source = %id, "Get all instances");

            let instances = match source.instances().await {
                Ok(instances) => instances,
                Err(e) => {
                    builder.source_failed(id, &e);
                    continue;
                }
            };

            info!(source = %id, "Get system and instance status");
            let status = source.instance_status().await;
            builder.add_source(id, instances, status);
        }

        builder.build()
    }

    /// 执行一个轮询周期
    pub async fn poll_once(&mut self) -> Cycle {
        let current = self.collect().await;

        let mut report = CycleReport {
            instances: current.len(),
            failed_sources: current.failed_sources().len(),
            ..CycleReport::default()
        };

        if let Some(store) = &self.store {
            report.reconcile = reconcile(store.as_ref(), &current).await;
        }

        let changes = diff(&self.previous, &current, &self.tracked);
        report.transitions = changes.transitions.len();
        report.retired = changes.retired.len();

        for resource in &changes.retired {
            info!(resource = %resource, "Instance no longer listed");
        }

        let mut alerts = Vec::with_capacity(changes.transitions.len());
        for transition in &changes.transitions {
            let Some(instance) = current.get(&transition.resource) else {
                continue;
            };
            match self.factory.from_transition(transition, instance) {
                Ok(alert) => {
                    debug!(
                        resource = %transition.resource,
                        check = %transition.check,
                        old = %transition.old,
                        new = %transition.new,
                        "State transition"
                    );
                    alerts.push(alert);
                }
                Err(e) => {
                    warn!(resource = %transition.resource, error = %e, "Dropping unclassified transition");
                    report.unclassified += 1;
                }
            }
        }

        self.previous = current;

        info!(
            instances = report.instances,
            failed_sources = report.failed_sources,
            transitions = report.transitions,
            retired = report.retired,
            alerts = alerts.len(),
            "Poll cycle complete"
        );

        Cycle { alerts, report }
    }

    /// 周期性轮询并发布告警，直到收到关闭信号
    ///
    /// 周期不会重叠；重连次数耗尽时返回错误。
    pub async fn run<T: Transport>(
        &mut self,
        bus: &mut BusClient<T>,
        destination: &str,
        mut shutdown: ShutdownListener,
    ) -> Result<(), BusError> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.interval, sources = self.sources.len(), "Poller started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }

            let cycle = self.poll_once().await;
            for alert in &cycle.alerts {
                if shutdown.is_shutdown() {
                    break;
                }
                match bus.publish(destination, alert, MessageHeaders::for_alert(alert)).await {
                    Ok(()) => {}
                    Err(BusError::Cancelled) => break,
                    Err(e) if e.is_fatal() => {
                        error!(error = %e, "Message bus unavailable, stopping poller");
                        return Err(e);
                    }
                    Err(e) => {
                        warn!(alert_id = %alert.id, error = %e, "Failed to publish alert");
                    }
                }
            }
        }

        info!("Poller stopped");
        Ok(())
    }
}
