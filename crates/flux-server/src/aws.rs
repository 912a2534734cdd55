use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use flux_bus::{BusClient, Transport};
use flux_config::AlertaConfig;
use flux_monitor::{AlertFactory, HttpAlertStore, HttpInstanceSource, Poller, SourceId};
use flux_shutdown::ShutdownListener;

pub const PROGRAM: &str = "alert-aws";

/// 按配置组装轮询器
pub fn build_poller(config: &AlertaConfig, hostname: &str) -> Result<Poller> {
    let aws = &config.aws;
    let factory = AlertFactory::new(PROGRAM, hostname).with_timeout(aws.alert_timeout_secs);
    let mut poller = Poller::new(factory, aws.poll_interval());

    for source in &aws.sources {
        let id = SourceId::new(&source.account, &source.region);
        info!(source = %id, url = %source.url, "Adding instance source");
        let source = HttpInstanceSource::new(id, &source.url, aws.request_timeout())?;
        poller = poller.with_source(Arc::new(source));
    }

    match &aws.store_url {
        Some(url) => {
            let store = HttpAlertStore::new(url, aws.request_timeout())?
                .with_filter(&aws.store_filter);
            poller = poller.with_store(Arc::new(store));
        }
        None => info!("No alert store configured, reconciliation disabled"),
    }

    if aws.sources.is_empty() {
        warn!("No instance sources configured");
    }
    Ok(poller)
}

/// 运行轮询器直到关闭，然后断开总线
pub async fn run_poller<T: Transport>(
    mut poller: Poller,
    mut bus: BusClient<T>,
    destination: &str,
    shutdown: ShutdownListener,
) -> Result<()> {
    let result = poller.run(&mut bus, destination, shutdown).await;

    if let Err(e) = bus.disconnect().await {
        warn!(error = %e, "Bus disconnect failed");
    }
    Ok(result?)
}
