use anyhow::{anyhow, Result};
use chrono::FixedOffset;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use flux_bus::{BusClient, Transport};
use flux_config::{AlertaConfig, NotifyChannel};
use flux_notify::{
    DispatchStats, Dispatcher, EmailConfig, EmailNotifier, Notifier, Renderer, WebhookConfig,
    WebhookNotifier,
};
use flux_ratelimit::{TokenBucket, TokenRefiller};
use flux_shutdown::ShutdownListener;

use crate::bus::{bus_client, DynBusClient};

pub const PROGRAM: &str = "alert-mailer";

/// 按配置创建通知器
pub fn build_notifier(config: &AlertaConfig) -> Result<Arc<dyn Notifier>> {
    match config.mailer.channel {
        NotifyChannel::Email => {
            let smtp = &config.notify.smtp;
            let notifier = EmailNotifier::new(EmailConfig {
                smtp_host: smtp.host.clone(),
                smtp_port: smtp.port,
                username: smtp.username.clone(),
                password: smtp.password.clone(),
                tls: smtp.tls,
                from: smtp.from.clone(),
                to: smtp.to.clone(),
            })?;
            Ok(Arc::new(notifier))
        }
        NotifyChannel::Webhook => {
            let webhook = config
                .notify
                .webhook
                .as_ref()
                .ok_or_else(|| anyhow!("notify.webhook is not configured"))?;
            let headers = (!webhook.headers.is_empty()).then(|| webhook.headers.clone());
            Ok(Arc::new(WebhookNotifier::new(WebhookConfig {
                url: webhook.url.clone(),
                headers,
            })))
        }
    }
}

/// 按配置创建渲染器
pub fn build_renderer(config: &AlertaConfig, hostname: &str) -> Result<Renderer> {
    let renderer = Renderer::new(&config.mailer.alerta_url, PROGRAM, hostname)?;
    match config.mailer.utc_offset_secs {
        Some(secs) => {
            let offset = FixedOffset::east_opt(secs)
                .ok_or_else(|| anyhow!("mailer.utc_offset_secs out of range: {}", secs))?;
            Ok(renderer.with_offset(offset))
        }
        None => Ok(renderer),
    }
}

/// 禁用标志文件存在时等待；收到关闭信号返回 false
pub async fn wait_while_disabled(
    flag: &Path,
    poll: Duration,
    shutdown: &mut ShutdownListener,
) -> bool {
    while flag.exists() {
        warn!(flag = %flag.display(), "Disable flag exists, sleeping");
        tokio::select! {
            biased;
            _ = shutdown.recv() => return false,
            _ = tokio::time::sleep(poll) => {}
        }
    }
    !shutdown.is_shutdown()
}

/// 通知守护进程的组件集合
///
/// 持有分发器、令牌补充任务和总线连接，`run` 结束时按固定顺序释放。
pub struct MailerContext<T: Transport> {
    dispatcher: Dispatcher,
    refiller: TokenRefiller,
    bus: BusClient<T>,
    destination: String,
    shutdown_timeout: Duration,
}

impl<T: Transport> MailerContext<T> {
    /// 组装并启动令牌补充任务
    pub fn new(
        bucket: Arc<TokenBucket>,
        dispatcher: Dispatcher,
        bus: BusClient<T>,
        destination: impl Into<String>,
        refill_interval: Duration,
    ) -> Self {
        Self {
            dispatcher,
            refiller: TokenRefiller::spawn(bucket, refill_interval),
            bus,
            destination: destination.into(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// 运行直到关闭信号或重连耗尽
    ///
    /// 分发循环退出后依次停止令牌补充任务、断开总线。
    pub async fn run(mut self) -> Result<DispatchStats> {
        let result = self.dispatcher.run(&mut self.bus, &self.destination).await;

        if let Err(e) = self.refiller.shutdown(self.shutdown_timeout).await {
            warn!(error = %e, "Token refill task shutdown failed");
        }
        if let Err(e) = self.bus.disconnect().await {
            warn!(error = %e, "Bus disconnect failed");
        }

        let stats = result?;
        info!(handled = stats.total(), "Mailer stopped");
        Ok(stats)
    }
}

impl MailerContext<Box<dyn Transport>> {
    /// 按配置组装
    pub fn from_config(
        config: &AlertaConfig,
        hostname: &str,
        shutdown: ShutdownListener,
    ) -> Result<Self> {
        let bucket = Arc::new(TokenBucket::new(config.mailer.token_limit));
        let notifier = build_notifier(config)?;
        let renderer = build_renderer(config, hostname)?;

        info!(
            notifier = notifier.name(),
            recipients = %notifier.recipients(),
            tokens = config.mailer.token_limit,
            refill_interval = ?config.mailer.refill_interval(),
            "Mailer configured"
        );

        let dispatcher = Dispatcher::new(bucket.clone(), renderer, notifier);
        let bus: DynBusClient = bus_client(&config.broker, PROGRAM, hostname, shutdown);

        Ok(Self::new(
            bucket,
            dispatcher,
            bus,
            config.destinations.notify.clone(),
            config.mailer.refill_interval(),
        )
        .with_shutdown_timeout(config.mailer.shutdown_timeout()))
    }
}
