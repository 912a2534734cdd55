use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// 关闭信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - 优雅关闭
    Term,

    /// SIGINT - Ctrl+C
    Interrupt,

    /// 手动触发
    Manual,
}

/// 信号处理器
///
/// 基于 watch 通道：触发之后订阅的监听器也能立即看到关闭状态。
pub struct SignalHandler {
    shutdown_tx: watch::Sender<Option<ShutdownSignal>>,
}

impl SignalHandler {
    pub fn new() -> (Self, ShutdownListener) {
        let (tx, rx) = watch::channel(None);
        (Self { shutdown_tx: tx }, ShutdownListener { rx, _owner: None })
    }

    /// 等待系统信号
    #[cfg(unix)]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        use signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let received = tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Term,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
        };
        info!("Received {:?}", received);
        self.trigger(received);
        Ok(received)
    }

    /// 等待系统信号（Windows 版本）
    #[cfg(not(unix))]
    pub async fn wait_for_system_signal(&self) -> std::io::Result<ShutdownSignal> {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
        self.trigger(ShutdownSignal::Interrupt);
        Ok(ShutdownSignal::Interrupt)
    }

    /// 手动触发关闭
    pub fn trigger_shutdown(&self) {
        info!("Manual shutdown triggered");
        self.trigger(ShutdownSignal::Manual);
    }

    fn trigger(&self, received: ShutdownSignal) {
        // 只记录第一个信号
        self.shutdown_tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(received);
                true
            } else {
                false
            }
        });
    }

    /// 订阅关闭信号
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.shutdown_tx.subscribe(),
            _owner: None,
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new().0
    }
}

/// 关闭监听器
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<Option<ShutdownSignal>>,
    _owner: Option<Arc<watch::Sender<Option<ShutdownSignal>>>>,
}

impl ShutdownListener {
    /// 永不触发的监听器（一次性命令行工具使用）
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            rx,
            _owner: Some(Arc::new(tx)),
        }
    }

    /// 是否已请求关闭
    pub fn is_shutdown(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// 已收到的信号
    pub fn signal(&self) -> Option<ShutdownSignal> {
        *self.rx.borrow()
    }

    /// 等待关闭请求；信号处理器被丢弃也视为关闭
    pub async fn recv(&mut self) -> ShutdownSignal {
        loop {
            if let Some(received) = *self.rx.borrow_and_update() {
                return received;
            }
            if self.rx.changed().await.is_err() {
                return (*self.rx.borrow()).unwrap_or(ShutdownSignal::Manual);
            }
        }
    }
}
