use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use flux_shutdown::ShutdownListener;

use crate::token_bucket::TokenBucket;

#[derive(Debug, Error)]
pub enum RefillError {
    #[error("refill task did not stop within {0:?}")]
    JoinTimeout(Duration),

    #[error("refill task panicked: {0}")]
    Panicked(String),
}

/// 令牌补充任务
///
/// 独立的周期任务，每个间隔向桶中补充一个令牌。第一次补充发生在启动后一个间隔。
pub struct TokenRefiller {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TokenRefiller {
    /// 启动补充任务
    pub fn spawn(bucket: Arc<TokenBucket>, period: Duration) -> Self {
        Self::spawn_with_shutdown(bucket, period, ShutdownListener::never())
    }

    /// 启动补充任务，并在进程关闭信号到达时自行退出
    pub fn spawn_with_shutdown(
        bucket: Arc<TokenBucket>,
        period: Duration,
        mut shutdown: ShutdownListener,
    ) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        info!(
            capacity = bucket.capacity(),
            period = ?period,
            "Start token bucket refill task"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // 停止请求优先于补充
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                        if bucket.refill_tick() {
                            debug!(tokens = bucket.available(), "Refilled token bucket");
                        }
                    }
                }
            }

            info!("Token bucket refill task stopped");
        });

        Self { stop_tx, handle }
    }

    /// 请求停止并等待任务结束（有界等待）
    pub async fn shutdown(self, bound: Duration) -> Result<(), RefillError> {
        let _ = self.stop_tx.send(true);

        let mut handle = self.handle;
        match timeout(bound, &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_panic() => Err(RefillError::Panicked(e.to_string())),
            Ok(Err(_)) => Ok(()),
            Err(_) => {
                warn!(bound = ?bound, "Refill task did not stop in time, aborting");
                handle.abort();
                Err(RefillError::JoinTimeout(bound))
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_shutdown::SignalHandler;

    #[tokio::test(start_paused = true)]
    async fn test_refills_once_per_period() {
        let bucket = Arc::new(TokenBucket::with_tokens(5, 0));
        let refiller = TokenRefiller::spawn(bucket.clone(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(bucket.available(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(bucket.available(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(bucket.available(), 3);

        refiller.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_capacity() {
        let bucket = Arc::new(TokenBucket::with_tokens(2, 1));
        let refiller = TokenRefiller::spawn(bucket.clone(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(bucket.available(), 2);

        refiller.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_takes_effect_before_next_tick() {
        let bucket = Arc::new(TokenBucket::with_tokens(5, 0));
        let refiller = TokenRefiller::spawn(bucket.clone(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(10)).await;
        refiller.shutdown(Duration::from_secs(1)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(bucket.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_shutdown_stops_task() {
        let (handler, listener) = SignalHandler::new();
        let bucket = Arc::new(TokenBucket::with_tokens(5, 0));
        let refiller =
            TokenRefiller::spawn_with_shutdown(bucket.clone(), Duration::from_secs(1), listener);

        handler.trigger_shutdown();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(refiller.is_finished());
        assert_eq!(bucket.available(), 0);

        refiller.shutdown(Duration::from_secs(1)).await.unwrap();
    }
}
