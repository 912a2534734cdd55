use std::time::Duration;

/// 重连策略
///
/// 第 n 次重试前等待 `initial * (1 + increase)^n`，不超过 `max`；
/// 总尝试次数不超过 `max_attempts`。
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub increase: f64,
    pub max: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(initial: Duration, increase: f64, max: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            increase,
            max,
            max_attempts: max_attempts.max(1),
        }
    }

    /// 只尝试一次（命令行工具使用）
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// 第 `retry` 次重试前的等待时间（从 0 开始）
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = (1.0 + self.increase.max(0.0)).powi(retry.min(i32::MAX as u32) as i32);
        let secs = (self.initial.as_secs_f64() * factor).min(self.max.as_secs_f64());
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// 全部重试等待时间
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(move |retry| self.delay(retry))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            increase: 5.0,
            max: Duration::from_secs(120),
            max_attempts: 20,
        }
    }
}
