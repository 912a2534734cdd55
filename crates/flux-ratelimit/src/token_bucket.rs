use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// 默认桶容量
pub const DEFAULT_CAPACITY: u32 = 20;

/// 默认补充间隔（每 30 秒补充一个令牌）
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(30);

/// 令牌桶限流器
///
/// 计数器只有两种修改：补充（+1，不超过容量）与消耗（-1，仅当大于 0）。
/// 两者在同一把锁下执行，锁不会跨越 await。
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    tokens: Mutex<u32>,
}

impl TokenBucket {
    /// 创建满桶
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            tokens: Mutex::new(capacity),
        }
    }

    /// 创建指定初始令牌数的桶（超出容量按容量计）
    pub fn with_tokens(capacity: u32, tokens: u32) -> Self {
        Self {
            capacity,
            tokens: Mutex::new(tokens.min(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, u32> {
        // 临界区内没有可能 panic 的操作，中毒时计数仍然有效
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 尝试获取一个令牌（非阻塞）
    pub fn try_consume(&self) -> bool {
        let mut tokens = self.lock();
        if *tokens > 0 {
            *tokens -= 1;
            debug!(remaining = *tokens, "Token taken");
            true
        } else {
            debug!("No tokens left");
            false
        }
    }

    /// 补充一个令牌，返回是否实际补充
    pub fn refill_tick(&self) -> bool {
        let mut tokens = self.lock();
        if *tokens < self.capacity {
            *tokens += 1;
            debug!(tokens = *tokens, "Added token to bucket");
            true
        } else {
            false
        }
    }

    /// 当前可用令牌数
    pub fn available(&self) -> u32 {
        *self.lock()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
