use thiserror::Error;

/// 消息总线错误类型
#[derive(Error, Debug)]
pub enum BusError {
    /// 连接失败
    #[error("Connection failed: {0}")]
    Connect(String),

    /// 重连次数耗尽
    #[error("Gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// 订阅失败
    #[error("Subscribe to {destination} failed: {reason}")]
    Subscribe { destination: String, reason: String },

    /// 发布失败
    #[error("Publish to {destination} failed: {reason}")]
    Publish { destination: String, reason: String },

    /// 未连接
    #[error("Not connected")]
    NotConnected,

    /// 收到关闭请求
    #[error("Shutdown requested")]
    Cancelled,

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BusError {
    /// 是否为致命错误（进程无法继续工作）
    pub fn is_fatal(&self) -> bool {
        matches!(self, BusError::ReconnectExhausted { .. })
    }
}

/// 消息总线结果类型
pub type Result<T> = std::result::Result<T, BusError>;
