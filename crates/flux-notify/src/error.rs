use thiserror::Error;

/// 通知错误类型
#[derive(Error, Debug)]
pub enum NotifyError {
    /// 邮件地址无效
    #[error("Invalid address: {0}")]
    Address(String),

    /// 消息构建失败
    #[error("Failed to build message: {0}")]
    Build(String),

    /// 发送失败
    #[error("Transport error: {0}")]
    Transport(String),

    /// 模板注册或渲染失败
    #[error("Template error: {0}")]
    Template(String),

    /// HTTP 错误
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// 无法解析的通知消息
#[derive(Error, Debug)]
#[error("Malformed notification: {0}")]
pub struct ParseError(pub String);

pub type Result<T> = std::result::Result<T, NotifyError>;
