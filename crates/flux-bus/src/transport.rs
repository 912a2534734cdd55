use async_trait::async_trait;

use crate::error::Result;

/// 收到的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub destination: String,
    pub payload: Vec<u8>,
}

/// 传输层事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(Delivery),
    Disconnected(String),
}

/// 消息总线传输层 trait
///
/// 传输层只负责单次连接；重连、退避和重新订阅由 [`crate::BusClient`] 负责。
#[async_trait]
pub trait Transport: Send {
    /// 建立连接
    async fn connect(&mut self) -> Result<()>;

    /// 订阅目的地
    async fn subscribe(&mut self, destination: &str) -> Result<()>;

    /// 发布消息
    async fn publish(&mut self, destination: &str, payload: Vec<u8>) -> Result<()>;

    /// 等待下一条消息或断开事件
    async fn next_event(&mut self) -> TransportEvent;

    /// 断开连接
    async fn disconnect(&mut self) -> Result<()>;

    /// 用于日志的地址描述
    fn describe(&self) -> String;
}

/// 运行时选择传输层
#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn connect(&mut self) -> Result<()> {
        (**self).connect().await
    }

    async fn subscribe(&mut self, destination: &str) -> Result<()> {
        (**self).subscribe(destination).await
    }

    async fn publish(&mut self, destination: &str, payload: Vec<u8>) -> Result<()> {
        (**self).publish(destination, payload).await
    }

    async fn next_event(&mut self) -> TransportEvent {
        (**self).next_event().await
    }

    async fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
