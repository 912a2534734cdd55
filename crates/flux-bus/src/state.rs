/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// 已连接，尚未订阅（仅发布的客户端停留在此状态）
    Connected,
    /// 已订阅，只有此状态下处理消息
    Subscribed,
}

/// 驱动状态迁移的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// 开始连接
    Connect,
    /// 传输层连接成功
    Connected,
    /// 订阅成功
    Subscribed,
    /// 连接断开
    Lost,
    /// 重连次数耗尽
    GaveUp,
    /// 主动关闭
    Closed,
}

impl ConnectionStatus {
    /// 状态迁移；不合法的事件保持原状态
    pub fn on(self, event: ConnectionEvent) -> ConnectionStatus {
        use ConnectionEvent as E;
        use ConnectionStatus as S;

        match (self, event) {
            (_, E::Closed) => S::Disconnected,
            (S::Disconnected, E::Lost) => S::Disconnected,
            (_, E::Lost) => S::Connecting,
            (S::Disconnected, E::Connect) => S::Connecting,
            (S::Connecting, E::Connected) => S::Connected,
            (S::Connecting, E::GaveUp) => S::Disconnected,
            (S::Connected, E::Subscribed) => S::Subscribed,
            (state, _) => state,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected | ConnectionStatus::Subscribed)
    }

    pub fn can_process_messages(&self) -> bool {
        matches!(self, ConnectionStatus::Subscribed)
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Disconnected
    }
}
