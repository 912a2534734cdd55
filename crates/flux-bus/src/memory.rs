use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::error::{BusError, Result};
use crate::transport::{Delivery, Transport, TransportEvent};

struct BrokerState {
    available: bool,
    fail_next_connects: u32,
    destinations: HashMap<String, broadcast::Sender<Vec<u8>>>,
}

struct BrokerInner {
    state: Mutex<BrokerState>,
    generation: watch::Sender<u64>,
    capacity: usize,
    connect_attempts: AtomicU32,
}

/// 进程内消息代理
///
/// 每个目的地一个广播通道。可以模拟代理不可用、连接失败和连接断开，
/// 用于测试和本地演练。
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    pub fn new(capacity: usize) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(BrokerInner {
                state: Mutex::new(BrokerState {
                    available: true,
                    fail_next_connects: 0,
                    destinations: HashMap::new(),
                }),
                generation,
                capacity,
                connect_attempts: AtomicU32::new(0),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self, destination: &str) -> broadcast::Sender<Vec<u8>> {
        self.state()
            .destinations
            .entry(destination.to_string())
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .clone()
    }

    /// 创建连接到此代理的传输层
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            broker: self.clone(),
            connected: false,
            generation: None,
            subscription: None,
        }
    }

    /// 设置代理是否可用；不可用时断开所有连接
    pub fn set_available(&self, available: bool) {
        self.state().available = available;
        if !available {
            self.drop_connections();
        }
    }

    /// 接下来的 n 次连接尝试失败
    pub fn fail_next_connects(&self, n: u32) {
        self.state().fail_next_connects = n;
    }

    /// 断开所有现有连接
    pub fn drop_connections(&self) {
        self.inner.generation.send_modify(|g| *g += 1);
    }

    /// 已发生的连接尝试次数
    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// 直接发布到目的地，返回接收者数量
    pub fn publish(&self, destination: &str, payload: Vec<u8>) -> usize {
        self.sender(destination).send(payload).unwrap_or(0)
    }

    /// 直接订阅目的地（测试观察用）
    pub fn subscribe(&self, destination: &str) -> broadcast::Receiver<Vec<u8>> {
        self.sender(destination).subscribe()
    }

    fn try_connect(&self) -> Result<watch::Receiver<u64>> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        if !state.available {
            return Err(BusError::Connect("broker unavailable".to_string()));
        }
        if state.fail_next_connects > 0 {
            state.fail_next_connects -= 1;
            return Err(BusError::Connect("connection refused".to_string()));
        }
        drop(state);

        let mut rx = self.inner.generation.subscribe();
        rx.borrow_and_update();
        Ok(rx)
    }

    fn is_available(&self) -> bool {
        self.state().available
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// 进程内传输层
pub struct MemoryTransport {
    broker: MemoryBroker,
    connected: bool,
    generation: Option<watch::Receiver<u64>>,
    subscription: Option<(String, broadcast::Receiver<Vec<u8>>)>,
}

impl MemoryTransport {
    fn mark_disconnected(&mut self) {
        self.connected = false;
        self.generation = None;
        self.subscription = None;
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&mut self) -> Result<()> {
        let generation = self.broker.try_connect()?;
        self.generation = Some(generation);
        self.connected = true;
        self.subscription = None;
        Ok(())
    }

    async fn subscribe(&mut self, destination: &str) -> Result<()> {
        if !self.connected {
            return Err(BusError::NotConnected);
        }
        let rx = self.broker.subscribe(destination);
        self.subscription = Some((destination.to_string(), rx));
        debug!(destination = %destination, "Subscribed (memory)");
        Ok(())
    }

    async fn publish(&mut self, destination: &str, payload: Vec<u8>) -> Result<()> {
        let dropped = self
            .generation
            .as_ref()
            .map_or(true, |g| g.has_changed().unwrap_or(true));
        if !self.connected || dropped || !self.broker.is_available() {
            self.mark_disconnected();
            return Err(BusError::Publish {
                destination: destination.to_string(),
                reason: "not connected".to_string(),
            });
        }
        // 没有订阅者时消息直接丢弃
        let receivers = self.broker.publish(destination, payload);
        debug!(destination = %destination, receivers, "Published (memory)");
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        if !self.connected {
            return TransportEvent::Disconnected("not connected".to_string());
        }

        loop {
            let Some(generation) = self.generation.as_mut() else {
                self.mark_disconnected();
                return TransportEvent::Disconnected("not connected".to_string());
            };

            let event = match self.subscription.as_mut() {
                Some((destination, rx)) => {
                    tokio::select! {
                        _ = generation.changed() => None,
                        received = rx.recv() => match received {
                            Ok(payload) => Some(Ok(Delivery {
                                destination: destination.clone(),
                                payload,
                            })),
                            Err(broadcast::error::RecvError::Lagged(n)) => Some(Err(n)),
                            Err(broadcast::error::RecvError::Closed) => None,
                        },
                    }
                }
                None => {
                    let _ = generation.changed().await;
                    None
                }
            };

            match event {
                Some(Ok(delivery)) => return TransportEvent::Message(delivery),
                Some(Err(skipped)) => {
                    warn!(skipped, "Memory subscriber lagged, messages dropped");
                }
                None => {
                    self.mark_disconnected();
                    return TransportEvent::Disconnected("connection dropped".to_string());
                }
            }
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.mark_disconnected();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
