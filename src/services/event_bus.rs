//! 进程内事件总线
//!
//! 轮询器是唯一发布方；每个 SSE 连接持有一个订阅。订阅者表由互斥锁
//! 串行化，投递经各订阅者的有界通道并发进行，publish 等待全部投递完成。

use crate::models::{Ups, UpsStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// 订阅者数量上限
pub const MAX_SUBSCRIBERS: usize = 100;

/// 单个订阅者的通道缓冲
const SUBSCRIBER_BUFFER: usize = 64;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    StatusChange,
    MetricsUpdate,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StatusChange => "status_change",
            EventType::MetricsUpdate => "metrics_update",
        }
    }
}

/// 总线事件
#[derive(Debug, Clone)]
pub struct UpsEvent {
    pub event_type: EventType,
    pub ups: Ups,
    pub has_low_battery: bool,
    /// 状态变化事件携带的旧状态（诊断用）
    pub previous_status: Option<UpsStatus>,
}

impl UpsEvent {
    pub fn status_change(ups: Ups, previous_status: Option<UpsStatus>) -> Self {
        let has_low_battery = ups.has_low_battery();
        Self {
            event_type: EventType::StatusChange,
            ups,
            has_low_battery,
            previous_status,
        }
    }

    pub fn metrics_update(ups: Ups) -> Self {
        let has_low_battery = ups.has_low_battery();
        Self {
            event_type: EventType::MetricsUpdate,
            ups,
            has_low_battery,
            previous_status: None,
        }
    }
}

/// 订阅失败：活跃订阅数已达上限
#[derive(Debug, thiserror::Error)]
#[error("订阅者数量达到上限 ({MAX_SUBSCRIBERS})")]
pub struct SubscriberLimitExceeded;

/// 事件总线
pub struct EventBus {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<UpsEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// 订阅总线
    ///
    /// 返回订阅 ID 和事件接收端；活跃订阅达到上限时失败。
    pub fn subscribe(
        &self,
    ) -> Result<(Uuid, mpsc::Receiver<UpsEvent>), SubscriberLimitExceeded> {
        let mut subs = self.subscribers.lock().expect("订阅者表锁中毒");
        if subs.len() >= MAX_SUBSCRIBERS {
            return Err(SubscriberLimitExceeded);
        }

        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        subs.insert(id, tx);
        Ok((id, rx))
    }

    /// 取消订阅（幂等）
    ///
    /// 移除后发送端随即关闭，订阅者不再收到新事件。
    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.lock().expect("订阅者表锁中毒").remove(&id);
    }

    /// 发布事件：并发投递到全部订阅者并等待完成
    ///
    /// 已断开的订阅者（接收端被丢弃）投递立即失败，由连接任务自行清理。
    pub async fn publish(&self, event: UpsEvent) {
        let senders: Vec<mpsc::Sender<UpsEvent>> = {
            let subs = self.subscribers.lock().expect("订阅者表锁中毒");
            subs.values().cloned().collect()
        };

        let deliveries = senders.into_iter().map(|sender| {
            let event = event.clone();
            async move {
                // 投递失败只意味着订阅者已离开
                let _ = sender.send(event).await;
            }
        });
        futures::future::join_all(deliveries).await;
    }

    /// 当前活跃订阅数
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("订阅者表锁中毒").len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
