// crates/cf_dispatch/src/events.rs

//! 分发事件
//!
//! 调用生命周期以结构化事件的形式发布。订阅可以限定到某一类事件或
//! 单个调用ID，按调用订阅在该调用结束时自动注销。[`LoggingListener`]
//! 把事件转发到 tracing。

use crate::message::CallId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 分发事件
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// 调用已发出
    CallDispatched {
        /// 调用ID
        call_id: CallId,
        /// 目标描述
        target: String,
        /// 信号名
        signal: String,
        /// 时间戳
        at: DateTime<Utc>,
    },
    /// 调用成功完成
    CallCompleted {
        /// 调用ID
        call_id: CallId,
        /// 耗时 (毫秒)
        elapsed_ms: u64,
        /// 时间戳
        at: DateTime<Utc>,
    },
    /// 调用失败
    CallFailed {
        /// 调用ID
        call_id: CallId,
        /// 错误信息
        error: String,
        /// 时间戳
        at: DateTime<Utc>,
    },
    /// 扇出调用结束
    FanOutCompleted {
        /// 调用ID
        call_id: CallId,
        /// 工作者数量
        workers: usize,
        /// 失败的 rank
        failed_ranks: Vec<usize>,
        /// 超时未应答的 rank
        missing_ranks: Vec<usize>,
        /// 时间戳
        at: DateTime<Utc>,
    },
    /// 丢弃了无法匹配的应答
    ReplyDropped {
        /// 应答中的调用ID
        call_id: CallId,
        /// 原因
        reason: String,
        /// 时间戳
        at: DateTime<Utc>,
    },
}
/// 事件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// 调用已发出
    Dispatched,
    /// 调用成功
    Completed,
    /// 调用失败
    Failed,
    /// 扇出结束
    FanOut,
    /// 应答被丢弃
    Dropped,
}

impl DispatchEvent {
    /// 获取事件对应的调用ID
    pub fn call_id(&self) -> CallId {
        match self {
            Self::CallDispatched { call_id, .. }
            | Self::CallCompleted { call_id, .. }
            | Self::CallFailed { call_id, .. }
            | Self::FanOutCompleted { call_id, .. }
            | Self::ReplyDropped { call_id, .. } => *call_id,
        }
    }

    /// 事件类别
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CallDispatched { .. } => EventKind::Dispatched,
            Self::CallCompleted { .. } => EventKind::Completed,
            Self::CallFailed { .. } => EventKind::Failed,
            Self::FanOutCompleted { .. } => EventKind::FanOut,
            Self::ReplyDropped { .. } => EventKind::Dropped,
        }
    }

    /// 是否为调用的最后一个事件
    ///
    /// 扇出调用以 `FanOutCompleted` 结束，其余调用以完成或失败结束。
    /// 丢弃事件不结束任何调用。
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind(),
            EventKind::Completed | EventKind::Failed | EventKind::FanOut
        )
    }

    /// 事件时间戳
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::CallDispatched { at, .. }
            | Self::CallCompleted { at, .. }
            | Self::CallFailed { at, .. }
            | Self::FanOutCompleted { at, .. }
            | Self::ReplyDropped { at, .. } => *at,
        }
    }
}

// ============================================================
// 监听器
// ============================================================

/// 事件监听器
///
/// 闭包 `Fn(&DispatchEvent)` 自动实现此 trait。
pub trait EventListener: Send + Sync {
    /// 处理事件
    fn on_event(&self, event: &DispatchEvent);
}

impl<F> EventListener for F
where
    F: Fn(&DispatchEvent) + Send + Sync,
{
    fn on_event(&self, event: &DispatchEvent) {
        self(event)
    }
}

/// 把事件写入 tracing 的监听器
pub struct LoggingListener {
    prefix: String,
    verbose: bool,
}

impl LoggingListener {
    /// 创建日志监听器，默认只记录失败、丢弃与扇出汇总
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            verbose: false,
        }
    }

    /// 同时记录发出与成功完成的调用
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl EventListener for LoggingListener {
    fn on_event(&self, event: &DispatchEvent) {
        let prefix = self.prefix.as_str();
        match event {
            DispatchEvent::CallFailed { call_id, error, .. } => {
                tracing::warn!(%call_id, "{}: call failed: {}", prefix, error);
            }
            DispatchEvent::ReplyDropped { call_id, reason, .. } => {
                tracing::warn!(%call_id, "{}: reply dropped: {}", prefix, reason);
            }
            DispatchEvent::FanOutCompleted {
                call_id,
                workers,
                failed_ranks,
                missing_ranks,
                ..
            } => {
                tracing::info!(
                    %call_id, workers, ?failed_ranks, ?missing_ranks,
                    "{}: fan-out finished", prefix
                );
            }
            DispatchEvent::CallDispatched { call_id, target, signal, .. } if self.verbose => {
                tracing::info!(%call_id, "{}: {} -> '{}'", prefix, target, signal);
            }
            DispatchEvent::CallCompleted { call_id, elapsed_ms, .. } if self.verbose => {
                tracing::info!(%call_id, elapsed_ms, "{}: call completed", prefix);
            }
            _ => {}
        }
    }
}

// ============================================================
// 订阅
// ============================================================

/// 订阅范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// 所有事件
    All,
    /// 某一类事件
    Kind(EventKind),
    /// 单个调用的事件；调用结束后订阅自动注销
    Call(CallId),
}

impl Interest {
    fn matches(&self, event: &DispatchEvent) -> bool {
        match self {
            Self::All => true,
            Self::Kind(kind) => event.kind() == *kind,
            Self::Call(id) => event.call_id() == *id,
        }
    }
}

/// 订阅句柄，用于注销
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    interest: Interest,
    listener: Arc<dyn EventListener>,
}

/// 事件分发器
///
/// 监听器在锁外调用，监听器内部可以再订阅或注销。
#[derive(Default)]
pub struct EventDispatcher {
    next_id: AtomicU64,
    subscriptions: RwLock<Vec<Subscription>>,
}

impl EventDispatcher {
    /// 创建事件分发器
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建共享分发器
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// 订阅事件
    pub fn subscribe(&self, interest: Interest, listener: Arc<dyn EventListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription {
            id,
            interest,
            listener,
        });
        tracing::trace!(?interest, "dispatch subscription {} added", id.0);
        id
    }

    /// 以闭包订阅事件
    pub fn subscribe_fn<F>(&self, interest: Interest, handler: F) -> SubscriptionId
    where
        F: Fn(&DispatchEvent) + Send + Sync + 'static,
    {
        self.subscribe(interest, Arc::new(handler))
    }

    /// 跟踪单个调用，直到它的最后一个事件
    pub fn watch_call<F>(&self, call_id: CallId, handler: F) -> SubscriptionId
    where
        F: Fn(&DispatchEvent) + Send + Sync + 'static,
    {
        self.subscribe_fn(Interest::Call(call_id), handler)
    }

    /// 注销订阅，返回订阅是否仍存在
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// 分发事件
    pub fn emit(&self, event: DispatchEvent) {
        let call_id = event.call_id();
        let targets: Vec<Arc<dyn EventListener>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.interest.matches(&event))
            .map(|s| Arc::clone(&s.listener))
            .collect();

        for listener in &targets {
            listener.on_event(&event);
        }

        if event.is_terminal() {
            self.subscriptions
                .write()
                .retain(|s| s.interest != Interest::Call(call_id));
        }
    }

    /// 当前订阅数量
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}
