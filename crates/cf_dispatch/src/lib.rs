// crates/cf_dispatch/src/lib.rs

//! CF Kernel Dispatch Layer (Layer 4)
//!
//! 分发层，负责把信号调用送到目标组件所在的位置并带回结果。
//!
//! # 模块概览
//!
//! - [`message`]: 调用 `Call`、应答 `Reply` 与调用ID
//! - [`codec`]: 带协议版本的 bincode 编码
//! - [`transport`]: 传输抽象与进程内实现（回环、工作者组）
//! - [`server`]: 本地分发 `dispatch_local` 与服务端 `SignalServer`
//! - [`client`]: 远程客户端 `RemoteClient`，按调用ID关联应答
//! - [`fanout`]: 扇出管理器 `FanOutManager`
//! - [`processor`]: 独占组件树的处理线程 `SignalProcessor`
//! - [`dispatcher`]: 按执行位置路由的门面 `Dispatcher`
//! - [`events`]: 调用生命周期事件
//!
//! # 线程模型
//!
//! 每棵组件树只有一个写者：处理线程或工作者线程。其他线程只能通过
//! 分发访问组件树。扇出等待是唯一带超时的阻塞点。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod codec;
pub mod dispatcher;
pub mod events;
pub mod fanout;
pub mod message;
pub mod processor;
pub mod server;
pub mod transport;

/// 层级标识
pub const LAYER: u8 = 4;

pub use client::{PendingCall, RemoteClient};
pub use codec::{decode_call, decode_reply, encode_call, encode_reply, PROTOCOL_VERSION};
pub use dispatcher::{Dispatcher, RemoteCaller, WorkerFanOut};
pub use events::{
    DispatchEvent, EventDispatcher, EventKind, EventListener, Interest, LoggingListener,
    SubscriptionId,
};
pub use fanout::{FanOutManager, FanOutReport};
pub use message::{Call, CallId, Locus, Outcome, Reply, TargetAddress};
pub use processor::SignalProcessor;
pub use server::{dispatch_local, ReplyCache, SignalServer};
pub use transport::{loopback_pair, GroupCommunicator, LocalWorkerGroup, LoopbackEndpoint, Transport};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::dispatcher::Dispatcher;
    pub use crate::events::{DispatchEvent, EventDispatcher, Interest};
    pub use crate::message::{Call, CallId, Locus, Reply, TargetAddress};
    pub use crate::processor::SignalProcessor;
    pub use crate::transport::{GroupCommunicator, Transport};
    pub use cf_component::prelude::*;
}
