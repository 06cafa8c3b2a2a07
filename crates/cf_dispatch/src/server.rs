// crates/cf_dispatch/src/server.rs

//! 本地分发与信号服务端
//!
//! [`dispatch_local`] 在给定的组件树上执行一次调用并生成应答，任何
//! 失败（路径、信号、处理函数）都写进应答而不是向上抛出。
//!
//! [`SignalServer`] 在一个 [`Transport`] 上循环接收调用、执行并回送应答。
//! 已处理调用的应答按 [`CallId`] 缓存，重复到达的调用直接重放缓存的
//! 应答字节，不会再次执行（至多一次语义）。

use crate::codec::{decode_call, encode_reply};
use crate::message::{Call, CallId, Reply};
use crate::transport::Transport;
use cf_component::ComponentTree;
use cf_config::{ArgumentFrame, KernelConfig};
use cf_foundation::CfResult;
use std::collections::{HashMap, VecDeque};

/// 在组件树上执行调用
pub fn dispatch_local(tree: &mut ComponentTree, call: &Call) -> Reply {
    let origin = call.target.path.to_string();
    match invoke(tree, call) {
        Ok(frame) => Reply::success(call.id, origin, frame),
        Err(err) => {
            tracing::debug!(call_id = %call.id, "call failed: {}", err);
            Reply::failure(call.id, origin, err)
        }
    }
}

fn invoke(tree: &mut ComponentTree, call: &Call) -> CfResult<ArgumentFrame> {
    let target = tree.access_component(tree.root(), &call.target.path)?;
    tree.call_signal(target, &call.signal, call.args.clone())
}

// =============================================================================
// ReplyCache
// =============================================================================

/// 按调用ID缓存已编码的应答，容量满时淘汰最早的条目
#[derive(Debug, Default)]
pub struct ReplyCache {
    capacity: usize,
    order: VecDeque<CallId>,
    entries: HashMap<CallId, Vec<u8>>,
}

impl ReplyCache {
    /// 创建缓存，容量为 0 时不缓存
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// 查找缓存的应答
    pub fn get(&self, id: &CallId) -> Option<&Vec<u8>> {
        self.entries.get(id)
    }

    /// 写入应答
    pub fn insert(&mut self, id: CallId, bytes: Vec<u8>) {
        if self.capacity == 0 || self.entries.contains_key(&id) {
            return;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(id);
        self.entries.insert(id, bytes);
    }

    /// 缓存条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// SignalServer
// =============================================================================

/// 信号服务端
pub struct SignalServer<T: Transport> {
    transport: T,
    tree: ComponentTree,
    cache: ReplyCache,
    executed: u64,
}

impl<T: Transport> SignalServer<T> {
    /// 创建服务端，使用默认配置的缓存容量
    pub fn new(transport: T, tree: ComponentTree) -> Self {
        Self::with_config(transport, tree, &KernelConfig::default())
    }

    /// 按内核配置创建服务端
    pub fn with_config(transport: T, tree: ComponentTree, config: &KernelConfig) -> Self {
        Self {
            transport,
            tree,
            cache: ReplyCache::new(config.reply_cache_capacity),
            executed: 0,
        }
    }

    /// 设置应答缓存容量
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = ReplyCache::new(capacity);
        self
    }

    /// 组件树
    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    /// 可变组件树
    pub fn tree_mut(&mut self) -> &mut ComponentTree {
        &mut self.tree
    }

    /// 取回组件树
    pub fn into_tree(self) -> ComponentTree {
        self.tree
    }

    /// 实际执行过的调用数量（不含重放）
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// 处理一条消息
    ///
    /// 无法解码的消息被记录并跳过；传输错误向上返回。
    pub fn serve_one(&mut self) -> CfResult<()> {
        let bytes = self.transport.recv()?;
        let call = match decode_call(&bytes) {
            Ok(call) => call,
            Err(err) => {
                tracing::warn!("discarding undecodable call: {}", err);
                return Ok(());
            }
        };

        if let Some(cached) = self.cache.get(&call.id) {
            tracing::debug!(call_id = %call.id, "replaying cached reply");
            return self.transport.send(cached.clone());
        }

        let reply = dispatch_local(&mut self.tree, &call);
        self.executed += 1;
        let encoded = encode_reply(&reply)?;
        self.cache.insert(call.id, encoded.clone());
        self.transport.send(encoded)
    }

    /// 循环服务直到传输关闭，返回处理的消息数
    pub fn serve(&mut self) -> CfResult<u64> {
        tracing::info!("signal server started");
        let mut handled = 0;
        loop {
            match self.serve_one() {
                Ok(()) => handled += 1,
                Err(err) if err.is_transport() => {
                    tracing::info!(handled, "signal server stopped: {}", err);
                    return Ok(handled);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
