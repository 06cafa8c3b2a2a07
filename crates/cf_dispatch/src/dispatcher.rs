// crates/cf_dispatch/src/dispatcher.rs

//! 调用分发门面
//!
//! [`Dispatcher`] 按 [`TargetAddress`] 的执行位置选择通道：
//!
//! | 位置 | 通道 |
//! |------|------|
//! | `Local` | 本进程的 [`SignalProcessor`] |
//! | `Remote(endpoint)` | 以端点名注册的 [`RemoteCaller`] |
//! | `Workers` | [`WorkerFanOut`]，结果按 `rank0`、`rank1`… 合并为子帧 |
//!
//! 远端返回的错误保持原始变体。

use crate::client::RemoteClient;
use crate::events::EventDispatcher;
use crate::fanout::FanOutManager;
use crate::message::{Call, Locus, Reply, TargetAddress};
use crate::processor::SignalProcessor;
use crate::transport::{GroupCommunicator, Transport};
use cf_component::ComponentTree;
use cf_config::ArgumentFrame;
use cf_foundation::{CfError, CfResult};
use std::collections::HashMap;
use std::sync::Arc;

/// 远程调用通道
pub trait RemoteCaller: Send + Sync {
    /// 发出调用并等待应答
    fn call_remote(&self, call: Call) -> CfResult<Reply>;
}

impl<T: Transport + 'static> RemoteCaller for RemoteClient<T> {
    fn call_remote(&self, call: Call) -> CfResult<Reply> {
        self.call(call)
    }
}

/// 扇出通道
pub trait WorkerFanOut: Send + Sync {
    /// 工作者数量
    fn workers(&self) -> usize;

    /// 广播调用并汇总结果
    fn fan_out_call(&self, call: &Call) -> CfResult<Vec<ArgumentFrame>>;
}

impl<G: GroupCommunicator> WorkerFanOut for FanOutManager<G> {
    fn workers(&self) -> usize {
        self.size()
    }

    fn fan_out_call(&self, call: &Call) -> CfResult<Vec<ArgumentFrame>> {
        self.call(call)
    }
}

/// 调用分发器
pub struct Dispatcher {
    processor: SignalProcessor,
    remotes: HashMap<String, Box<dyn RemoteCaller>>,
    fanout: Option<Box<dyn WorkerFanOut>>,
}

impl Dispatcher {
    /// 以处理线程创建分发器
    pub fn new(processor: SignalProcessor) -> Self {
        Self {
            processor,
            remotes: HashMap::new(),
            fanout: None,
        }
    }

    /// 注册远程端点，同名端点被替换
    pub fn with_remote(mut self, endpoint: impl Into<String>, caller: impl RemoteCaller + 'static) -> Self {
        let endpoint = endpoint.into();
        if self.remotes.insert(endpoint.clone(), Box::new(caller)).is_some() {
            tracing::warn!(endpoint = %endpoint, "remote endpoint replaced");
        }
        self
    }

    /// 设置扇出通道
    pub fn with_fan_out(mut self, fanout: impl WorkerFanOut + 'static) -> Self {
        self.fanout = Some(Box::new(fanout));
        self
    }

    /// 本地处理线程
    pub fn processor(&self) -> &SignalProcessor {
        &self.processor
    }

    /// 事件分发器
    pub fn events(&self) -> &Arc<EventDispatcher> {
        self.processor.events()
    }

    /// 已注册的远程端点
    pub fn endpoints(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.remotes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 向目标发出信号
    pub fn dispatch(&self, target: TargetAddress, signal: &str, args: ArgumentFrame) -> CfResult<ArgumentFrame> {
        self.dispatch_call(Call::new(target, signal, args))
    }

    /// 分发一条调用
    pub fn dispatch_call(&self, call: Call) -> CfResult<ArgumentFrame> {
        tracing::debug!(call_id = %call.id, target = %call.target, signal = %call.signal, "dispatching");
        match &call.target.locus {
            Locus::Local => self.processor.call(call)?.into_result(),
            Locus::Remote(endpoint) => {
                let caller = self
                    .remotes
                    .get(endpoint)
                    .ok_or_else(|| CfError::transport(format!("未知的远程端点 '{}'", endpoint)))?;
                caller.call_remote(call)?.into_result()
            }
            Locus::Workers => {
                let fanout = self
                    .fanout
                    .as_ref()
                    .ok_or_else(|| CfError::transport("未配置工作者组"))?;
                let frames = fanout.fan_out_call(&call)?;
                let mut merged = ArgumentFrame::new();
                for (rank, frame) in frames.into_iter().enumerate() {
                    merged.insert_map(&format!("rank{}", rank), frame);
                }
                Ok(merged)
            }
        }
    }

    /// 停止处理线程并取回本地组件树
    pub fn shutdown(self) -> CfResult<ComponentTree> {
        self.processor.shutdown()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("processor", &self.processor)
            .field("endpoints", &self.endpoints())
            .field("workers", &self.fanout.as_ref().map(|f| f.workers()))
            .finish()
    }
}
