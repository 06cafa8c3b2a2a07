// crates/cf_dispatch/src/transport.rs

//! 传输抽象
//!
//! - [`Transport`]: 点对点的字节消息通道
//! - [`GroupCommunicator`]: 一对多的组通信（广播 + 收集）
//!
//! 进程内实现：
//!
//! - [`loopback_pair`]: 一对互相连接的端点
//! - [`LocalWorkerGroup`]: N 个工作者线程，每个持有自己的组件树并
//!   通过 [`SignalServer`] 服务调用

use crate::server::SignalServer;
use cf_component::ComponentTree;
use cf_config::KernelConfig;
use cf_foundation::{CfError, CfResult};
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 点对点传输
pub trait Transport: Send + Sync {
    /// 发送一条消息
    fn send(&self, bytes: Vec<u8>) -> CfResult<()>;

    /// 阻塞接收一条消息，对端关闭时返回 `Transport` 错误
    fn recv(&self) -> CfResult<Vec<u8>>;

    /// 带超时接收，超时返回 `Ok(None)`
    fn recv_timeout(&self, timeout: Duration) -> CfResult<Option<Vec<u8>>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, bytes: Vec<u8>) -> CfResult<()> {
        (**self).send(bytes)
    }

    fn recv(&self) -> CfResult<Vec<u8>> {
        (**self).recv()
    }

    fn recv_timeout(&self, timeout: Duration) -> CfResult<Option<Vec<u8>>> {
        (**self).recv_timeout(timeout)
    }
}

/// 组通信
pub trait GroupCommunicator: Send + Sync {
    /// 组内工作者数量
    fn size(&self) -> usize;

    /// 向所有工作者发送同一条消息
    fn broadcast(&self, bytes: &[u8]) -> CfResult<()>;

    /// 在截止时间前收取任一工作者的一条消息，返回 `(rank, bytes)`；
    /// 到达截止时间返回 `Ok(None)`
    fn collect(&self, deadline: Instant) -> CfResult<Option<(usize, Vec<u8>)>>;
}

fn recv_with_timeout<T>(rx: &Receiver<T>, timeout: Duration) -> CfResult<Option<T>> {
    match rx.recv_timeout(timeout) {
        Ok(msg) => Ok(Some(msg)),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Err(CfError::transport("对端已关闭")),
    }
}

// =============================================================================
// Loopback
// =============================================================================

/// 进程内回环端点
pub struct LoopbackEndpoint {
    tx: Mutex<Sender<Vec<u8>>>,
    rx: Mutex<Receiver<Vec<u8>>>,
}

/// 创建一对互相连接的回环端点
pub fn loopback_pair() -> (LoopbackEndpoint, LoopbackEndpoint) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (
        LoopbackEndpoint {
            tx: Mutex::new(a_tx),
            rx: Mutex::new(a_rx),
        },
        LoopbackEndpoint {
            tx: Mutex::new(b_tx),
            rx: Mutex::new(b_rx),
        },
    )
}

impl Transport for LoopbackEndpoint {
    fn send(&self, bytes: Vec<u8>) -> CfResult<()> {
        self.tx
            .lock()
            .send(bytes)
            .map_err(|_| CfError::transport("对端已关闭，发送失败"))
    }

    fn recv(&self) -> CfResult<Vec<u8>> {
        Ok(self.rx.lock().recv()?)
    }

    fn recv_timeout(&self, timeout: Duration) -> CfResult<Option<Vec<u8>>> {
        recv_with_timeout(&*self.rx.lock(), timeout)
    }
}

// =============================================================================
// LocalWorkerGroup
// =============================================================================

/// 工作者一侧的通道：收取广播，应答时附带自己的 rank
struct WorkerLink {
    rank: usize,
    inbox: Mutex<Receiver<Vec<u8>>>,
    outbox: Mutex<Sender<(usize, Vec<u8>)>>,
}

impl Transport for WorkerLink {
    fn send(&self, bytes: Vec<u8>) -> CfResult<()> {
        self.outbox
            .lock()
            .send((self.rank, bytes))
            .map_err(|_| CfError::transport("工作者组已关闭"))
    }

    fn recv(&self) -> CfResult<Vec<u8>> {
        Ok(self.inbox.lock().recv()?)
    }

    fn recv_timeout(&self, timeout: Duration) -> CfResult<Option<Vec<u8>>> {
        recv_with_timeout(&*self.inbox.lock(), timeout)
    }
}

/// 进程内工作者组
pub struct LocalWorkerGroup {
    inboxes: Mutex<Vec<Sender<Vec<u8>>>>,
    replies: Mutex<Receiver<(usize, Vec<u8>)>>,
    handles: Vec<(usize, JoinHandle<()>)>,
    size: usize,
}

/// 关闭工作者组时等待空闲工作者退出的时长
///
/// 仍在执行处理器的工作者被分离，处理器返回后它发送应答失败并自行退出。
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

impl LocalWorkerGroup {
    /// 启动 `size` 个工作者
    ///
    /// `setup(rank)` 在调用线程上依次构建各工作者的组件树，任一失败时
    /// 已启动的工作者随组一起关闭。
    pub fn spawn<F>(size: usize, config: &KernelConfig, mut setup: F) -> CfResult<Self>
    where
        F: FnMut(usize) -> CfResult<ComponentTree>,
    {
        if size == 0 {
            return Err(CfError::invalid_argument("工作者数量必须大于 0"));
        }
        let (reply_tx, reply_rx) = mpsc::channel();
        let mut group = Self {
            inboxes: Mutex::new(Vec::with_capacity(size)),
            replies: Mutex::new(reply_rx),
            handles: Vec::with_capacity(size),
            size,
        };

        for rank in 0..size {
            let tree = setup(rank)?;
            let (inbox_tx, inbox_rx) = mpsc::channel();
            let link = WorkerLink {
                rank,
                inbox: Mutex::new(inbox_rx),
                outbox: Mutex::new(reply_tx.clone()),
            };
            let capacity = config.reply_cache_capacity;
            let handle = thread::Builder::new()
                .name(format!("cf-worker-{}", rank))
                .spawn(move || {
                    let mut server = SignalServer::new(link, tree).with_cache_capacity(capacity);
                    match server.serve() {
                        Ok(served) => tracing::debug!(rank, served, "worker stopped"),
                        Err(e) => tracing::warn!(rank, "worker stopped with error: {}", e),
                    }
                })?;
            group.inboxes.lock().push(inbox_tx);
            group.handles.push((rank, handle));
        }
        tracing::info!(size, "local worker group started");
        Ok(group)
    }
}

impl GroupCommunicator for LocalWorkerGroup {
    fn size(&self) -> usize {
        self.size
    }

    fn broadcast(&self, bytes: &[u8]) -> CfResult<()> {
        for (rank, inbox) in self.inboxes.lock().iter().enumerate() {
            inbox
                .send(bytes.to_vec())
                .map_err(|_| CfError::transport(format!("工作者 {} 已退出", rank)))?;
        }
        Ok(())
    }

    fn collect(&self, deadline: Instant) -> CfResult<Option<(usize, Vec<u8>)>> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        recv_with_timeout(&*self.replies.lock(), remaining)
    }
}

impl Drop for LocalWorkerGroup {
    fn drop(&mut self) {
        // 关闭收件箱，空闲工作者的 serve 循环随之结束
        self.inboxes.lock().clear();
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        let mut running = std::mem::take(&mut self.handles);
        loop {
            let (finished, busy): (Vec<_>, Vec<_>) =
                running.into_iter().partition(|(_, h)| h.is_finished());
            for (rank, handle) in finished {
                if handle.join().is_err() {
                    tracing::warn!(rank, "worker thread panicked");
                }
            }
            running = busy;
            if running.is_empty() || Instant::now() >= deadline {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        for (rank, _) in running {
            tracing::warn!(rank, "worker still busy at shutdown, detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_pair() {
        let (a, b) = loopback_pair();
        a.send(vec![1, 2, 3]).unwrap();
        assert_eq!(b.recv().unwrap(), vec![1, 2, 3]);
        assert_eq!(a.recv_timeout(Duration::from_millis(10)).unwrap(), None);
    }

    #[test]
    fn test_loopback_disconnect() {
        let (a, b) = loopback_pair();
        drop(b);
        assert!(a.send(vec![0]).unwrap_err().is_transport());
        assert!(a.recv().unwrap_err().is_transport());
    }

    #[test]
    fn test_shared_transport() {
        let (a, b) = loopback_pair();
        let shared = Arc::new(a);
        shared.send(vec![9]).unwrap();
        assert_eq!(b.recv().unwrap(), vec![9]);
    }
}
