// crates/cf_dispatch/src/client.rs

//! 远程调用客户端
//!
//! 一个后台读线程接收应答，并按 [`CallId`] 交给等待中的调用方。
//! 多个调用可以同时在途，应答到达顺序不限。无法匹配的应答（未知ID或
//! 重复应答）被丢弃并发布 [`DispatchEvent::ReplyDropped`]。
//!
//! 连接断开时，所有在途调用立即以 `Transport` 错误结束。

use crate::codec::{decode_reply, encode_call};
use crate::events::{DispatchEvent, EventDispatcher};
use crate::message::{Call, CallId, Outcome, Reply};
use crate::transport::Transport;
use cf_foundation::{CfError, CfResult};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 读线程轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

type PendingMap = Arc<Mutex<HashMap<CallId, (Sender<CfResult<Reply>>, Instant)>>>;

/// 远程调用客户端
pub struct RemoteClient<T: Transport + 'static> {
    endpoint: String,
    transport: Arc<T>,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    events: Arc<EventDispatcher>,
}

impl<T: Transport + 'static> RemoteClient<T> {
    /// 连接到端点
    pub fn connect(endpoint: impl Into<String>, transport: T) -> CfResult<Self> {
        Self::with_events(endpoint, transport, EventDispatcher::shared())
    }

    /// 连接到端点，事件发布到给定的分发器
    pub fn with_events(
        endpoint: impl Into<String>,
        transport: T,
        events: Arc<EventDispatcher>,
    ) -> CfResult<Self> {
        let endpoint = endpoint.into();
        let transport = Arc::new(transport);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let running = Arc::new(AtomicBool::new(true));

        let reader = {
            let transport = Arc::clone(&transport);
            let pending = Arc::clone(&pending);
            let connected = Arc::clone(&connected);
            let running = Arc::clone(&running);
            let events = Arc::clone(&events);
            let name = endpoint.clone();
            thread::Builder::new()
                .name(format!("cf-client-{}", endpoint))
                .spawn(move || {
                    read_loop(&name, transport.as_ref(), &pending, &connected, &running, &events);
                    connected.store(false, Ordering::SeqCst);
                })?
        };

        tracing::info!(endpoint = %endpoint, "remote client connected");
        Ok(Self {
            endpoint,
            transport,
            pending,
            connected,
            running,
            reader: Some(reader),
            events,
        })
    }

    /// 端点名称
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 连接是否仍然可用
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// 在途调用数量
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// 事件分发器
    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    /// 发出调用，不等待应答
    pub fn call_async(&self, call: Call) -> CfResult<PendingCall> {
        if !self.is_connected() {
            return Err(CfError::transport(format!("端点 '{}' 已断开", self.endpoint)));
        }
        let bytes = encode_call(&call)?;
        let (tx, rx) = mpsc::channel();
        self.pending.lock().insert(call.id, (tx, Instant::now()));
        // 读线程先置断开标志再清空在途表
        if !self.is_connected() {
            self.pending.lock().remove(&call.id);
            return Err(CfError::transport(format!("端点 '{}' 已断开", self.endpoint)));
        }

        self.events.emit(DispatchEvent::CallDispatched {
            call_id: call.id,
            target: call.target.to_string(),
            signal: call.signal.clone(),
            at: Utc::now(),
        });

        if let Err(err) = self.transport.send(bytes) {
            self.pending.lock().remove(&call.id);
            return Err(err);
        }
        Ok(PendingCall {
            id: call.id,
            rx,
            pending: Arc::clone(&self.pending),
        })
    }

    /// 发出调用并等待应答
    pub fn call(&self, call: Call) -> CfResult<Reply> {
        self.call_async(call)?.wait()
    }
}

impl<T: Transport + 'static> Drop for RemoteClient<T> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        let cause = CfError::transport("客户端已关闭");
        fail_all(&self.pending, &cause, &self.events);
    }
}

impl<T: Transport + 'static> std::fmt::Debug for RemoteClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn read_loop<T: Transport + ?Sized>(
    endpoint: &str,
    transport: &T,
    pending: &PendingMap,
    connected: &AtomicBool,
    running: &AtomicBool,
    events: &EventDispatcher,
) {
    while running.load(Ordering::SeqCst) {
        let bytes = match transport.recv_timeout(POLL_INTERVAL) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(endpoint, "connection lost: {}", err);
                connected.store(false, Ordering::SeqCst);
                fail_all(pending, &err, events);
                return;
            }
        };

        let reply = match decode_reply(&bytes) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(endpoint, "discarding undecodable reply: {}", err);
                continue;
            }
        };

        let entry = pending.lock().remove(&reply.call_id);
        match entry {
            Some((tx, started)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let event = match &reply.outcome {
                    Outcome::Success(_) => DispatchEvent::CallCompleted {
                        call_id: reply.call_id,
                        elapsed_ms,
                        at: Utc::now(),
                    },
                    Outcome::Failure(err) => DispatchEvent::CallFailed {
                        call_id: reply.call_id,
                        error: err.to_string(),
                        at: Utc::now(),
                    },
                };
                events.emit(event);
                // 调用方可能已超时放弃
                let _ = tx.send(Ok(reply));
            }
            None => {
                tracing::warn!(endpoint, call_id = %reply.call_id, "reply matches no pending call");
                events.emit(DispatchEvent::ReplyDropped {
                    call_id: reply.call_id,
                    reason: "no pending call with this id".to_string(),
                    at: Utc::now(),
                });
            }
        }
    }
}

fn fail_all(pending: &PendingMap, cause: &CfError, events: &EventDispatcher) {
    let drained: Vec<_> = pending.lock().drain().collect();
    for (call_id, (tx, _)) in drained {
        let err = CfError::transport(format!("连接断开: {}", cause));
        events.emit(DispatchEvent::CallFailed {
            call_id,
            error: err.to_string(),
            at: Utc::now(),
        });
        let _ = tx.send(Err(err));
    }
}

// =============================================================================
// PendingCall
// =============================================================================

/// 在途调用
pub struct PendingCall {
    id: CallId,
    rx: Receiver<CfResult<Reply>>,
    pending: PendingMap,
}

impl PendingCall {
    /// 调用ID
    pub fn id(&self) -> CallId {
        self.id
    }

    /// 阻塞等待应答
    pub fn wait(self) -> CfResult<Reply> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(CfError::transport("客户端已关闭")),
        }
    }

    /// 限时等待应答，超时后放弃该调用
    pub fn wait_timeout(self, timeout: Duration) -> CfResult<Reply> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                self.pending.lock().remove(&self.id);
                Err(CfError::transport(format!(
                    "调用 {} 在 {} ms 内未收到应答",
                    self.id,
                    timeout.as_millis()
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Err(CfError::transport("客户端已关闭")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_call, encode_reply};
    use crate::events::{EventKind, Interest};
    use crate::transport::loopback_pair;
    use cf_config::ArgumentFrame;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_call_routed_by_id() {
        let (client_end, server_end) = loopback_pair();
        let client = RemoteClient::connect("node", client_end).unwrap();

        let first = client
            .call_async(Call::local("/a", "x", ArgumentFrame::new()).unwrap())
            .unwrap();
        let second = client
            .call_async(Call::local("/b", "y", ArgumentFrame::new()).unwrap())
            .unwrap();
        assert_eq!(client.pending_count(), 2);

        let calls: Vec<Call> = (0..2)
            .map(|_| decode_call(&server_end.recv().unwrap()).unwrap())
            .collect();
        // 逆序应答
        for call in calls.iter().rev() {
            let frame = ArgumentFrame::new().with("signal", call.signal.clone());
            let reply = Reply::success(call.id, call.target.path.to_string(), frame);
            server_end.send(encode_reply(&reply).unwrap()).unwrap();
        }

        let a = first.wait().unwrap().into_result().unwrap();
        let b = second.wait().unwrap().into_result().unwrap();
        assert_eq!(a.value::<String>("signal").unwrap(), "x");
        assert_eq!(b.value::<String>("signal").unwrap(), "y");
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_unknown_reply_dropped() {
        let (client_end, server_end) = loopback_pair();
        let events = EventDispatcher::shared();
        let dropped = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&dropped);
        events.subscribe_fn(Interest::Kind(EventKind::Dropped), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let client = RemoteClient::with_events("node", client_end, events).unwrap();

        let stray = Reply::success(CallId::new(), "cpath:/", ArgumentFrame::new());
        server_end.send(encode_reply(&stray).unwrap()).unwrap();

        let pending = client
            .call_async(Call::local("/", "x", ArgumentFrame::new()).unwrap())
            .unwrap();
        let call = decode_call(&server_end.recv().unwrap()).unwrap();
        let reply = Reply::success(call.id, "cpath:/", ArgumentFrame::new());
        server_end.send(encode_reply(&reply).unwrap()).unwrap();
        server_end.send(encode_reply(&reply).unwrap()).unwrap();

        assert!(pending.wait().unwrap().is_success());
        let deadline = Instant::now() + Duration::from_secs(2);
        while dropped.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 2);
        assert!(client.is_connected());
    }

    #[test]
    fn test_wait_timeout_abandons_call() {
        let (client_end, _server_end) = loopback_pair();
        let client = RemoteClient::connect("node", client_end).unwrap();
        let pending = client
            .call_async(Call::local("/", "x", ArgumentFrame::new()).unwrap())
            .unwrap();
        let err = pending.wait_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(err.is_transport());
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_disconnect_fails_pending() {
        let (client_end, server_end) = loopback_pair();
        let client = RemoteClient::connect("node", client_end).unwrap();
        let pending = client
            .call_async(Call::local("/", "x", ArgumentFrame::new()).unwrap())
            .unwrap();
        drop(server_end);

        assert!(pending.wait().unwrap_err().is_transport());
        // 读线程退出后不再接受新调用
        let deadline = Instant::now() + Duration::from_secs(2);
        while client.is_connected() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(client
            .call(Call::local("/", "x", ArgumentFrame::new()).unwrap())
            .unwrap_err()
            .is_transport());
    }
}
