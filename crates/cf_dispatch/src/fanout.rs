// crates/cf_dispatch/src/fanout.rs

//! 扇出调用
//!
//! 把同一条调用广播给组内全部 N 个工作者，在超时前收集应答。
//! 全部 N 个应答到齐或截止时间到达后才汇总：
//!
//! - 全部成功：返回按 rank 排列的结果帧
//! - 恰好一个工作者失败且无缺失：原样返回该错误
//! - 多个工作者失败：`Application` 错误，逐条列出各 rank 的失败信息
//! - 存在未应答的工作者：`Transport` 超时错误，附带缺失的 rank 与已知失败
//!
//! 属于其他调用的陈旧应答直接丢弃。

use crate::codec::{decode_reply, encode_call};
use crate::events::{DispatchEvent, EventDispatcher};
use crate::message::{Call, CallId, Reply};
use crate::transport::GroupCommunicator;
use cf_config::{ArgumentFrame, KernelConfig};
use cf_foundation::{CfError, CfResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 扇出管理器
pub struct FanOutManager<G: GroupCommunicator> {
    group: G,
    timeout: Duration,
    events: Arc<EventDispatcher>,
}

impl<G: GroupCommunicator> FanOutManager<G> {
    /// 创建管理器
    pub fn new(group: G, timeout: Duration) -> Self {
        Self {
            group,
            timeout,
            events: EventDispatcher::shared(),
        }
    }

    /// 按内核配置创建管理器
    pub fn with_config(group: G, config: &KernelConfig) -> Self {
        Self::new(group, config.fanout_timeout())
    }

    /// 设置事件分发器
    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = events;
        self
    }

    /// 工作者数量
    pub fn size(&self) -> usize {
        self.group.size()
    }

    /// 超时时长
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 广播调用并收集应答
    pub fn fan_out(&self, call: &Call) -> CfResult<FanOutReport> {
        let size = self.group.size();
        let bytes = encode_call(call)?;
        let deadline = Instant::now() + self.timeout;

        self.events.emit(DispatchEvent::CallDispatched {
            call_id: call.id,
            target: call.target.to_string(),
            signal: call.signal.clone(),
            at: Utc::now(),
        });
        self.group.broadcast(&bytes)?;

        let mut replies: Vec<Option<Reply>> = vec![None; size];
        let mut received = 0;
        while received < size {
            let Some((rank, bytes)) = self.group.collect(deadline)? else {
                break;
            };
            let reply = match decode_reply(&bytes) {
                Ok(reply) => reply,
                Err(err) => {
                    tracing::warn!(rank, "discarding undecodable worker reply: {}", err);
                    continue;
                }
            };
            if reply.call_id != call.id {
                self.drop_reply(reply.call_id, format!("stale reply from rank {}", rank));
                continue;
            }
            match replies.get_mut(rank) {
                Some(slot) if slot.is_none() => {
                    *slot = Some(reply);
                    received += 1;
                }
                Some(_) => {
                    self.drop_reply(reply.call_id, format!("duplicate reply from rank {}", rank));
                }
                None => {
                    self.drop_reply(reply.call_id, format!("rank {} out of range", rank));
                }
            }
        }

        let report = FanOutReport {
            call_id: call.id,
            origin: call.target.path.to_string(),
            replies,
        };
        self.events.emit(DispatchEvent::FanOutCompleted {
            call_id: call.id,
            workers: size,
            failed_ranks: report.failed_ranks(),
            missing_ranks: report.missing_ranks(),
            at: Utc::now(),
        });
        Ok(report)
    }

    /// 广播调用并汇总为单一结果
    pub fn call(&self, call: &Call) -> CfResult<Vec<ArgumentFrame>> {
        self.fan_out(call)?.into_result()
    }

    fn drop_reply(&self, call_id: CallId, reason: String) {
        tracing::debug!(call_id = %call_id, "{}", reason);
        self.events.emit(DispatchEvent::ReplyDropped {
            call_id,
            reason,
            at: Utc::now(),
        });
    }
}

impl<G: GroupCommunicator> std::fmt::Debug for FanOutManager<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutManager")
            .field("size", &self.group.size())
            .field("timeout", &self.timeout)
            .finish()
    }
}

// =============================================================================
// FanOutReport
// =============================================================================

/// 扇出结果，按 rank 排列，未应答的位置为 `None`
#[derive(Debug, Clone)]
pub struct FanOutReport {
    /// 调用ID
    pub call_id: CallId,
    /// 目标路径
    pub origin: String,
    /// 各 rank 的应答
    pub replies: Vec<Option<Reply>>,
}

impl FanOutReport {
    /// 未应答的 rank
    pub fn missing_ranks(&self) -> Vec<usize> {
        self.replies
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_none())
            .map(|(rank, _)| rank)
            .collect()
    }

    /// 失败的 rank 及其错误
    pub fn failures(&self) -> Vec<(usize, &CfError)> {
        self.replies
            .iter()
            .enumerate()
            .filter_map(|(rank, r)| r.as_ref().and_then(Reply::error).map(|e| (rank, e)))
            .collect()
    }

    /// 失败的 rank
    pub fn failed_ranks(&self) -> Vec<usize> {
        self.failures().into_iter().map(|(rank, _)| rank).collect()
    }

    /// 是否全部成功
    pub fn is_complete(&self) -> bool {
        self.replies.iter().all(|r| r.as_ref().is_some_and(Reply::is_success))
    }

    /// 汇总为单一结果
    pub fn into_result(self) -> CfResult<Vec<ArgumentFrame>> {
        let missing = self.missing_ranks();
        let failures: Vec<String> = self
            .failures()
            .into_iter()
            .map(|(rank, e)| format!("rank {}: {}", rank, e))
            .collect();

        if !missing.is_empty() {
            let mut message = format!(
                "扇出调用 {} 超时，未应答的工作者: {:?}",
                self.call_id, missing
            );
            if !failures.is_empty() {
                message.push_str(&format!("; 失败: {}", failures.join("; ")));
            }
            return Err(CfError::transport(message));
        }

        match failures.len() {
            0 => Ok(self
                .replies
                .into_iter()
                .flatten()
                .filter_map(|r| r.into_result().ok())
                .collect()),
            1 => {
                // 原始错误保持不变，rank 只进入日志与扇出事件
                let failed = self
                    .replies
                    .into_iter()
                    .enumerate()
                    .find_map(|(rank, r)| r.and_then(|r| r.into_result().err()).map(|e| (rank, e)));
                match failed {
                    Some((rank, err)) => {
                        tracing::warn!(call_id = %self.call_id, rank, "fan-out failed on one worker: {}", err);
                        Err(err)
                    }
                    None => Err(CfError::application(failures.join("; "), self.origin)),
                }
            }
            n => Err(CfError::application(
                format!("{} 个工作者失败: {}", n, failures.join("; ")),
                self.origin,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_call, encode_reply};
    use crate::events::{EventKind, Interest};
    use crate::message::TargetAddress;
    use cf_foundation::Uri;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// 按脚本应答的组：收到广播后依次吐出预设的应答
    struct ScriptedGroup {
        size: usize,
        script: Box<dyn Fn(&Call) -> Vec<(usize, Reply)> + Send + Sync>,
        queue: Mutex<VecDeque<(usize, Vec<u8>)>>,
    }

    impl GroupCommunicator for ScriptedGroup {
        fn size(&self) -> usize {
            self.size
        }

        fn broadcast(&self, bytes: &[u8]) -> CfResult<()> {
            let call = decode_call(bytes)?;
            let mut queue = self.queue.lock();
            for (rank, reply) in (self.script)(&call) {
                queue.push_back((rank, encode_reply(&reply)?));
            }
            Ok(())
        }

        fn collect(&self, _deadline: Instant) -> CfResult<Option<(usize, Vec<u8>)>> {
            Ok(self.queue.lock().pop_front())
        }
    }

    fn manager<F>(size: usize, script: F) -> FanOutManager<ScriptedGroup>
    where
        F: Fn(&Call) -> Vec<(usize, Reply)> + Send + Sync + 'static,
    {
        let group = ScriptedGroup {
            size,
            script: Box::new(script),
            queue: Mutex::new(VecDeque::new()),
        };
        FanOutManager::new(group, Duration::from_millis(50))
    }

    fn call() -> Call {
        Call::new(
            TargetAddress::workers(Uri::parse("/solver").unwrap()),
            "solve",
            ArgumentFrame::new(),
        )
    }

    fn ok(call: &Call, rank: usize) -> (usize, Reply) {
        let frame = ArgumentFrame::new().with("rank", rank as i64);
        (rank, Reply::success(call.id, "cpath:/solver", frame))
    }

    fn fail(call: &Call, rank: usize, msg: &str) -> (usize, Reply) {
        let err = CfError::application(msg, "cpath:/solver");
        (rank, Reply::failure(call.id, "cpath:/solver", err))
    }

    #[test]
    fn test_all_succeed_in_rank_order() {
        let m = manager(3, |c| vec![ok(c, 2), ok(c, 0), ok(c, 1)]);
        let frames = m.call(&call()).unwrap();
        let ranks: Vec<i64> = frames.iter().map(|f| f.value::<i64>("rank").unwrap()).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[test]
    fn test_single_failure_surfaces_original_error() {
        let m = manager(3, |c| vec![ok(c, 0), fail(c, 1, "diverged"), ok(c, 2)]);
        let err = m.call(&call()).unwrap_err();
        match err {
            CfError::Application { message, .. } => assert_eq!(message, "diverged"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_single_failure_rank_is_reported() {
        let events = EventDispatcher::shared();
        let ranks = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&ranks);
        events.subscribe_fn(Interest::Kind(EventKind::FanOut), move |e| {
            if let DispatchEvent::FanOutCompleted { failed_ranks, .. } = e {
                *sink.lock() = Some(failed_ranks.clone());
            }
        });
        let m = manager(3, |c| vec![ok(c, 0), fail(c, 1, "diverged"), ok(c, 2)]).with_events(events);

        let report = m.fan_out(&call()).unwrap();
        assert_eq!(report.failed_ranks(), vec![1]);
        assert_eq!(*ranks.lock(), Some(vec![1]));
        assert_eq!(report.into_result().unwrap_err().origin(), Some("cpath:/solver"));
    }

    #[test]
    fn test_multiple_failures_aggregated() {
        let m = manager(3, |c| vec![fail(c, 0, "a"), ok(c, 1), fail(c, 2, "b")]);
        let err = m.call(&call()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("rank 0"));
        assert!(text.contains("rank 2"));
    }

    #[test]
    fn test_missing_rank_is_timeout() {
        let m = manager(3, |c| vec![ok(c, 0), ok(c, 2)]);
        let report = m.fan_out(&call()).unwrap();
        assert_eq!(report.missing_ranks(), vec![1]);
        assert!(!report.is_complete());
        assert!(report.into_result().unwrap_err().is_transport());
    }

    #[test]
    fn test_stale_and_duplicate_replies_dropped() {
        let m = manager(2, |c| {
            let stale = Reply::success(CallId::new(), "cpath:/solver", ArgumentFrame::new());
            vec![(0, stale), ok(c, 0), ok(c, 0), (7, ok(c, 1).1), ok(c, 1)]
        });
        let events = EventDispatcher::shared();
        let dropped = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&dropped);
        events.subscribe_fn(Interest::Kind(EventKind::Dropped), move |_| {
            *counter.lock() += 1;
        });
        let m = m.with_events(events);

        let report = m.fan_out(&call()).unwrap();
        assert!(report.is_complete());
        assert_eq!(*dropped.lock(), 3);
    }
}
