// crates/cf_dispatch/src/processor.rs

//! 信号处理线程
//!
//! [`SignalProcessor`] 启动一个独占组件树的处理线程，所有对这棵树的
//! 访问都以任务形式排队执行。组件树在线程内构建，构建完成（或失败）
//! 后通过互斥锁与条件变量通知启动方。

use crate::events::{DispatchEvent, EventDispatcher};
use crate::message::{Call, Outcome, Reply};
use crate::server::dispatch_local;
use cf_component::ComponentTree;
use cf_config::KernelConfig;
use cf_foundation::{panic_message, CfError, CfResult};
use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// 调用完成回调
pub type Completion = Box<dyn FnOnce(Reply) + Send>;

type TreeJob = Box<dyn FnOnce(&mut ComponentTree) + Send>;

enum Job {
    Call(Call, Completion),
    Tree(TreeJob),
    Shutdown,
}

enum Startup {
    Pending,
    Ready,
    Failed(CfError),
}

/// 信号处理线程
pub struct SignalProcessor {
    name: String,
    jobs: Mutex<Sender<Job>>,
    handle: Option<JoinHandle<Option<ComponentTree>>>,
    events: Arc<EventDispatcher>,
}

impl SignalProcessor {
    /// 启动处理线程，`setup` 在新线程内构建组件树
    ///
    /// 返回时组件树已经就绪；构建失败或 panic 时返回对应错误。
    pub fn spawn<F>(config: &KernelConfig, events: Arc<EventDispatcher>, setup: F) -> CfResult<Self>
    where
        F: FnOnce() -> CfResult<ComponentTree> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let startup = Arc::new((Mutex::new(Startup::Pending), Condvar::new()));

        let handle = {
            let startup = Arc::clone(&startup);
            let events = Arc::clone(&events);
            thread::Builder::new()
                .name(config.processor_name.clone())
                .spawn(move || {
                    let built = panic::catch_unwind(AssertUnwindSafe(setup)).unwrap_or_else(|p| {
                        Err(CfError::application(
                            format!("组件树构建 panic: {}", panic_message(p.as_ref())),
                            "cpath:/",
                        ))
                    });
                    let (lock, cvar) = &*startup;
                    let mut tree = match built {
                        Ok(tree) => {
                            *lock.lock() = Startup::Ready;
                            cvar.notify_all();
                            tree
                        }
                        Err(err) => {
                            *lock.lock() = Startup::Failed(err);
                            cvar.notify_all();
                            return None;
                        }
                    };
                    run(&mut tree, rx, &events);
                    Some(tree)
                })?
        };

        let (lock, cvar) = &*startup;
        let mut state = lock.lock();
        while matches!(*state, Startup::Pending) {
            cvar.wait(&mut state);
        }
        if let Startup::Failed(err) = std::mem::replace(&mut *state, Startup::Ready) {
            drop(state);
            let _ = handle.join();
            tracing::warn!(name = %config.processor_name, "processor failed to start: {}", err);
            return Err(err);
        }
        drop(state);

        tracing::info!(name = %config.processor_name, "signal processor started");
        Ok(Self {
            name: config.processor_name.clone(),
            jobs: Mutex::new(tx),
            handle: Some(handle),
            events,
        })
    }

    /// 以现成的组件树启动
    pub fn start(tree: ComponentTree, config: &KernelConfig, events: Arc<EventDispatcher>) -> CfResult<Self> {
        Self::spawn(config, events, move || Ok(tree))
    }

    /// 线程名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 事件分发器
    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    fn send(&self, job: Job) -> CfResult<()> {
        self.jobs
            .lock()
            .send(job)
            .map_err(|_| CfError::transport(format!("处理线程 '{}' 已退出", self.name)))
    }

    /// 提交调用，完成后在处理线程上执行回调
    pub fn submit<F>(&self, call: Call, on_complete: F) -> CfResult<()>
    where
        F: FnOnce(Reply) + Send + 'static,
    {
        self.send(Job::Call(call, Box::new(on_complete)))
    }

    /// 提交调用并等待应答
    pub fn call(&self, call: Call) -> CfResult<Reply> {
        let (tx, rx) = mpsc::channel();
        self.submit(call, move |reply| {
            let _ = tx.send(reply);
        })?;
        rx.recv()
            .map_err(|_| CfError::transport(format!("处理线程 '{}' 未返回应答", self.name)))
    }

    /// 在处理线程上访问组件树
    pub fn with_tree<R, F>(&self, f: F) -> CfResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut ComponentTree) -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.send(Job::Tree(Box::new(move |tree| {
            let _ = tx.send(f(tree));
        })))?;
        rx.recv()
            .map_err(|_| CfError::transport(format!("处理线程 '{}' 中的任务未完成", self.name)))
    }

    /// 停止处理线程并取回组件树
    ///
    /// 已排队的任务先执行完毕。
    pub fn shutdown(mut self) -> CfResult<ComponentTree> {
        self.stop()?
            .ok_or_else(|| CfError::transport(format!("处理线程 '{}' 没有组件树", self.name)))
    }

    fn stop(&mut self) -> CfResult<Option<ComponentTree>> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };
        let _ = self.jobs.lock().send(Job::Shutdown);
        let tree = handle.join().map_err(|p| {
            CfError::transport(format!(
                "处理线程 '{}' panic: {}",
                self.name,
                panic_message(p.as_ref())
            ))
        })?;
        tracing::info!(name = %self.name, "signal processor stopped");
        Ok(tree)
    }
}

impl Drop for SignalProcessor {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!("{}", err);
        }
    }
}

impl std::fmt::Debug for SignalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalProcessor")
            .field("name", &self.name)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn run(tree: &mut ComponentTree, jobs: Receiver<Job>, events: &EventDispatcher) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Call(call, on_complete) => {
                let started = Instant::now();
                events.emit(DispatchEvent::CallDispatched {
                    call_id: call.id,
                    target: call.target.to_string(),
                    signal: call.signal.clone(),
                    at: Utc::now(),
                });
                let reply = dispatch_local(tree, &call);
                events.emit(match &reply.outcome {
                    Outcome::Success(_) => DispatchEvent::CallCompleted {
                        call_id: call.id,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        at: Utc::now(),
                    },
                    Outcome::Failure(err) => DispatchEvent::CallFailed {
                        call_id: call.id,
                        error: err.to_string(),
                        at: Utc::now(),
                    },
                });
                if panic::catch_unwind(AssertUnwindSafe(|| on_complete(reply))).is_err() {
                    tracing::warn!(call_id = %call.id, "completion callback panicked");
                }
            }
            Job::Tree(f) => {
                if panic::catch_unwind(AssertUnwindSafe(|| f(tree))).is_err() {
                    tracing::warn!("tree job panicked");
                }
            }
            Job::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_component::{BuilderRegistry, GROUP_TYPE};
    use cf_config::ArgumentFrame;
    use cf_foundation::Uri;

    fn tree() -> CfResult<ComponentTree> {
        let mut tree = ComponentTree::new(BuilderRegistry::with_core_builders().into_shared());
        let root = tree.root();
        tree.create_child(root, GROUP_TYPE, "mesh")?;
        Ok(tree)
    }

    #[test]
    fn test_call_and_shutdown() {
        let processor = SignalProcessor::spawn(&KernelConfig::default(), EventDispatcher::shared(), tree).unwrap();
        let call = Call::local(
            "/mesh",
            "create_component",
            ArgumentFrame::new().with("name", "cells").with("type", GROUP_TYPE),
        )
        .unwrap();
        let frame = processor.call(call).unwrap().into_result().unwrap();
        assert_eq!(frame.value::<Uri>("path").unwrap().path(), "/mesh/cells");

        let count = processor.with_tree(|t| t.len()).unwrap();
        assert_eq!(count, 3);

        let tree = processor.shutdown().unwrap();
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_submit_runs_callback() {
        let processor = SignalProcessor::spawn(&KernelConfig::default(), EventDispatcher::shared(), tree).unwrap();
        let (tx, rx) = mpsc::channel();
        let call = Call::local("/", "list_tree", ArgumentFrame::new()).unwrap();
        let id = call.id;
        processor
            .submit(call, move |reply| {
                tx.send(reply).unwrap();
            })
            .unwrap();
        let reply = rx.recv().unwrap();
        assert_eq!(reply.call_id, id);
        assert!(reply.is_success());
    }

    #[test]
    fn test_setup_failure_reported() {
        let err = SignalProcessor::spawn(&KernelConfig::default(), EventDispatcher::shared(), || {
            Err(CfError::config("bad script"))
        })
        .unwrap_err();
        assert!(matches!(err, CfError::Config { .. }));

        let err = SignalProcessor::spawn(&KernelConfig::default(), EventDispatcher::shared(), || {
            panic!("boom")
        })
        .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_panicking_callback_keeps_thread_alive() {
        let processor = SignalProcessor::spawn(&KernelConfig::default(), EventDispatcher::shared(), tree).unwrap();
        let call = Call::local("/", "list_tree", ArgumentFrame::new()).unwrap();
        processor.submit(call, |_| panic!("callback")).unwrap();
        assert_eq!(processor.with_tree(|t| t.len()).unwrap(), 2);
    }
}
