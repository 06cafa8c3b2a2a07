// crates/cf_dispatch/src/message.rs

//! 调用与应答消息
//!
//! 一次信号调用由 [`Call`] 描述，结果由 [`Reply`] 描述，两者通过
//! [`CallId`] 关联。远程执行失败的错误以原始 [`CfError`] 变体放在应答中
//! 传回，调用方可以原样重新抛出。

use cf_config::ArgumentFrame;
use cf_foundation::{CfError, CfResult, Uri};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 调用ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    /// 创建新的调用ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 从UUID创建
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 获取UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 执行位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locus {
    /// 本进程的处理线程
    Local,
    /// 具名远程端点
    Remote(String),
    /// 所有工作者（扇出）
    Workers,
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote(endpoint) => write!(f, "remote:{}", endpoint),
            Self::Workers => write!(f, "workers"),
        }
    }
}

/// 调用目标
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetAddress {
    /// 目标组件路径
    pub path: Uri,
    /// 执行位置
    pub locus: Locus,
}

impl TargetAddress {
    /// 本地目标
    pub fn local(path: Uri) -> Self {
        Self {
            path,
            locus: Locus::Local,
        }
    }

    /// 远程目标
    pub fn remote(endpoint: impl Into<String>, path: Uri) -> Self {
        Self {
            path,
            locus: Locus::Remote(endpoint.into()),
        }
    }

    /// 扇出目标
    pub fn workers(path: Uri) -> Self {
        Self {
            path,
            locus: Locus::Workers,
        }
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.locus)
    }
}

/// 信号调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// 调用ID
    pub id: CallId,
    /// 目标
    pub target: TargetAddress,
    /// 信号名
    pub signal: String,
    /// 参数
    pub args: ArgumentFrame,
}

impl Call {
    /// 创建调用，分配新的ID
    pub fn new(target: TargetAddress, signal: impl Into<String>, args: ArgumentFrame) -> Self {
        Self {
            id: CallId::new(),
            target,
            signal: signal.into(),
            args,
        }
    }

    /// 本地调用的便捷构造
    pub fn local(path: &str, signal: impl Into<String>, args: ArgumentFrame) -> CfResult<Self> {
        Ok(Self::new(TargetAddress::local(Uri::parse(path)?), signal, args))
    }
}

/// 调用结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// 成功，携带返回帧
    Success(ArgumentFrame),
    /// 失败，携带原始错误
    Failure(CfError),
}

/// 调用应答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// 对应的调用ID
    pub call_id: CallId,
    /// 执行位置描述（目标路径）
    pub origin: String,
    /// 结果
    pub outcome: Outcome,
}

impl Reply {
    /// 成功应答
    pub fn success(call_id: CallId, origin: impl Into<String>, frame: ArgumentFrame) -> Self {
        Self {
            call_id,
            origin: origin.into(),
            outcome: Outcome::Success(frame),
        }
    }

    /// 失败应答
    pub fn failure(call_id: CallId, origin: impl Into<String>, error: CfError) -> Self {
        Self {
            call_id,
            origin: origin.into(),
            outcome: Outcome::Failure(error),
        }
    }

    /// 是否成功
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// 失败时的错误
    pub fn error(&self) -> Option<&CfError> {
        match &self.outcome {
            Outcome::Failure(e) => Some(e),
            Outcome::Success(_) => None,
        }
    }

    /// 转换为结果，失败时原样返回远端错误
    pub fn into_result(self) -> CfResult<ArgumentFrame> {
        match self.outcome {
            Outcome::Success(frame) => Ok(frame),
            Outcome::Failure(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_ids_are_unique() {
        assert_ne!(CallId::new(), CallId::new());
    }

    #[test]
    fn test_reply_into_result() {
        let id = CallId::new();
        let ok = Reply::success(id, "cpath:/a", ArgumentFrame::new().with("x", 1));
        assert!(ok.is_success());
        assert_eq!(ok.into_result().unwrap().len(), 1);

        let err = Reply::failure(id, "cpath:/a", CfError::signal_not_found("cpath:/a", "run"));
        assert!(matches!(
            err.into_result(),
            Err(CfError::SignalNotFound { .. })
        ));
    }

    #[test]
    fn test_target_display() {
        let target = TargetAddress::remote("node1", Uri::parse("/solver").unwrap());
        assert_eq!(target.to_string(), "cpath:/solver@remote:node1");
        assert!(Call::local("not a path", "x", ArgumentFrame::new()).is_err());
    }
}
