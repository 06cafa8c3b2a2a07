// crates/cf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `CfError` 枚举和 `CfResult` 类型别名，用于整个内核的错误处理。
//!
//! # 错误分类
//!
//! | 类别 | 变体 |
//! |------|------|
//! | 寻址 | [`CfError::Malformed`], [`CfError::NotFound`] |
//! | 选项 | [`CfError::OptionValidation`], [`CfError::MissingOption`], [`CfError::TypeMismatch`] |
//! | 触发器 | [`CfError::TriggerFailed`] |
//! | 组件树 | [`CfError::DuplicateName`], [`CfError::CycleDetected`], [`CfError::BuilderNotFound`] |
//! | 信号 | [`CfError::SignalNotFound`], [`CfError::Application`] |
//! | 通道 | [`CfError::Transport`] |
//!
//! 错误需要随回复帧跨进程传递，因此 `CfError` 实现了 `Clone` 和 serde，
//! 不携带不可序列化的底层错误源。
//!
//! # 示例
//!
//! ```
//! use cf_foundation::error::{CfError, CfResult};
//!
//! fn lookup(name: &str) -> CfResult<()> {
//!     Err(CfError::not_found(name))
//! }
//!
//! assert!(lookup("/missing").unwrap_err().is_not_found());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 统一结果类型
pub type CfResult<T> = Result<T, CfError>;

/// 内核错误类型
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CfError {
    // ========================================================================
    // 寻址
    // ========================================================================
    /// 路径格式错误
    #[error("路径格式错误: '{path}': {reason}")]
    Malformed {
        /// 原始路径文本
        path: String,
        /// 错误原因
        reason: String,
    },

    /// 路径无法解析（目标不存在或已销毁）
    #[error("路径未找到: {path}")]
    NotFound {
        /// 未找到的路径
        path: String,
    },

    // ========================================================================
    // 选项
    // ========================================================================
    /// 选项拒绝了新值，旧值保持不变
    #[error("选项 '{option}' 拒绝取值 {value}: {reason}")]
    OptionValidation {
        /// 选项名
        option: String,
        /// 被拒绝的值
        value: String,
        /// 拒绝原因
        reason: String,
    },

    /// 选项不存在
    #[error("选项不存在: {option}")]
    MissingOption {
        /// 选项名
        option: String,
    },

    /// 类型不匹配
    #[error("类型不匹配: '{name}' 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        /// 字段或选项名
        name: String,
        /// 期望类型
        expected: String,
        /// 实际类型
        actual: String,
    },

    /// 触发器失败（新值已提交，不回滚）
    #[error("选项 '{option}' 的触发器执行失败: {}", .failures.join("; "))]
    TriggerFailed {
        /// 选项名
        option: String,
        /// 每个失败触发器的信息
        failures: Vec<String>,
    },

    // ========================================================================
    // 组件树
    // ========================================================================
    /// 名称冲突
    #[error("名称重复: '{name}' 已存在于 {scope}")]
    DuplicateName {
        /// 冲突发生的范围（父组件路径、注册表等）
        scope: String,
        /// 冲突的名称
        name: String,
    },

    /// 所有权成环
    #[error("所有权成环: 不能将 {path} 移动到 {target} 之下")]
    CycleDetected {
        /// 被移动组件的路径
        path: String,
        /// 目标父组件路径
        target: String,
    },

    /// 构建器未注册
    #[error("构建器未注册: {type_name}")]
    BuilderNotFound {
        /// 类型名
        type_name: String,
    },

    // ========================================================================
    // 信号
    // ========================================================================
    /// 信号未找到
    #[error("信号未找到: {path} 上不存在信号 '{signal}'")]
    SignalNotFound {
        /// 目标组件路径
        path: String,
        /// 信号名
        signal: String,
    },

    /// 信号处理函数自身的错误
    #[error("应用错误 [{origin}]: {message}")]
    Application {
        /// 错误信息
        message: String,
        /// 出错组件的路径
        origin: String,
    },

    // ========================================================================
    // 通道与其他
    // ========================================================================
    /// 传输错误（连接断开、载荷损坏、超时）
    #[error("传输错误: {message}")]
    Transport {
        /// 错误信息
        message: String,
    },

    /// 无效参数
    #[error("无效参数: {message}")]
    InvalidArgument {
        /// 错误信息
        message: String,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 错误信息
        message: String,
    },

    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 错误信息
        message: String,
    },
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// 寻址错误
    Addressing,
    /// 选项错误
    Option,
    /// 触发器错误
    Trigger,
    /// 名称重复
    DuplicateName,
    /// 所有权成环
    Cycle,
    /// 构建器错误
    Builder,
    /// 信号未找到
    SignalNotFound,
    /// 应用错误
    Application,
    /// 传输错误
    Transport,
    /// 无效参数
    InvalidArgument,
    /// 配置错误
    Config,
    /// IO 错误
    Io,
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl CfError {
    /// 路径格式错误
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 路径未找到
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// 选项校验失败
    pub fn option_validation(
        option: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::OptionValidation {
            option: option.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 选项不存在
    pub fn missing_option(option: impl Into<String>) -> Self {
        Self::MissingOption {
            option: option.into(),
        }
    }

    /// 类型不匹配
    pub fn type_mismatch(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// 触发器失败
    pub fn trigger_failed(option: impl Into<String>, failures: Vec<String>) -> Self {
        Self::TriggerFailed {
            option: option.into(),
            failures,
        }
    }

    /// 名称重复
    pub fn duplicate_name(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            scope: scope.into(),
            name: name.into(),
        }
    }

    /// 所有权成环
    pub fn cycle(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self::CycleDetected {
            path: path.into(),
            target: target.into(),
        }
    }

    /// 构建器未注册
    pub fn builder_not_found(type_name: impl Into<String>) -> Self {
        Self::BuilderNotFound {
            type_name: type_name.into(),
        }
    }

    /// 信号未找到
    pub fn signal_not_found(path: impl Into<String>, signal: impl Into<String>) -> Self {
        Self::SignalNotFound {
            path: path.into(),
            signal: signal.into(),
        }
    }

    /// 应用错误
    pub fn application(message: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            origin: origin.into(),
        }
    }

    /// 传输错误
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// 无效参数
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// IO 错误
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

// ========================================================================
// 分类与转换
// ========================================================================

impl CfError {
    /// 错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed { .. } | Self::NotFound { .. } => ErrorKind::Addressing,
            Self::OptionValidation { .. }
            | Self::MissingOption { .. }
            | Self::TypeMismatch { .. } => ErrorKind::Option,
            Self::TriggerFailed { .. } => ErrorKind::Trigger,
            Self::DuplicateName { .. } => ErrorKind::DuplicateName,
            Self::CycleDetected { .. } => ErrorKind::Cycle,
            Self::BuilderNotFound { .. } => ErrorKind::Builder,
            Self::SignalNotFound { .. } => ErrorKind::SignalNotFound,
            Self::Application { .. } => ErrorKind::Application,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// 是否为"未找到"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// 是否为通道错误
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// 应用错误的来源路径
    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::Application { origin, .. } => Some(origin),
            _ => None,
        }
    }

    /// 将处理函数内部的错误包装为应用错误
    ///
    /// 已经是应用错误的保持原样，保留最初的来源路径。
    pub fn into_application(self, origin: impl Into<String>) -> Self {
        match self {
            Self::Application { .. } => self,
            other => Self::application(other.to_string(), origin),
        }
    }
}

/// 从 `catch_unwind` 捕获的载荷中取出 panic 信息
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl From<std::io::Error> for CfError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl<T> From<std::sync::mpsc::SendError<T>> for CfError {
    fn from(_: std::sync::mpsc::SendError<T>) -> Self {
        Self::transport("通道已关闭，发送失败")
    }
}

impl From<std::sync::mpsc::RecvError> for CfError {
    fn from(_: std::sync::mpsc::RecvError) -> Self {
        Self::transport("通道已关闭，接收失败")
    }
}

/// 条件不满足时提前返回错误
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err.into());
        }
    };
}

/// 取出 `Option` 中的值，为 `None` 时提前返回错误
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr) => {
        match $opt {
            Some(value) => value,
            None => return Err($err.into()),
        }
    };
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CfError::signal_not_found("/solver1", "execute");
        let msg = err.to_string();
        assert!(msg.contains("/solver1"));
        assert!(msg.contains("execute"));
    }

    #[test]
    fn test_trigger_failed_joins_messages() {
        let err = CfError::trigger_failed("cfl", vec!["a".into(), "b".into()]);
        assert!(err.to_string().contains("a; b"));
    }

    #[test]
    fn test_kind() {
        assert_eq!(CfError::not_found("/x").kind(), ErrorKind::Addressing);
        assert_eq!(CfError::malformed("x y", "空格").kind(), ErrorKind::Addressing);
        assert_eq!(
            CfError::option_validation("cfl", "-1", "必须为正").kind(),
            ErrorKind::Option
        );
        assert_eq!(CfError::transport("lost").kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_into_application_keeps_origin() {
        let err = CfError::application("boom", "/a").into_application("/b");
        assert_eq!(err.origin(), Some("/a"));

        let wrapped = CfError::not_found("/x").into_application("/b");
        assert_eq!(wrapped.origin(), Some("/b"));
        assert!(wrapped.to_string().contains("/x"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: CfError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_serde_roundtrip() {
        let err = CfError::application("division by zero", "/solver");
        let json = serde_json::to_string(&err).unwrap();
        let back: CfError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i32) -> CfResult<()> {
            ensure!(value > 0, CfError::invalid_argument("value must be positive"));
            Ok(())
        }

        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }

    #[test]
    fn test_require_macro() {
        fn get_value(opt: Option<i32>) -> CfResult<i32> {
            let v = require!(opt, CfError::not_found("value"));
            Ok(v)
        }

        assert_eq!(get_value(Some(42)).unwrap(), 42);
        assert!(get_value(None).is_err());
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");
        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload = std::panic::catch_unwind(|| std::panic::panic_any(3_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
