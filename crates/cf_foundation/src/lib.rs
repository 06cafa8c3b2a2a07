// crates/cf_foundation/src/lib.rs

//! CF Kernel Foundation Layer (Layer 1)
//!
//! 基础层，提供整个内核共享的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 `CfError`
//! - [`arena`]: 代际验证槽位池，组件树的存储
//! - [`uri`]: 寻址，树内路径与外部资源定位
//! - [`value`]: 选项与参数帧共享的封闭值类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 5: cf_cli        ─> 命令行前端
//! Layer 4: cf_dispatch   ─> Call/Reply, Transport, 远程与扇出分发
//! Layer 3: cf_component  ─> ComponentTree, BuilderRegistry, SignalTable
//! Layer 2: cf_config     ─> OptionList, PropertyList, ArgumentFrame
//! Layer 1: cf_foundation ─> CfError, SlotArena, Uri, Value (本层)
//! ```
//!
//! # 示例
//!
//! ```
//! use cf_foundation::prelude::*;
//!
//! let uri = Uri::parse("/Root/solver").unwrap();
//! assert_eq!(uri.name(), Some("solver"));
//!
//! let v = Value::from(0.5);
//! assert_eq!(v.kind(), ValueKind::Real);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arena;
pub mod error;
pub mod uri;
pub mod value;

/// 层级标识
pub const LAYER: u8 = 1;

// 重导出常用类型
pub use arena::{SlotArena, SlotId};
pub use error::{panic_message, CfError, CfResult, ErrorKind};
pub use uri::{Scheme, Uri};
pub use value::{Value, ValueKind, ValueType};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::arena::{SlotArena, SlotId};
    pub use crate::error::{CfError, CfResult, ErrorKind};
    pub use crate::uri::{is_valid_name, Scheme, Uri};
    pub use crate::value::{Value, ValueKind, ValueType};
    pub use crate::{ensure, require};
}
