// crates/cf_config/src/lib.rs

//! CF Kernel Config Layer (Layer 2)
//!
//! 配置层，提供组件的配置与数据交换原语。
//!
//! # 模块概览
//!
//! - [`option`]: 类型化选项、校验器、触发器
//! - [`store`]: 选项表 `OptionList` 与属性表 `PropertyList`
//! - [`frame`]: 参数帧 `ArgumentFrame`，信号的参数与返回值
//! - [`kernel_config`]: 进程级运行配置 `KernelConfig`
//!
//! # 示例
//!
//! ```
//! use cf_config::prelude::*;
//!
//! let mut options = OptionList::new();
//! options.add_option("cfl", 0.5).unwrap().mark_basic();
//!
//! options.configure(&ArgumentFrame::new().with("cfl", 0.8)).unwrap();
//! assert_eq!(options.value::<f64>("cfl").unwrap(), 0.8);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frame;
pub mod kernel_config;
pub mod option;
pub mod store;

/// 层级标识
pub const LAYER: u8 = 2;

pub use frame::{ArgumentFrame, Field, FieldEntry};
pub use kernel_config::KernelConfig;
pub use option::{ConfigOption, Trigger, TriggerId, Validator, Visibility};
pub use store::{OptionList, PropertyList};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::frame::{ArgumentFrame, Field, FieldEntry};
    pub use crate::kernel_config::KernelConfig;
    pub use crate::option::{ConfigOption, TriggerId, Visibility};
    pub use crate::store::{OptionList, PropertyList};
    pub use cf_foundation::prelude::*;
}
