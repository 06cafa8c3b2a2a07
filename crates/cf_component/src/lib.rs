// crates/cf_component/src/lib.rs

//! CF Kernel Component Layer (Layer 3)
//!
//! 组件层，提供组件树与组件的声明、构造、调用机制。
//!
//! # 模块概览
//!
//! - [`component`]: `Component` trait、声明表 `Definition`、独立组件 `ComponentBox`
//! - [`tree`]: 组件树 `ComponentTree`，节点所有权、寻址、遍历、信号调用
//! - [`link`]: 链接组件，对其他组件的弱引用
//! - [`builder`]: 构建器注册表 `BuilderRegistry`
//! - [`signal`]: 信号表 `SignalTable` 与调用上下文 `SignalContext`
//! - [`core_signals`]: 所有组件共有的核心信号
//!
//! # 示例
//!
//! ```
//! use cf_component::prelude::*;
//!
//! let mut tree = ComponentTree::new(BuilderRegistry::with_core_builders().into_shared());
//! let root = tree.root();
//! let mesh = tree.create_child(root, GROUP_TYPE, "mesh").unwrap();
//!
//! assert_eq!(tree.access(root, "/mesh").unwrap(), mesh);
//! assert_eq!(tree.path_of(mesh).unwrap().to_string(), "cpath:/mesh");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod component;
pub mod core_signals;
pub mod link;
pub mod signal;
pub mod tree;

/// 层级标识
pub const LAYER: u8 = 3;

pub use builder::{BuilderRegistry, Factory};
pub use component::{Component, ComponentBox, Definition, Group, GROUP_TYPE};
pub use link::{Link, LinkTarget, LINK_TYPE};
pub use signal::{Signal, SignalContext, SignalHandler, SignalTable};
pub use tree::{ComponentId, ComponentTree};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::builder::BuilderRegistry;
    pub use crate::component::{Component, ComponentBox, Definition, Group, GROUP_TYPE};
    pub use crate::link::{Link, LinkTarget, LINK_TYPE};
    pub use crate::signal::{SignalContext, SignalTable};
    pub use crate::tree::{ComponentId, ComponentTree};
    pub use cf_config::prelude::*;
}
