// crates/cf_component/src/builder.rs

//! 构建器注册表
//!
//! 以点分限定类型名（如 `cf.common.Group`）为键保存组件工厂。
//! 注册表在进程启动阶段构建完成，随后冻结在 `Arc` 中交给各组件树
//! 只读共享，不支持注销。
//!
//! # 示例
//!
//! ```
//! use cf_component::prelude::*;
//!
//! let registry = BuilderRegistry::with_core_builders().into_shared();
//! let mut tree = ComponentTree::new(registry);
//! let root = tree.root();
//! tree.create_child(root, "cf.common.Group", "mesh").unwrap();
//! assert_eq!(tree.len(), 2);
//! ```

use crate::component::{Component, ComponentBox, Group, GROUP_TYPE};
use crate::link::{Link, LINK_TYPE};
use cf_foundation::{CfError, CfResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 组件工厂
pub type Factory = Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>;

/// 类型名是否为点分限定标识符
pub fn is_valid_type_name(type_name: &str) -> bool {
    !type_name.is_empty()
        && type_name.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// 构建器注册表
#[derive(Default)]
pub struct BuilderRegistry {
    builders: BTreeMap<String, Factory>,
}

impl BuilderRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并注册内置组件（分组与链接）
    pub fn with_core_builders() -> Self {
        let mut registry = Self::new();
        registry.builders.insert(
            GROUP_TYPE.to_string(),
            Arc::new(|| Box::new(Group) as Box<dyn Component>),
        );
        registry.builders.insert(
            LINK_TYPE.to_string(),
            Arc::new(|| Box::new(Link::default()) as Box<dyn Component>),
        );
        registry
    }

    /// 注册工厂
    ///
    /// 类型名已存在时返回 `DuplicateName`，先注册的工厂保持有效。
    pub fn register<F>(&mut self, type_name: &str, factory: F) -> CfResult<()>
    where
        F: Fn() -> Box<dyn Component> + Send + Sync + 'static,
    {
        if !is_valid_type_name(type_name) {
            return Err(CfError::invalid_argument(format!(
                "非法类型名 '{}'",
                type_name
            )));
        }
        if self.builders.contains_key(type_name) {
            tracing::warn!(type_name, "builder already registered, keeping the first one");
            return Err(CfError::duplicate_name("builders", type_name));
        }
        self.builders.insert(type_name.to_string(), Arc::new(factory));
        tracing::debug!(type_name, "builder registered");
        Ok(())
    }

    /// 为 `Default` 组件类型注册工厂
    pub fn register_default<T>(&mut self, type_name: &str) -> CfResult<()>
    where
        T: Component + Default,
    {
        self.register(type_name, || Box::new(T::default()) as Box<dyn Component>)
    }

    /// 构造组件
    pub fn build(&self, type_name: &str, instance_name: &str) -> CfResult<ComponentBox> {
        let factory = self
            .builders
            .get(type_name)
            .ok_or_else(|| CfError::builder_not_found(type_name))?;
        ComponentBox::new(instance_name, type_name, factory())
    }

    /// 是否已注册
    pub fn contains(&self, type_name: &str) -> bool {
        self.builders.contains_key(type_name)
    }

    /// 已注册数量
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// 所有已注册类型名（字典序）
    pub fn list_registered(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }

    /// 指定命名空间下的类型名
    pub fn list_namespace(&self, namespace: &str) -> Vec<&str> {
        let prefix = format!("{}.", namespace.trim_end_matches('.'));
        self.builders
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .map(String::as_str)
            .collect()
    }

    /// 冻结为共享只读注册表
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderRegistry")
            .field("builders", &self.list_registered())
            .finish()
    }
}
