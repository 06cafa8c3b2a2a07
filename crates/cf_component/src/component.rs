// crates/cf_component/src/component.rs

//! 组件抽象
//!
//! [`Component`] 是组件行为的 trait 对象接口。组件在构造时通过
//! [`Component::define`] 声明自己的选项、属性、信号和标签；之后这些
//! 数据由组件树统一管理，组件自身只保存业务状态。
//!
//! [`ComponentBox`] 是已构造、尚未挂到树上的组件，由调用方持有，
//! 直到 [`ComponentTree::add_component`](crate::tree::ComponentTree::add_component)
//! 把它移入树中。

use crate::core_signals;
use crate::signal::SignalTable;
use cf_config::{OptionList, PropertyList};
use cf_foundation::uri::is_valid_name;
use cf_foundation::{CfError, CfResult};
use std::any::Any;
use std::fmt;

/// 分组组件类型名
pub const GROUP_TYPE: &str = "cf.common.Group";

// =============================================================================
// trait
// =============================================================================

/// 向下转型支持
pub trait AsAny: Any {
    /// 转为 `&dyn Any`
    fn as_any(&self) -> &dyn Any;
    /// 转为 `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 组件行为
pub trait Component: AsAny + Send {
    /// 声明选项、属性、信号与标签
    fn define(&mut self, _def: &mut Definition<'_>) -> CfResult<()> {
        Ok(())
    }
}

/// 组件构造期可见的声明表
pub struct Definition<'a> {
    /// 选项表
    pub options: &'a mut OptionList,
    /// 属性表
    pub properties: &'a mut PropertyList,
    /// 信号表
    pub signals: &'a mut SignalTable,
    /// 标签
    pub tags: &'a mut Vec<String>,
}

impl Definition<'_> {
    /// 添加标签
    pub fn tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }
}

/// 分组组件，只承载子组件
#[derive(Debug, Default)]
pub struct Group;

impl Component for Group {}

// =============================================================================
// ComponentBox
// =============================================================================

/// 已构造的独立组件
pub struct ComponentBox {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) component: Box<dyn Component>,
    pub(crate) options: OptionList,
    pub(crate) properties: PropertyList,
    pub(crate) signals: SignalTable,
    pub(crate) tags: Vec<String>,
}

impl ComponentBox {
    /// 构造组件并执行其声明
    pub fn new(
        name: &str,
        type_name: &str,
        component: Box<dyn Component>,
    ) -> CfResult<Self> {
        if !is_valid_name(name) {
            return Err(CfError::invalid_argument(format!("非法组件名 '{}'", name)));
        }
        let mut boxed = Self::bare(name, type_name, component);
        let Self {
            component,
            options,
            properties,
            signals,
            tags,
            ..
        } = &mut boxed;
        let mut def = Definition {
            options,
            properties,
            signals,
            tags,
        };
        component.define(&mut def)?;
        Ok(boxed)
    }

    /// 安装核心信号但不执行声明
    pub(crate) fn bare(name: &str, type_name: &str, component: Box<dyn Component>) -> Self {
        let mut signals = SignalTable::new();
        core_signals::install(&mut signals);
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            component,
            options: OptionList::new(),
            properties: PropertyList::new(),
            signals,
            tags: Vec::new(),
        }
    }

    /// 组件名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 类型名
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// 选项表
    pub fn options(&self) -> &OptionList {
        &self.options
    }

    /// 可变选项表
    pub fn options_mut(&mut self) -> &mut OptionList {
        &mut self.options
    }

    /// 属性表
    pub fn properties(&self) -> &PropertyList {
        &self.properties
    }

    /// 信号表
    pub fn signals(&self) -> &SignalTable {
        &self.signals
    }

    /// 标签
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// 是否带有标签
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// 行为对象
    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// 类型化访问行为对象
    pub fn downcast_ref<T: Component>(&self) -> Option<&T> {
        self.component.as_ref().as_any().downcast_ref::<T>()
    }

    /// 类型化可变访问行为对象
    pub fn downcast_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.component.as_mut().as_any_mut().downcast_mut::<T>()
    }
}

impl fmt::Debug for ComponentBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBox")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("options", &self.options.names())
            .field("signals", &self.signals.names())
            .field("tags", &self.tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_foundation::Value;

    #[derive(Default)]
    struct Probe {
        hits: u32,
    }

    impl Component for Probe {
        fn define(&mut self, def: &mut Definition<'_>) -> CfResult<()> {
            def.options.add_option("gain", 2.0)?;
            def.properties.set("hits", 0);
            def.tag("sensor");
            Ok(())
        }
    }

    #[test]
    fn test_define_populates_tables() {
        let boxed = ComponentBox::new("p1", "test.Probe", Box::new(Probe::default())).unwrap();
        assert_eq!(boxed.options().get("gain").unwrap(), &Value::Real(2.0));
        assert!(boxed.properties().contains("hits"));
        assert!(boxed.has_tag("sensor"));
        assert!(boxed.signals().contains("list_options"));
    }

    #[test]
    fn test_invalid_name() {
        let err = ComponentBox::new("a/b", GROUP_TYPE, Box::new(Group)).unwrap_err();
        assert!(matches!(err, CfError::InvalidArgument { .. }));
    }

    #[test]
    fn test_downcast() {
        let mut boxed = ComponentBox::new("p1", "test.Probe", Box::new(Probe::default())).unwrap();
        boxed.downcast_mut::<Probe>().unwrap().hits = 3;
        assert_eq!(boxed.downcast_ref::<Probe>().unwrap().hits, 3);
        assert!(boxed.downcast_ref::<Group>().is_none());
    }
}
