// crates/cf_component/src/signal.rs

//! 信号注册表
//!
//! 信号是组件对外暴露的具名操作：参数与返回值都是
//! [`ArgumentFrame`]，签名帧描述参数及其默认值。调用前参数会用签名
//! 补全，处理函数通过 [`SignalContext`] 访问组件树和目标组件。

use crate::component::Component;
use crate::tree::{ComponentId, ComponentTree};
use cf_config::{ArgumentFrame, OptionList, PropertyList};
use cf_foundation::uri::is_valid_name;
use cf_foundation::{CfError, CfResult, Uri};
use std::fmt;
use std::sync::Arc;

/// 信号处理函数
pub type SignalHandler =
    Arc<dyn Fn(&mut SignalContext<'_>) -> CfResult<ArgumentFrame> + Send + Sync>;

// =============================================================================
// SignalContext
// =============================================================================

/// 处理函数的调用上下文
pub struct SignalContext<'a> {
    /// 组件树
    pub tree: &'a mut ComponentTree,
    /// 目标组件
    pub target: ComponentId,
    /// 已补全的参数
    pub args: ArgumentFrame,
}

impl SignalContext<'_> {
    /// 目标组件路径
    pub fn path(&self) -> CfResult<Uri> {
        self.tree.path_of(self.target)
    }

    /// 目标组件的行为对象
    pub fn component<T: Component>(&self) -> CfResult<&T> {
        self.tree.component::<T>(self.target)
    }

    /// 目标组件的可变行为对象
    pub fn component_mut<T: Component>(&mut self) -> CfResult<&mut T> {
        self.tree.component_mut::<T>(self.target)
    }

    /// 目标组件的选项表
    pub fn options(&self) -> CfResult<&OptionList> {
        self.tree.options(self.target)
    }

    /// 目标组件的属性表
    pub fn properties_mut(&mut self) -> CfResult<&mut PropertyList> {
        self.tree.properties_mut(self.target)
    }
}

// =============================================================================
// Signal
// =============================================================================

/// 已注册的信号
#[derive(Clone)]
pub struct Signal {
    name: String,
    pretty_name: String,
    description: String,
    signature: ArgumentFrame,
    handler: SignalHandler,
    hidden: bool,
    read_only: bool,
}

impl Signal {
    pub(crate) fn new(name: &str, description: &str, handler: SignalHandler) -> Self {
        Self {
            name: name.to_string(),
            pretty_name: String::new(),
            description: description.to_string(),
            signature: ArgumentFrame::new(),
            handler,
            hidden: false,
            read_only: false,
        }
    }

    /// 信号名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 显示名，未设置时等于信号名
    pub fn pretty_name(&self) -> &str {
        if self.pretty_name.is_empty() {
            &self.name
        } else {
            &self.pretty_name
        }
    }

    /// 描述
    pub fn description(&self) -> &str {
        &self.description
    }

    /// 签名帧
    pub fn signature(&self) -> &ArgumentFrame {
        &self.signature
    }

    /// 处理函数
    pub fn handler(&self) -> SignalHandler {
        Arc::clone(&self.handler)
    }

    /// 是否对检查器隐藏
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// 是否不修改状态
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// 设置签名
    pub fn with_signature(&mut self, signature: ArgumentFrame) -> &mut Self {
        self.signature = signature;
        self
    }

    /// 设置显示名
    pub fn with_pretty_name(&mut self, text: impl Into<String>) -> &mut Self {
        self.pretty_name = text.into();
        self
    }

    /// 标记为隐藏
    pub fn hidden(&mut self) -> &mut Self {
        self.hidden = true;
        self
    }

    /// 标记为只读
    pub fn read_only(&mut self) -> &mut Self {
        self.read_only = true;
        self
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("signature", &self.signature.names())
            .field("hidden", &self.hidden)
            .field("read_only", &self.read_only)
            .finish()
    }
}

// =============================================================================
// SignalTable
// =============================================================================

/// 组件的信号表
#[derive(Debug, Clone, Default)]
pub struct SignalTable {
    signals: Vec<Signal>,
}

impl SignalTable {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册信号，重名返回 `DuplicateName`
    pub fn register<F>(&mut self, name: &str, description: &str, handler: F) -> CfResult<&mut Signal>
    where
        F: Fn(&mut SignalContext<'_>) -> CfResult<ArgumentFrame> + Send + Sync + 'static,
    {
        if !is_valid_name(name) {
            return Err(CfError::invalid_argument(format!("非法信号名 '{}'", name)));
        }
        if self.contains(name) {
            return Err(CfError::duplicate_name("signals", name));
        }
        Ok(self.push(Signal::new(name, description, Arc::new(handler))))
    }

    pub(crate) fn push(&mut self, signal: Signal) -> &mut Signal {
        self.signals.push(signal);
        let idx = self.signals.len() - 1;
        &mut self.signals[idx]
    }

    /// 注销信号，返回是否存在
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.signals.len();
        self.signals.retain(|s| s.name != name);
        self.signals.len() != before
    }

    /// 查找信号
    pub fn get(&self, name: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// 是否存在信号
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 信号名列表（注册顺序）
    pub fn names(&self) -> Vec<&str> {
        self.signals.iter().map(|s| s.name.as_str()).collect()
    }

    /// 遍历信号
    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    /// 信号数量
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// 导出描述帧，每个信号一个子帧
    pub fn describe(&self, include_hidden: bool) -> ArgumentFrame {
        let mut frame = ArgumentFrame::new();
        for signal in self.signals.iter().filter(|s| include_hidden || !s.hidden) {
            let entry = frame.map_mut(&signal.name);
            entry
                .set("pretty_name", signal.pretty_name())
                .set("description", signal.description.as_str())
                .set("hidden", signal.hidden)
                .set("read_only", signal.read_only);
            entry.insert_map("signature", signal.signature.clone());
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut SignalContext<'_>) -> CfResult<ArgumentFrame> {
        Ok(ArgumentFrame::new())
    }

    #[test]
    fn test_register_and_duplicate() {
        let mut table = SignalTable::new();
        table
            .register("solve", "run the solver", noop)
            .unwrap()
            .with_signature(ArgumentFrame::new().with("steps", 1));

        let err = table.register("solve", "again", noop).unwrap_err();
        assert!(matches!(err, CfError::DuplicateName { .. }));
        assert_eq!(table.get("solve").unwrap().description(), "run the solver");
        assert_eq!(table.get("solve").unwrap().signature().len(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut table = SignalTable::new();
        table.register("a", "", noop).unwrap();
        assert!(table.unregister("a"));
        assert!(!table.unregister("a"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_describe_skips_hidden() {
        let mut table = SignalTable::new();
        table.register("shown", "", noop).unwrap().read_only();
        table.register("secret", "", noop).unwrap().hidden();

        let visible = table.describe(false);
        assert_eq!(visible.names(), vec!["shown"]);
        assert_eq!(table.describe(true).len(), 2);
        assert_eq!(
            visible.map("shown").unwrap().get("read_only"),
            Some(&cf_foundation::Value::Bool(true))
        );
    }
}
