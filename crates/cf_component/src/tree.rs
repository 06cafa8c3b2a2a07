// crates/cf_component/src/tree.rs

//! 组件树
//!
//! 所有节点存放在一个 [`SlotArena`] 中，由代际校验的 [`ComponentId`]
//! 寻址。所有权只沿父到子的边传递，根节点拥有整棵树：
//!
//! - 删除节点即销毁其整棵子树，所有指向子树的 id 与链接随之失效
//! - 任意位置保存的 `ComponentId` 都是弱引用，每次使用时重新校验
//! - 同一父节点下子节点名唯一
//!
//! 绝对路径从根开始，根本身对应 `cpath:/`；相对路径从起点开始，
//! `..` 上溯到父节点。路径解析不会跟随链接。

use crate::builder::BuilderRegistry;
use crate::component::{Component, ComponentBox, Group, GROUP_TYPE};
use crate::signal::{SignalContext, SignalTable};
use cf_config::{ArgumentFrame, OptionList, PropertyList};
use cf_foundation::uri::is_valid_name;
use cf_foundation::{panic_message, CfError, CfResult, Scheme, SlotArena, SlotId, Uri};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// 组件 id 标记类型
#[derive(Debug, Clone, Copy)]
pub struct ComponentTag;

/// 组件 id
pub type ComponentId = SlotId<ComponentTag>;

/// 默认根节点名
pub const DEFAULT_ROOT_NAME: &str = "Root";

struct Node {
    data: ComponentBox,
    parent: Option<ComponentId>,
    children: Vec<ComponentId>,
}

/// 组件树
pub struct ComponentTree {
    nodes: SlotArena<Node, ComponentTag>,
    root: ComponentId,
    registry: Arc<BuilderRegistry>,
}

impl ComponentTree {
    /// 以默认根节点名创建
    pub fn new(registry: Arc<BuilderRegistry>) -> Self {
        Self::build(registry, DEFAULT_ROOT_NAME)
    }

    /// 以指定根节点名创建
    pub fn with_root_name(registry: Arc<BuilderRegistry>, root_name: &str) -> CfResult<Self> {
        if !is_valid_name(root_name) {
            return Err(CfError::invalid_argument(format!("非法根节点名 '{}'", root_name)));
        }
        Ok(Self::build(registry, root_name))
    }

    fn build(registry: Arc<BuilderRegistry>, root_name: &str) -> Self {
        let mut nodes = SlotArena::new();
        let root = nodes.insert(Node {
            data: ComponentBox::bare(root_name, GROUP_TYPE, Box::new(Group)),
            parent: None,
            children: Vec::new(),
        });
        Self {
            nodes,
            root,
            registry,
        }
    }

    // =========================================================================
    // 基本访问
    // =========================================================================

    /// 根节点
    pub fn root(&self) -> ComponentId {
        self.root
    }

    /// 构建器注册表
    pub fn registry(&self) -> &Arc<BuilderRegistry> {
        &self.registry
    }

    /// 存活节点数量（含根）
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 只有根节点时为真
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// id 是否指向存活节点
    pub fn contains(&self, id: ComponentId) -> bool {
        self.nodes.contains(id)
    }

    fn node(&self, id: ComponentId) -> CfResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| CfError::not_found(format!("<component {}>", id)))
    }

    fn node_mut(&mut self, id: ComponentId) -> CfResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| CfError::not_found(format!("<component {}>", id)))
    }

    /// 节点数据
    pub fn get(&self, id: ComponentId) -> CfResult<&ComponentBox> {
        self.node(id).map(|n| &n.data)
    }

    /// 组件名
    pub fn name(&self, id: ComponentId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.data.name())
    }

    /// 类型名
    pub fn type_name(&self, id: ComponentId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.data.type_name())
    }

    /// 父节点
    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// 子节点（节点不存在时为空）
    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// 按名查找子节点
    pub fn child(&self, parent: ComponentId, name: &str) -> Option<ComponentId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.name(*c) == Some(name))
    }

    /// 按名查找子节点，不存在时返回 `NotFound`
    pub fn get_child(&self, parent: ComponentId, name: &str) -> CfResult<ComponentId> {
        match self.child(parent, name) {
            Some(id) => Ok(id),
            None => {
                let path = self.path_of(parent)?;
                Err(CfError::not_found(
                    path.child(name).map(|p| p.to_string()).unwrap_or_else(|_| name.to_string()),
                ))
            }
        }
    }

    // =========================================================================
    // 类型化访问
    // =========================================================================

    /// 行为对象
    pub fn component<T: Component>(&self, id: ComponentId) -> CfResult<&T> {
        let data = &self.node(id)?.data;
        data.downcast_ref::<T>().ok_or_else(|| {
            CfError::type_mismatch(
                data.name(),
                std::any::type_name::<T>(),
                data.type_name(),
            )
        })
    }

    /// 可变行为对象
    pub fn component_mut<T: Component>(&mut self, id: ComponentId) -> CfResult<&mut T> {
        let data = &mut self.node_mut(id)?.data;
        let (name, type_name) = (data.name.clone(), data.type_name.clone());
        data.downcast_mut::<T>()
            .ok_or_else(|| CfError::type_mismatch(name, std::any::type_name::<T>(), type_name))
    }

    /// 选项表
    pub fn options(&self, id: ComponentId) -> CfResult<&OptionList> {
        Ok(&self.node(id)?.data.options)
    }

    /// 可变选项表
    pub fn options_mut(&mut self, id: ComponentId) -> CfResult<&mut OptionList> {
        Ok(&mut self.node_mut(id)?.data.options)
    }

    /// 属性表
    pub fn properties(&self, id: ComponentId) -> CfResult<&PropertyList> {
        Ok(&self.node(id)?.data.properties)
    }

    /// 可变属性表
    pub fn properties_mut(&mut self, id: ComponentId) -> CfResult<&mut PropertyList> {
        Ok(&mut self.node_mut(id)?.data.properties)
    }

    /// 信号表
    pub fn signals(&self, id: ComponentId) -> CfResult<&SignalTable> {
        Ok(&self.node(id)?.data.signals)
    }

    /// 可变信号表
    pub fn signals_mut(&mut self, id: ComponentId) -> CfResult<&mut SignalTable> {
        Ok(&mut self.node_mut(id)?.data.signals)
    }

    /// 添加标签
    pub fn add_tag(&mut self, id: ComponentId, tag: &str) -> CfResult<()> {
        let tags = &mut self.node_mut(id)?.data.tags;
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
        Ok(())
    }

    /// 是否带有标签
    pub fn has_tag(&self, id: ComponentId, tag: &str) -> bool {
        self.nodes.get(id).is_some_and(|n| n.data.has_tag(tag))
    }

    // =========================================================================
    // 结构修改
    // =========================================================================

    /// 通过注册表构造独立组件
    pub fn create_component(&self, type_name: &str, name: &str) -> CfResult<ComponentBox> {
        self.registry.build(type_name, name)
    }

    /// 把独立组件挂到父节点下
    ///
    /// 同名子节点已存在时返回 `DuplicateName`，原有子节点不受影响，
    /// 传入的组件被丢弃。
    pub fn add_component(&mut self, parent: ComponentId, component: ComponentBox) -> CfResult<ComponentId> {
        self.node(parent)?;
        if self.child(parent, component.name()).is_some() {
            return Err(CfError::duplicate_name(
                self.path_of(parent)?.to_string(),
                component.name(),
            ));
        }
        let name = component.name.clone();
        let type_name = component.type_name.clone();
        let id = self.nodes.insert(Node {
            data: component,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.node_mut(parent)?.children.push(id);
        tracing::info!(
            path = %self.path_of(id)?,
            type_name = %type_name,
            "component '{}' added",
            name
        );
        Ok(id)
    }

    /// 构造并挂载子组件
    pub fn create_child(&mut self, parent: ComponentId, type_name: &str, name: &str) -> CfResult<ComponentId> {
        let component = self.create_component(type_name, name)?;
        self.add_component(parent, component)
    }

    /// 删除父节点下的具名子组件及其子树，返回销毁的节点数
    pub fn remove_component(&mut self, parent: ComponentId, name: &str) -> CfResult<usize> {
        let id = self.get_child(parent, name)?;
        self.remove(id)
    }

    /// 删除组件及其子树，返回销毁的节点数
    pub fn remove(&mut self, id: ComponentId) -> CfResult<usize> {
        if id == self.root {
            return Err(CfError::invalid_argument("不能删除根节点"));
        }
        let path = self.path_of(id)?;
        if let Some(parent) = self.parent(id) {
            self.node_mut(parent)?.children.retain(|c| *c != id);
        }
        let doomed = self.walk(id);
        for victim in &doomed {
            self.nodes.remove(*victim);
        }
        tracing::info!(path = %path, count = doomed.len(), "component subtree removed");
        Ok(doomed.len())
    }

    /// 重命名组件
    pub fn rename(&mut self, id: ComponentId, new_name: &str) -> CfResult<()> {
        if !is_valid_name(new_name) {
            return Err(CfError::invalid_argument(format!("非法组件名 '{}'", new_name)));
        }
        self.node(id)?;
        if let Some(parent) = self.parent(id) {
            if let Some(existing) = self.child(parent, new_name) {
                if existing != id {
                    return Err(CfError::duplicate_name(
                        self.path_of(parent)?.to_string(),
                        new_name,
                    ));
                }
            }
        }
        self.node_mut(id)?.data.name = new_name.to_string();
        Ok(())
    }

    /// 把组件移动到新的父节点下
    ///
    /// 新父节点不能是组件自身或其后代，根节点不能移动。
    pub fn move_to(&mut self, id: ComponentId, new_parent: ComponentId) -> CfResult<()> {
        if id == self.root {
            return Err(CfError::invalid_argument("不能移动根节点"));
        }
        self.node(id)?;
        self.node(new_parent)?;
        if self.is_ancestor_or_self(id, new_parent) {
            return Err(CfError::cycle(
                self.path_of(id)?.to_string(),
                self.path_of(new_parent)?.to_string(),
            ));
        }
        let name = self.node(id)?.data.name.clone();
        if let Some(existing) = self.child(new_parent, &name) {
            if existing != id {
                return Err(CfError::duplicate_name(
                    self.path_of(new_parent)?.to_string(),
                    name,
                ));
            }
            return Ok(());
        }
        if let Some(old_parent) = self.parent(id) {
            self.node_mut(old_parent)?.children.retain(|c| *c != id);
        }
        self.node_mut(new_parent)?.children.push(id);
        self.node_mut(id)?.parent = Some(new_parent);
        tracing::info!(path = %self.path_of(id)?, "component moved");
        Ok(())
    }

    fn is_ancestor_or_self(&self, ancestor: ComponentId, mut id: ComponentId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    // =========================================================================
    // 寻址
    // =========================================================================

    /// 组件的绝对路径
    pub fn path_of(&self, id: ComponentId) -> CfResult<Uri> {
        let mut names = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current)?;
            match node.parent {
                Some(parent) => {
                    names.push(node.data.name.clone());
                    current = parent;
                }
                None => break,
            }
        }
        names.reverse();
        Uri::from_names(names)
    }

    /// 按路径查找组件
    ///
    /// 绝对路径从根开始，相对路径从 `start` 开始。
    pub fn access_component(&self, start: ComponentId, uri: &Uri) -> CfResult<ComponentId> {
        if uri.scheme() != Scheme::Cpath {
            return Err(CfError::malformed(uri.to_string(), "不是组件树路径"));
        }
        let mut current = if uri.is_absolute() {
            self.root
        } else {
            self.node(start)?;
            start
        };
        for segment in uri.segments() {
            current = if segment == ".." {
                self.parent(current)
                    .ok_or_else(|| CfError::not_found(uri.to_string()))?
            } else {
                self.child(current, segment)
                    .ok_or_else(|| CfError::not_found(uri.to_string()))?
            };
        }
        Ok(current)
    }

    /// 按路径文本查找组件
    pub fn access(&self, start: ComponentId, path: &str) -> CfResult<ComponentId> {
        self.access_component(start, &Uri::parse(path)?)
    }

    // =========================================================================
    // 遍历与查询
    // =========================================================================

    /// 先序遍历子树
    pub fn walk(&self, start: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        if !self.contains(start) {
            return out;
        }
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// 查找满足条件的组件（不含起点）
    pub fn find_components<P>(&self, start: ComponentId, recursive: bool, pred: P) -> Vec<ComponentId>
    where
        P: Fn(&ComponentBox) -> bool,
    {
        let candidates: Vec<ComponentId> = if recursive {
            self.walk(start).into_iter().skip(1).collect()
        } else {
            self.children(start).to_vec()
        };
        candidates
            .into_iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| pred(&n.data)))
            .collect()
    }

    /// 按标签递归查找
    pub fn find_by_tag(&self, start: ComponentId, tag: &str) -> Vec<ComponentId> {
        self.find_components(start, true, |c| c.has_tag(tag))
    }

    /// 按类型名递归查找
    pub fn find_by_type(&self, start: ComponentId, type_name: &str) -> Vec<ComponentId> {
        self.find_components(start, true, |c| c.type_name() == type_name)
    }

    /// 子树结构帧：每个节点一个子帧，含 `type` 与 `children`
    pub fn tree_frame(&self, start: ComponentId) -> CfResult<ArgumentFrame> {
        let node = self.node(start)?;
        let mut frame = ArgumentFrame::new().with("type", node.data.type_name());
        let children = frame.map_mut("children");
        for child in &node.children {
            let name = self.node(*child)?.data.name.clone();
            children.insert_map(&name, self.tree_frame(*child)?);
        }
        Ok(frame)
    }

    /// 缩进文本形式的子树
    pub fn render(&self, start: ComponentId) -> CfResult<String> {
        let mut out = String::new();
        let base_depth = self.depth(start)?;
        for id in self.walk(start) {
            let node = self.node(id)?;
            let depth = self.depth(id)? - base_depth;
            out.push_str(&"  ".repeat(depth));
            out.push_str(&node.data.name);
            out.push_str(" [");
            out.push_str(&node.data.type_name);
            out.push_str("]\n");
        }
        Ok(out)
    }

    fn depth(&self, id: ComponentId) -> CfResult<usize> {
        let mut depth = 0;
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent {
            depth += 1;
            current = self.node(parent)?;
        }
        Ok(depth)
    }

    // =========================================================================
    // 信号调用
    // =========================================================================

    /// 调用组件信号
    ///
    /// 未注册的信号返回 `SignalNotFound`；参数先用签名补全。处理函数
    /// 返回的错误和 panic 都转换为带来源路径的 `Application` 错误。
    pub fn call_signal(&mut self, target: ComponentId, signal: &str, mut args: ArgumentFrame) -> CfResult<ArgumentFrame> {
        let origin = self.path_of(target)?;
        let (handler, signature) = match self.node(target)?.data.signals.get(signal) {
            Some(s) => (s.handler(), s.signature().clone()),
            None => return Err(CfError::signal_not_found(origin.to_string(), signal)),
        };
        args.complete_from(&signature);
        tracing::debug!(path = %origin, signal, "invoking signal");

        let mut ctx = SignalContext {
            tree: self,
            target,
            args,
        };
        match panic::catch_unwind(AssertUnwindSafe(|| handler(&mut ctx))) {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => Err(err.into_application(origin.to_string())),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(path = %origin, signal, "signal handler panicked: {}", message);
                Err(CfError::application(
                    format!("处理函数 panic: {}", message),
                    origin.to_string(),
                ))
            }
        }
    }
}

impl std::fmt::Debug for ComponentTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentTree")
            .field("root", &self.root)
            .field("len", &self.nodes.len())
            .field("builders", &self.registry.len())
            .finish()
    }
}

// =============================================================================
// 测试
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ComponentTree {
        ComponentTree::new(Arc::new(BuilderRegistry::with_core_builders()))
    }

    #[test]
    fn test_root_path() {
        let t = tree();
        assert!(t.path_of(t.root()).unwrap().is_root());
        assert_eq!(t.name(t.root()), Some(DEFAULT_ROOT_NAME));
        assert!(t.is_empty());
    }

    #[test]
    fn test_duplicate_add_keeps_original() {
        let mut t = tree();
        let root = t.root();
        let first = t.create_child(root, GROUP_TYPE, "mesh").unwrap();
        let err = t.create_child(root, GROUP_TYPE, "mesh").unwrap_err();

        assert!(matches!(err, CfError::DuplicateName { .. }));
        assert_eq!(t.get_child(root, "mesh").unwrap(), first);
        assert_eq!(t.children(root).len(), 1);
    }

    #[test]
    fn test_relative_access() {
        let mut t = tree();
        let root = t.root();
        let a = t.create_child(root, GROUP_TYPE, "a").unwrap();
        let b = t.create_child(a, GROUP_TYPE, "b").unwrap();
        let c = t.create_child(root, GROUP_TYPE, "c").unwrap();

        assert_eq!(t.access(b, "../../c").unwrap(), c);
        assert_eq!(t.access(b, "/a/b").unwrap(), b);
        assert_eq!(t.access(a, "b").unwrap(), b);
        assert!(t.access(root, "../x").unwrap_err().is_not_found());
        assert!(t.access(root, "/a/zz").unwrap_err().is_not_found());
        assert!(matches!(
            t.access(root, "file:/a"),
            Err(CfError::Malformed { .. })
        ));
    }

    #[test]
    fn test_remove_invalidates_subtree() {
        let mut t = tree();
        let root = t.root();
        let a = t.create_child(root, GROUP_TYPE, "a").unwrap();
        let b = t.create_child(a, GROUP_TYPE, "b").unwrap();

        assert_eq!(t.remove_component(root, "a").unwrap(), 2);
        assert!(!t.contains(a));
        assert!(!t.contains(b));
        assert!(t.path_of(b).unwrap_err().is_not_found());
        assert!(t.remove(root).is_err());
    }

    #[test]
    fn test_rename_and_move() {
        let mut t = tree();
        let root = t.root();
        let a = t.create_child(root, GROUP_TYPE, "a").unwrap();
        let b = t.create_child(root, GROUP_TYPE, "b").unwrap();

        assert!(matches!(t.rename(b, "a"), Err(CfError::DuplicateName { .. })));
        t.rename(b, "bb").unwrap();
        t.move_to(b, a).unwrap();
        assert_eq!(t.path_of(b).unwrap().to_string(), "cpath:/a/bb");
        assert!(matches!(t.move_to(a, b), Err(CfError::CycleDetected { .. })));
        assert!(t.move_to(root, a).is_err());
    }

    #[test]
    fn test_walk_and_find() {
        let mut t = tree();
        let root = t.root();
        let a = t.create_child(root, GROUP_TYPE, "a").unwrap();
        let b = t.create_child(a, GROUP_TYPE, "b").unwrap();
        let c = t.create_child(root, GROUP_TYPE, "c").unwrap();
        t.add_tag(b, "mesh").unwrap();

        assert_eq!(t.walk(root), vec![root, a, b, c]);
        assert_eq!(t.find_by_tag(root, "mesh"), vec![b]);
        assert_eq!(t.find_by_type(root, GROUP_TYPE).len(), 3);
        assert_eq!(t.find_components(root, false, |_| true), vec![a, c]);
    }

    #[test]
    fn test_render_and_tree_frame() {
        let mut t = tree();
        let root = t.root();
        let a = t.create_child(root, GROUP_TYPE, "a").unwrap();
        t.create_child(a, GROUP_TYPE, "b").unwrap();

        let text = t.render(root).unwrap();
        assert!(text.contains("Root [cf.common.Group]"));
        assert!(text.contains("    b [cf.common.Group]"));
        assert_eq!(t.render(a).unwrap(), "a [cf.common.Group]\n  b [cf.common.Group]\n");

        let frame = t.tree_frame(root).unwrap();
        let a_frame = frame.map("children").unwrap().map("a").unwrap();
        assert!(a_frame.map("children").unwrap().map("b").is_some());
    }

    #[test]
    fn test_signal_not_found() {
        let mut t = tree();
        let root = t.root();
        let err = t.call_signal(root, "execute", ArgumentFrame::new()).unwrap_err();
        assert!(matches!(err, CfError::SignalNotFound { .. }));
    }
}
