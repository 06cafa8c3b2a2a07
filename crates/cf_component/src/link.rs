// crates/cf_component/src/link.rs

//! 链接组件
//!
//! [`Link`] 以弱引用的方式指向树中另一个组件：目标可以是一个
//! [`ComponentId`]，也可以是一条（相对链接自身解析的）路径。链接不拥有
//! 目标，目标被销毁后 [`ComponentTree::follow`] 返回 `NotFound`，
//! 不会得到过期节点。

use crate::component::{Component, Definition};
use crate::tree::{ComponentId, ComponentTree};
use cf_config::ArgumentFrame;
use cf_foundation::{CfError, CfResult, Uri, Value};

/// 链接组件类型名
pub const LINK_TYPE: &str = "cf.common.Link";

/// 链接目标
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LinkTarget {
    /// 未设置
    #[default]
    Unset,
    /// 直接指向组件 id
    Id(ComponentId),
    /// 指向路径，每次跟随时重新解析
    Path(Uri),
}

/// 链接组件
#[derive(Debug, Default)]
pub struct Link {
    target: LinkTarget,
}

impl Link {
    /// 当前目标
    pub fn target(&self) -> &LinkTarget {
        &self.target
    }
}

impl Component for Link {
    fn define(&mut self, def: &mut Definition<'_>) -> CfResult<()> {
        def.signals
            .register("change_link", "重新指定链接目标", |ctx| {
                let target = ctx.args.uri("target")?;
                ctx.tree.link_to_path(ctx.target, target)?;
                let resolved = ctx.tree.follow(ctx.target)?;
                Ok(ArgumentFrame::new().with("target", ctx.tree.path_of(resolved)?))
            })?
            .with_signature({
                let mut sig = ArgumentFrame::new().with("target", Value::Text(String::new()));
                sig.describe("target", "目标组件路径");
                sig
            });
        def.tag("link");
        Ok(())
    }
}

impl ComponentTree {
    /// 是否为链接组件
    pub fn is_link(&self, id: ComponentId) -> bool {
        self.component::<Link>(id).is_ok()
    }

    /// 链接当前目标
    pub fn link_target(&self, link: ComponentId) -> CfResult<&LinkTarget> {
        Ok(self.component::<Link>(link)?.target())
    }

    /// 把链接指向组件 id，目标必须存活
    pub fn link_to(&mut self, link: ComponentId, target: ComponentId) -> CfResult<()> {
        if !self.contains(target) {
            return Err(CfError::not_found(format!("<component {}>", target)));
        }
        self.component_mut::<Link>(link)?.target = LinkTarget::Id(target);
        Ok(())
    }

    /// 把链接指向路径
    pub fn link_to_path(&mut self, link: ComponentId, path: Uri) -> CfResult<()> {
        if !path.is_in_tree() {
            return Err(CfError::malformed(path.to_string(), "链接目标必须是组件树路径"));
        }
        self.component_mut::<Link>(link)?.target = LinkTarget::Path(path);
        Ok(())
    }

    /// 跟随链接
    pub fn follow(&self, link: ComponentId) -> CfResult<ComponentId> {
        let origin = self.path_of(link)?;
        match self.link_target(link)? {
            LinkTarget::Unset => Err(CfError::not_found(format!("{} (链接未设置)", origin))),
            LinkTarget::Id(id) if self.contains(*id) => Ok(*id),
            LinkTarget::Id(_) => Err(CfError::not_found(format!("{} (链接目标已销毁)", origin))),
            LinkTarget::Path(path) => self.access_component(link, path),
        }
    }
}
