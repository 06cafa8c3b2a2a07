// crates/cf_component/src/core_signals.rs

//! 每个组件都具备的核心信号
//!
//! | 信号 | 参数 | 返回 |
//! |------|------|------|
//! | `create_component` | `name`, `type` | `path` |
//! | `delete_component` | `name` | `removed` |
//! | `rename_component` | `new_name` | `path` |
//! | `move_component` | `parent` | `path` |
//! | `list_tree` | - | 子树结构帧 |
//! | `list_options` | - | 选项描述帧 |
//! | `list_properties` | - | 属性帧 |
//! | `list_signals` | `include_hidden` | 信号描述帧 |
//! | `configure` | 选项名 = 值 | - |

use crate::signal::{Signal, SignalContext, SignalHandler, SignalTable};
use cf_config::ArgumentFrame;
use cf_foundation::CfResult;
use std::sync::Arc;

/// 核心信号名
pub const CORE_SIGNALS: [&str; 9] = [
    "create_component",
    "delete_component",
    "rename_component",
    "move_component",
    "list_tree",
    "list_options",
    "list_properties",
    "list_signals",
    "configure",
];

fn handler<F>(f: F) -> SignalHandler
where
    F: Fn(&mut SignalContext<'_>) -> CfResult<ArgumentFrame> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn signature(fields: &[(&str, &str)]) -> ArgumentFrame {
    let mut frame = ArgumentFrame::new();
    for (name, description) in fields {
        frame.set(name, "");
        frame.describe(name, *description);
    }
    frame
}

/// 向新表安装核心信号
pub(crate) fn install(table: &mut SignalTable) {
    table
        .push(Signal::new(
            "create_component",
            "在当前组件下创建子组件",
            handler(|ctx| {
                let name = ctx.args.value::<String>("name")?;
                let type_name = ctx.args.value::<String>("type")?;
                let id = ctx.tree.create_child(ctx.target, &type_name, &name)?;
                Ok(ArgumentFrame::new().with("path", ctx.tree.path_of(id)?))
            }),
        ))
        .with_signature(signature(&[("name", "子组件名"), ("type", "构建器类型名")]));

    table
        .push(Signal::new(
            "delete_component",
            "删除具名子组件及其子树",
            handler(|ctx| {
                let name = ctx.args.value::<String>("name")?;
                let removed = ctx.tree.remove_component(ctx.target, &name)?;
                Ok(ArgumentFrame::new().with("removed", removed as i64))
            }),
        ))
        .with_signature(signature(&[("name", "子组件名")]));

    table
        .push(Signal::new(
            "rename_component",
            "重命名当前组件",
            handler(|ctx| {
                let new_name = ctx.args.value::<String>("new_name")?;
                ctx.tree.rename(ctx.target, &new_name)?;
                Ok(ArgumentFrame::new().with("path", ctx.tree.path_of(ctx.target)?))
            }),
        ))
        .with_signature(signature(&[("new_name", "新名称")]));

    table
        .push(Signal::new(
            "move_component",
            "把当前组件移动到新的父组件下",
            handler(|ctx| {
                let parent_path = ctx.args.uri("parent")?;
                let parent = ctx.tree.access_component(ctx.target, &parent_path)?;
                ctx.tree.move_to(ctx.target, parent)?;
                Ok(ArgumentFrame::new().with("path", ctx.tree.path_of(ctx.target)?))
            }),
        ))
        .with_signature(signature(&[("parent", "新父组件路径（相对当前组件）")]));

    table
        .push(Signal::new(
            "list_tree",
            "列出子树结构",
            handler(|ctx| ctx.tree.tree_frame(ctx.target)),
        ))
        .read_only();

    table
        .push(Signal::new(
            "list_options",
            "列出选项",
            handler(|ctx| Ok(ctx.tree.options(ctx.target)?.describe())),
        ))
        .read_only();

    table
        .push(Signal::new(
            "list_properties",
            "列出属性",
            handler(|ctx| Ok(ctx.tree.properties(ctx.target)?.to_frame())),
        ))
        .read_only();

    table
        .push(Signal::new(
            "list_signals",
            "列出信号",
            handler(|ctx| {
                let include_hidden = ctx.args.value::<bool>("include_hidden")?;
                Ok(ctx.tree.signals(ctx.target)?.describe(include_hidden))
            }),
        ))
        .read_only()
        .with_signature(ArgumentFrame::new().with("include_hidden", false));

    table.push(Signal::new(
        "configure",
        "批量设置选项",
        handler(|ctx| {
            ctx.tree.options_mut(ctx.target)?.configure(&ctx.args)?;
            Ok(ArgumentFrame::new())
        }),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuilderRegistry;
    use crate::component::GROUP_TYPE;
    use crate::tree::ComponentTree;
    use cf_foundation::{CfError, Uri};

    fn tree() -> ComponentTree {
        ComponentTree::new(BuilderRegistry::with_core_builders().into_shared())
    }

    #[test]
    fn test_every_component_has_core_signals() {
        let mut t = tree();
        let root = t.root();
        let child = t.create_child(root, GROUP_TYPE, "a").unwrap();
        for id in [root, child] {
            let names = t.signals(id).unwrap().names();
            assert_eq!(names, CORE_SIGNALS.to_vec());
        }
    }

    #[test]
    fn test_create_and_delete_via_signals() {
        let mut t = tree();
        let root = t.root();
        let args = ArgumentFrame::new()
            .with("name", "mesh")
            .with("type", GROUP_TYPE);
        let reply = t.call_signal(root, "create_component", args).unwrap();
        assert_eq!(reply.value::<Uri>("path").unwrap().path(), "/mesh");

        let reply = t
            .call_signal(root, "delete_component", ArgumentFrame::new().with("name", "mesh"))
            .unwrap();
        assert_eq!(reply.value::<i64>("removed").unwrap(), 1);
        assert!(t.is_empty());
    }

    #[test]
    fn test_handler_error_becomes_application_error() {
        let mut t = tree();
        let root = t.root();
        let args = ArgumentFrame::new()
            .with("name", "x")
            .with("type", "cf.nope.Missing");
        let err = t.call_signal(root, "create_component", args).unwrap_err();

        assert!(matches!(err, CfError::Application { .. }));
        assert_eq!(err.origin(), Some("cpath:/"));
    }

    #[test]
    fn test_rename_and_move_via_signals() {
        let mut t = tree();
        let root = t.root();
        t.create_child(root, GROUP_TYPE, "a").unwrap();
        let b = t.create_child(root, GROUP_TYPE, "b").unwrap();

        t.call_signal(b, "rename_component", ArgumentFrame::new().with("new_name", "bb"))
            .unwrap();
        let reply = t
            .call_signal(b, "move_component", ArgumentFrame::new().with("parent", "../a"))
            .unwrap();
        assert_eq!(reply.value::<Uri>("path").unwrap().path(), "/a/bb");
    }

    #[test]
    fn test_listing_signals() {
        let mut t = tree();
        let root = t.root();
        t.create_child(root, GROUP_TYPE, "a").unwrap();

        let tree_frame = t.call_signal(root, "list_tree", ArgumentFrame::new()).unwrap();
        assert!(tree_frame.map("children").unwrap().map("a").is_some());

        let signals = t.call_signal(root, "list_signals", ArgumentFrame::new()).unwrap();
        assert_eq!(signals.len(), CORE_SIGNALS.len());

        let options = t.call_signal(root, "list_options", ArgumentFrame::new()).unwrap();
        assert!(options.is_empty());
    }
}
