// apps/cf_cli/src/script.rs

//! 组件树脚本
//!
//! JSON 格式：
//!
//! ```json
//! {
//!   "components": [
//!     { "path": "/model", "type": "cf.common.Group" },
//!     { "path": "/model/solver1", "type": "cf.demo.Solver", "options": { "cfl": 0.4 } },
//!     { "path": "/current", "type": "cf.common.Link", "link": "/model/solver1" }
//!   ]
//! }
//! ```
//!
//! 组件按出现顺序创建，父组件必须先出现。链接在全部组件创建后再连接。

use crate::demo;
use anyhow::{bail, Context, Result};
use cf_component::prelude::*;
use serde::Deserialize;
use std::path::Path;

/// 树脚本
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeScript {
    /// 组件列表
    #[serde(default)]
    pub components: Vec<ScriptEntry>,
}

/// 脚本条目
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEntry {
    /// 绝对路径
    pub path: String,
    /// 构建器类型名
    #[serde(rename = "type")]
    pub type_name: String,
    /// 选项取值
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    /// 链接目标
    #[serde(default)]
    pub link: Option<String>,
}

impl TreeScript {
    /// 从文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取脚本 {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("脚本格式错误: {}", path.display()))
    }

    /// 没有脚本时使用的演示树：`/solver1`
    pub fn demo() -> Self {
        Self {
            components: vec![ScriptEntry {
                path: "/solver1".to_string(),
                type_name: demo::SOLVER_TYPE.to_string(),
                options: None,
                link: None,
            }],
        }
    }

    /// 构建组件树
    pub fn build(&self, config: &KernelConfig) -> Result<ComponentTree> {
        let mut tree = ComponentTree::with_root_name(demo::registry()?, &config.root_name)?;
        let root = tree.root();
        let mut links = Vec::new();

        for entry in &self.components {
            let path = Uri::parse(&entry.path)?;
            if !path.is_absolute() || path.is_root() {
                bail!("脚本路径必须是非根的绝对路径: {}", entry.path);
            }
            let (Some(parent_path), Some(name)) = (path.parent(), path.name()) else {
                bail!("无法拆分路径: {}", entry.path);
            };
            let parent = tree
                .access_component(root, &parent_path)
                .with_context(|| format!("{} 的父组件不存在", entry.path))?;
            let id = tree
                .create_child(parent, &entry.type_name, name)
                .with_context(|| format!("无法创建 {}", entry.path))?;

            if let Some(options) = &entry.options {
                let frame = ArgumentFrame::from_plain_json(options)?;
                tree.options_mut(id)?
                    .configure(&frame)
                    .with_context(|| format!("{} 的选项无效", entry.path))?;
            }
            if let Some(target) = &entry.link {
                links.push((id, Uri::parse(target)?));
            }
        }

        for (link, target) in links {
            tree.link_to_path(link, target)?;
            tree.follow(link)?;
        }
        tracing::debug!(components = tree.len(), "tree script built");
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCRIPT: &str = r#"{
        "components": [
            { "path": "/model", "type": "cf.common.Group" },
            { "path": "/model/solver1", "type": "cf.demo.Solver", "options": { "cfl": 0.4, "scheme": "roe" } },
            { "path": "/current", "type": "cf.common.Link", "link": "/model/solver1" }
        ]
    }"#;

    fn write_script(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_build_from_file() {
        let file = write_script(SCRIPT);
        let script = TreeScript::load(file.path()).unwrap();
        let tree = script.build(&KernelConfig::default()).unwrap();

        let solver = tree.access(tree.root(), "/model/solver1").unwrap();
        assert_eq!(tree.options(solver).unwrap().value::<f64>("cfl").unwrap(), 0.4);
        let link = tree.access(tree.root(), "/current").unwrap();
        assert_eq!(tree.follow(link).unwrap(), solver);
    }

    #[test]
    fn test_missing_parent_rejected() {
        let file = write_script(r#"{ "components": [ { "path": "/a/b", "type": "cf.common.Group" } ] }"#);
        let script = TreeScript::load(file.path()).unwrap();
        assert!(script.build(&KernelConfig::default()).is_err());
    }

    #[test]
    fn test_invalid_option_rejected() {
        let file = write_script(
            r#"{ "components": [ { "path": "/s", "type": "cf.demo.Solver", "options": { "scheme": "upwind" } } ] }"#,
        );
        let script = TreeScript::load(file.path()).unwrap();
        assert!(script.build(&KernelConfig::default()).is_err());
    }

    #[test]
    fn test_demo_tree() {
        let tree = TreeScript::demo().build(&KernelConfig::default()).unwrap();
        assert!(tree.access(tree.root(), "/solver1").is_ok());
    }
}
