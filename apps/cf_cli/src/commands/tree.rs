// apps/cf_cli/src/commands/tree.rs

//! 组件树显示命令

use crate::script::TreeScript;
use anyhow::Result;
use cf_config::KernelConfig;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// 组件树显示参数
#[derive(Args)]
pub struct TreeArgs {
    /// 树脚本（缺省为演示树）
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,

    /// 同时列出每个组件的选项
    #[arg(long)]
    pub options: bool,
}

/// 执行组件树显示命令
pub fn execute(args: TreeArgs, config: &KernelConfig) -> Result<()> {
    let script = match &args.script {
        Some(path) => TreeScript::load(path)?,
        None => TreeScript::demo(),
    };
    let tree = script.build(config)?;
    let root = tree.root();
    info!("组件数: {}", tree.len());

    if args.json {
        let frame = tree.tree_frame(root)?;
        println!("{}", serde_json::to_string_pretty(&frame.to_plain_json())?);
        return Ok(());
    }

    print!("{}", tree.render(root)?);
    if args.options {
        for id in tree.walk(root) {
            let options = tree.options(id)?;
            if options.is_empty() {
                continue;
            }
            println!("\n{}", tree.path_of(id)?);
            print!("{}", options.to_frame());
        }
    }
    Ok(())
}
