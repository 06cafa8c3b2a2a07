// apps/cf_cli/src/commands/builders.rs

//! 构建器列表命令

use crate::demo;
use anyhow::Result;
use clap::Args;

/// 构建器列表参数
#[derive(Args)]
pub struct BuildersArgs {
    /// 只列出该命名空间下的类型（如 `cf.demo`）
    #[arg(short, long)]
    pub namespace: Option<String>,
}

/// 执行构建器列表命令
pub fn execute(args: BuildersArgs) -> Result<()> {
    let registry = demo::registry()?;
    let names = match &args.namespace {
        Some(ns) => registry.list_namespace(ns),
        None => registry.list_registered(),
    };

    if names.is_empty() {
        println!("没有匹配的构建器");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}
