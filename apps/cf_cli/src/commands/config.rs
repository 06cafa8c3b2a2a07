// apps/cf_cli/src/commands/config.rs

//! 内核配置命令

use anyhow::{Context, Result};
use cf_config::KernelConfig;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// 配置命令参数
#[derive(Args)]
pub struct ConfigArgs {
    /// 把生效的配置写入文件
    #[arg(short, long)]
    pub write: Option<PathBuf>,
}

/// 执行配置命令
pub fn execute(args: ConfigArgs, config: &KernelConfig) -> Result<()> {
    match &args.write {
        Some(path) => {
            config
                .save(path)
                .with_context(|| format!("无法写入配置 {}", path.display()))?;
            info!("配置已写入 {}", path.display());
        }
        None => println!("{}", config.to_json_pretty()?),
    }
    Ok(())
}
