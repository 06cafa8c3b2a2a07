// apps/cf_cli/src/main.rs

//! CF Kernel 命令行界面
//!
//! 检查构建器、由脚本构建组件树、在本地/回环/工作者组上分发信号。
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 5: Application**，只通过分发层访问组件树。

mod commands;
mod demo;
mod script;

use anyhow::{Context, Result};
use cf_config::KernelConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// CF Kernel 组件与信号分发命令行工具
#[derive(Parser)]
#[command(name = "cf_cli")]
#[command(author = "CF Kernel Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Component tree and signal dispatch kernel", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// 内核配置文件 (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 列出构建器
    Builders(commands::builders::BuildersArgs),
    /// 构建并显示组件树
    Tree(commands::tree::TreeArgs),
    /// 调用信号
    Call(commands::call::CallArgs),
    /// 向工作者组扇出信号
    Fanout(commands::fanout::FanOutArgs),
    /// 显示或写出内核配置
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => KernelConfig::load(path)
            .with_context(|| format!("无法加载配置 {}", path.display()))?,
        None => KernelConfig::default(),
    };

    match cli.command {
        Commands::Builders(args) => commands::builders::execute(args),
        Commands::Tree(args) => commands::tree::execute(args, &config),
        Commands::Call(args) => commands::call::execute(args, &config),
        Commands::Fanout(args) => commands::fanout::execute(args, &config),
        Commands::Config(args) => commands::config::execute(args, &config),
    }
}
