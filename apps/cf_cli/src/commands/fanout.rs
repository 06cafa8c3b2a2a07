// apps/cf_cli/src/commands/fanout.rs

//! 扇出命令
//!
//! 启动 N 个进程内工作者，每个持有一棵按脚本构建的树，其中演示
//! 求解器的 `rank` 选项设为工作者的 rank，然后把同一信号扇出给全部
//! 工作者。

use super::parse_args;
use crate::demo;
use crate::script::TreeScript;
use anyhow::{Context, Result};
use cf_dispatch::prelude::*;
use cf_dispatch::{FanOutManager, LocalWorkerGroup, LoggingListener, Outcome};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// 扇出参数
#[derive(Args)]
pub struct FanOutArgs {
    /// 工作者数量
    #[arg(short, long, default_value = "4")]
    pub workers: usize,

    /// 信号名
    #[arg(long, default_value = "solve")]
    pub signal: String,

    /// 树脚本（缺省为演示树）
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// 目标组件路径
    #[arg(short, long, default_value = "/solver1")]
    pub path: String,

    /// 参数（JSON 对象）
    #[arg(short, long)]
    pub args: Option<String>,

    /// 让该 rank 的 solve 失败
    #[arg(long)]
    pub fail_rank: Option<usize>,

    /// 超时 [毫秒]，覆盖配置文件
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// 执行扇出命令
pub fn execute(args: FanOutArgs, config: &KernelConfig) -> Result<()> {
    let mut config = config.clone();
    if let Some(ms) = args.timeout_ms {
        config.fanout_timeout_ms = ms;
    }
    config.validate()?;

    let script = match &args.script {
        Some(path) => TreeScript::load(path)?,
        None => TreeScript::demo(),
    };
    let mut frame = parse_args(args.args.as_deref())?;
    if let Some(rank) = args.fail_rank {
        frame.set("fail_rank", rank as i64);
    }
    let call = Call::new(TargetAddress::workers(Uri::parse(&args.path)?), args.signal.as_str(), frame);

    let group = LocalWorkerGroup::spawn(args.workers, &config, |rank| {
        let mut tree = script
            .build(&config)
            .map_err(|e| CfError::config(format!("{:#}", e)))?;
        demo::assign_rank(&mut tree, rank)?;
        Ok(tree)
    })
    .context("无法启动工作者组")?;

    let events = EventDispatcher::shared();
    events.subscribe(Interest::All, Arc::new(LoggingListener::new("fanout")));
    let manager = FanOutManager::with_config(group, &config).with_events(events);

    info!(
        "向 {} 个工作者扇出 '{}'，超时 {} ms",
        manager.size(),
        args.signal,
        config.fanout_timeout_ms
    );
    let started = Instant::now();
    let report = manager.fan_out(&call)?;
    let elapsed = started.elapsed();

    for (rank, reply) in report.replies.iter().enumerate() {
        match reply.as_ref().map(|r| &r.outcome) {
            Some(Outcome::Success(frame)) => {
                println!("rank {}: 成功", rank);
                print!("{}", frame);
            }
            Some(Outcome::Failure(err)) => println!("rank {}: 失败: {}", rank, err),
            None => println!("rank {}: 无应答", rank),
        }
    }
    info!("扇出结束，耗时 {:.1} ms", elapsed.as_secs_f64() * 1000.0);

    report
        .into_result()
        .with_context(|| format!("扇出 '{}' 失败", args.signal))?;
    Ok(())
}
