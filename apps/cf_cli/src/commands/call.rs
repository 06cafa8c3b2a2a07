// apps/cf_cli/src/commands/call.rs

//! 信号调用命令
//!
//! 在本地处理线程上调用信号；加 `--loopback` 时再经回环通道把同一
//! 调用发给另一棵按同一脚本构建的树，并比较两份应答的编码字节。

use super::parse_args;
use crate::script::TreeScript;
use anyhow::{anyhow, bail, Result};
use cf_dispatch::prelude::*;
use cf_dispatch::{encode_reply, loopback_pair, LoggingListener, Outcome, RemoteClient, SignalServer};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::info;

/// 信号调用参数
#[derive(Args)]
pub struct CallArgs {
    /// 树脚本（缺省为演示树）
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// 目标组件路径
    #[arg(short, long, default_value = "/solver1")]
    pub path: String,

    /// 信号名
    #[arg(long, default_value = "solve")]
    pub signal: String,

    /// 参数（JSON 对象）
    #[arg(short, long)]
    pub args: Option<String>,

    /// 同时经回环通道调用并比较应答
    #[arg(long)]
    pub loopback: bool,

    /// 以 JSON 输出结果
    #[arg(long)]
    pub json: bool,
}

/// 执行信号调用命令
pub fn execute(args: CallArgs, config: &KernelConfig) -> Result<()> {
    let script = match &args.script {
        Some(path) => TreeScript::load(path)?,
        None => TreeScript::demo(),
    };
    let call = Call::local(&args.path, args.signal.as_str(), parse_args(args.args.as_deref())?)?;

    let events = EventDispatcher::shared();
    events.subscribe(Interest::All, Arc::new(LoggingListener::new("call").verbose()));

    let processor = {
        let script = script.clone();
        let owned = config.clone();
        SignalProcessor::spawn(config, Arc::clone(&events), move || {
            script
                .build(&owned)
                .map_err(|e| CfError::config(format!("{:#}", e)))
        })?
    };
    let reply = processor.call(call.clone())?;
    processor.shutdown()?;
    print_reply(&reply, args.json)?;

    if args.loopback {
        let remote = call_over_loopback(&script, config, call, events)?;
        if encode_reply(&remote)? == encode_reply(&reply)? {
            println!("回环应答与本地应答逐字节一致");
        } else {
            print_reply(&remote, args.json)?;
            bail!("回环应答与本地应答不一致");
        }
    }

    match reply.into_result() {
        Ok(_) => Ok(()),
        Err(err) => Err(anyhow!(err).context(format!("调用 {} 的 '{}' 失败", args.path, args.signal))),
    }
}

fn call_over_loopback(
    script: &TreeScript,
    config: &KernelConfig,
    call: Call,
    events: Arc<EventDispatcher>,
) -> Result<Reply> {
    let tree = script.build(config)?;
    let (client_end, server_end) = loopback_pair();
    let capacity = config.reply_cache_capacity;
    let server = thread::Builder::new()
        .name("cf-loopback".to_string())
        .spawn(move || {
            SignalServer::new(server_end, tree)
                .with_cache_capacity(capacity)
                .serve()
        })?;

    let client = RemoteClient::with_events("loopback", client_end, events)?;
    let reply = client.call(call)?;
    drop(client);

    let served = server
        .join()
        .map_err(|_| anyhow!("回环服务线程 panic"))??;
    info!("回环服务处理了 {} 条消息", served);
    Ok(reply)
}

fn print_reply(reply: &Reply, json: bool) -> Result<()> {
    match &reply.outcome {
        Outcome::Success(frame) if json => {
            println!("{}", serde_json::to_string_pretty(&frame.to_plain_json())?);
        }
        Outcome::Success(frame) => {
            println!("{} 成功", reply.origin);
            print!("{}", frame);
        }
        Outcome::Failure(err) => println!("{} 失败: {}", reply.origin, err),
    }
    Ok(())
}
