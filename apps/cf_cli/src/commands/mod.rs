// apps/cf_cli/src/commands/mod.rs

//! 子命令

pub mod builders;
pub mod call;
pub mod config;
pub mod fanout;
pub mod tree;

use anyhow::{Context, Result};
use cf_config::ArgumentFrame;

/// 解析 `--args` 给出的 JSON 对象
pub(crate) fn parse_args(json: Option<&str>) -> Result<ArgumentFrame> {
    let Some(json) = json else {
        return Ok(ArgumentFrame::new());
    };
    let value: serde_json::Value = serde_json::from_str(json).context("--args 不是合法的 JSON")?;
    Ok(ArgumentFrame::from_plain_json(&value)?)
}
