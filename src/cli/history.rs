//! History 命令 - 查看最近转发的通知

use anyhow::Result;
use clap::Args;
use std::path::Path;

use crate::history::{HistoryEntry, HistoryStore};

use super::{format_output, load_config, open_history};

/// History 命令参数
#[derive(Args)]
pub struct HistoryArgs {
    /// 显示条数
    #[arg(long, short, default_value = "20")]
    pub limit: usize,

    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 单行文本格式
pub fn format_entry(entry: &HistoryEntry) -> String {
    let ts = entry.ts.format("%Y-%m-%d %H:%M");
    let mut line = format!("{}  {}", ts, entry.title);
    if !entry.subtitle.is_empty() {
        line.push_str(" / ");
        line.push_str(&entry.subtitle);
    }
    if !entry.text.is_empty() {
        let first_line = entry.text.lines().next().unwrap_or_default();
        line.push_str(": ");
        line.push_str(first_line);
    }
    line
}

/// 处理 history 命令
pub fn handle_history(args: HistoryArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = open_history(&config);
    let entries = store.read_recent(args.limit);

    if args.json {
        println!("{}", format_output(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No notifications in {}", store.path().display());
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}
