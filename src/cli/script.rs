//! 回放脚本 - JSONL 格式的事件序列
//!
//! 每行一个事件，例如：
//! `{"event":"notify","title":"Mail","text":"hi","source_id":1,"source_package":"com.mail"}`
//! `{"event":"packet","record":{"0":{"u8":2}}}`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::protocol::WireRecord;
use crate::relay::NormalizedNotification;

/// 脚本事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// 提交一条通知
    Notify(NormalizedNotification),
    /// 模拟手表回包
    Packet { record: WireRecord },
    /// 手机端通知被移除
    SourceDismissed {
        source_id: i32,
        package: String,
        #[serde(default)]
        tag: Option<String>,
    },
    /// 等待（毫秒）
    Sleep { ms: u64 },
}

/// 解析一行脚本；空行和 `#` 注释返回 None
///
/// 没有副标题的 notify 事件按纯文本处理，正文第一行可能被提升为副标题。
pub fn parse_line(line: &str) -> Result<Option<ScriptEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let event = serde_json::from_str(line).with_context(|| format!("invalid script event: {}", line))?;
    Ok(Some(match event {
        ScriptEvent::Notify(n) => ScriptEvent::Notify(n.split_first_line()),
        other => other,
    }))
}
