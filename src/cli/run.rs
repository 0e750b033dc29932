//! Run 命令 - 回放脚本驱动一个中继会话
//!
//! 发往手表的记录和对手机端的关闭请求以 JSON 行打印到 stdout，日志走 stderr。

use anyhow::Result;
use clap::Args;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

use crate::channel::{AppTarget, ChannelEvent, DeviceChannel, NotificationSource, StaticHostState};
use crate::error::RelayError;
use crate::protocol::WireRecord;
use crate::relay::{RelayEngine, RelayHandle, RelaySession};

use super::script::{parse_line, ScriptEvent};
use super::{load_config, open_history};

/// Run 命令参数
#[derive(Args)]
pub struct RunArgs {
    /// 脚本文件（JSONL），不指定时从 stdin 读取
    #[arg(long, short)]
    pub script: Option<PathBuf>,

    /// 宿主支持列出活跃通知（手表打开时进入列表模式）
    #[arg(long)]
    pub list_mode: bool,

    /// 模拟亮屏
    #[arg(long)]
    pub screen_on: bool,
}

/// 把发往手表的动作打印为 JSON 行（始终视为已连接）
#[derive(Debug, Default)]
pub struct StdoutChannel;

impl StdoutChannel {
    fn print(&self, event: &ChannelEvent) -> Result<()> {
        println!("{}", serde_json::to_string(event)?);
        Ok(())
    }
}

impl DeviceChannel for StdoutChannel {
    fn name(&self) -> &str {
        "stdout"
    }

    fn send(&self, record: &WireRecord) -> Result<()> {
        self.print(&ChannelEvent::Sent(record.clone()))
    }

    fn start_app(&self, target: &AppTarget) -> Result<()> {
        self.print(&ChannelEvent::StartApp(target.clone()))
    }

    fn close_app(&self) -> Result<()> {
        self.print(&ChannelEvent::CloseApp)
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// 把对手机端通知的关闭请求打印为 JSON 行
#[derive(Debug, Default)]
pub struct StdoutSource;

impl NotificationSource for StdoutSource {
    fn dismiss(&self, package: &str, tag: Option<&str>, source_id: i32) -> Result<()> {
        let line = json!({
            "source_dismiss": { "package": package, "tag": tag, "source_id": source_id }
        });
        println!("{}", line);
        Ok(())
    }
}

/// 处理 run 命令
pub async fn handle_run(args: RunArgs, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let history = open_history(&config);
    let host = StaticHostState {
        screen_on: args.screen_on,
        list_mode: args.list_mode,
    };

    let engine = RelayEngine::builder(config, Arc::new(StdoutChannel))
        .with_source(Arc::new(StdoutSource))
        .with_host(Arc::new(host))
        .with_history(Arc::new(history))
        .build();
    let session = RelaySession::start(engine);
    let handle = session.handle();

    let input: Box<dyn AsyncRead + Unpin + Send> = match &args.script {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(input).lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let event = match parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping script line");
                continue;
            }
        };

        match replay(&handle, event).await {
            Ok(()) => {}
            Err(RelayError::SessionClosed) => {
                info!(line = line_no, "Session ended, stopping replay");
                break;
            }
            Err(e) => warn!(line = line_no, error = %e, "Script event failed"),
        }
    }

    let engine = session.stop().await?;
    info!(
        last_close_ms = ?engine.scheduler().last_close_ms(),
        "Replay finished"
    );
    Ok(())
}

async fn replay(handle: &RelayHandle, event: ScriptEvent) -> Result<(), RelayError> {
    match event {
        ScriptEvent::Notify(notification) => {
            let title = notification.title.clone();
            let outcome = handle.submit(notification).await?;
            info!(title = %title, ?outcome, "Notification submitted");
        }
        ScriptEvent::Packet { record } => handle.deliver(record)?,
        ScriptEvent::SourceDismissed {
            source_id,
            package,
            tag,
        } => handle.source_dismissed(source_id, package, tag)?,
        ScriptEvent::Sleep { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
    }
    Ok(())
}
