//! 中继会话 - 在单个 tokio 任务中独占运行 RelayEngine
//!
//! 所有触发源（新通知、手表回包、手机端关闭事件）都通过命令通道进入，
//! 按到达顺序逐条处理，每次状态转换相对其他转换都是原子的。

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RelayError, RelayResult};
use crate::protocol::WireRecord;

use super::engine::{RelayEngine, SubmitOutcome};
use super::transfer::NormalizedNotification;

/// 会话命令
#[derive(Debug)]
pub enum RelayCommand {
    Submit {
        notification: NormalizedNotification,
        reply: oneshot::Sender<RelayResult<SubmitOutcome>>,
    },
    /// 手表发来的原始记录
    Packet(WireRecord),
    SourceDismissed {
        source_id: i32,
        package: String,
        tag: Option<String>,
    },
    Stop,
}

/// 会话句柄，可克隆后分发给各个触发源
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayHandle {
    /// 提交通知，只等待入口判定，不等待手表回包
    pub async fn submit(&self, notification: NormalizedNotification) -> RelayResult<SubmitOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Submit { notification, reply })?;
        rx.await.map_err(|_| RelayError::SessionClosed)?
    }

    /// 投递一条手表回包
    pub fn deliver(&self, record: WireRecord) -> RelayResult<()> {
        self.send(RelayCommand::Packet(record))
    }

    /// 通知手机端的某条通知已被移除
    pub fn source_dismissed(
        &self,
        source_id: i32,
        package: impl Into<String>,
        tag: Option<String>,
    ) -> RelayResult<()> {
        self.send(RelayCommand::SourceDismissed {
            source_id,
            package: package.into(),
            tag,
        })
    }

    pub fn stop(&self) -> RelayResult<()> {
        self.send(RelayCommand::Stop)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, command: RelayCommand) -> RelayResult<()> {
        self.tx.send(command).map_err(|_| RelayError::SessionClosed)
    }
}

/// 运行中的会话
pub struct RelaySession {
    handle: RelayHandle,
    task: JoinHandle<RelayEngine>,
}

impl RelaySession {
    /// 启动会话任务（需要在 tokio 运行时内调用）
    pub fn start(engine: RelayEngine) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(engine, rx));
        info!("Relay session started");
        Self {
            handle: RelayHandle { tx },
            task,
        }
    }

    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// 停止会话并取回引擎
    pub async fn stop(self) -> RelayResult<RelayEngine> {
        // 任务可能已经异常结束
        let _ = self.handle.stop();
        self.join().await
    }

    /// 等待会话任务结束（收到 Stop）
    pub async fn join(self) -> RelayResult<RelayEngine> {
        self.task.await.map_err(|e| {
            warn!(error = %e, "Relay session task failed");
            RelayError::SessionClosed
        })
    }
}

async fn run(mut engine: RelayEngine, mut rx: mpsc::UnboundedReceiver<RelayCommand>) -> RelayEngine {
    while let Some(command) = rx.recv().await {
        match command {
            RelayCommand::Submit { notification, reply } => {
                let result = engine.submit(notification);
                if let Err(e) = &result {
                    warn!(error = %e, "Notification submit failed");
                }
                // 调用方可能已放弃等待
                let _ = reply.send(result);
            }
            RelayCommand::Packet(record) => {
                if let Err(e) = engine.dispatch(&record) {
                    warn!(error = %e, "Failed to handle device packet");
                }
            }
            RelayCommand::SourceDismissed {
                source_id,
                package,
                tag,
            } => match engine.source_dismissed(source_id, &package, tag.as_deref()) {
                Ok(outcome) => debug!(source_id, ?outcome, "Source dismissal handled"),
                Err(e) => warn!(source_id, error = %e, "Failed to sync dismissal"),
            },
            RelayCommand::Stop => {
                debug!("Stop requested");
                break;
            }
        }
    }

    engine.stop();
    engine
}
