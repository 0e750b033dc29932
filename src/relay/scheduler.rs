//! 传输调度器 - 手表通信状态机
//!
//! 手表一次只处理一个命令：任何时刻最多只有一条命令在等待回包。
//! 所有状态（登记表、发送队列、关闭队列、会话阶段）只归调度器所有，
//! 入站回包和新通知都通过这里的方法依次推进状态。

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::channel::{AppTarget, DeviceChannel, HostState, NotificationSource};
use crate::clock::Clock;
use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::history::HistoryStore;
use crate::protocol::{encode, HeaderFlags, OutboundCommand, TextSize};

use super::registry::ActiveRegistry;
use super::transfer::PendingTransfer;

/// 超过此时长没有写入且仍有传输在途，视为会话卡死
pub const STALE_AFTER_MS: i64 = 2_000;

/// 历史清理间隔
pub const PRUNE_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// 调度器用到的外部协作者
#[derive(Clone)]
pub struct Collaborators {
    pub channel: Arc<dyn DeviceChannel>,
    pub source: Arc<dyn NotificationSource>,
    pub host: Arc<dyn HostState>,
    pub history: Arc<dyn HistoryStore>,
    pub clock: Arc<dyn Clock>,
}

/// 调度器配置（从 RelayConfig 中取出的部分）
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub text_size: TextSize,
    pub auto_switch_app: bool,
    pub periodic_vibrate: bool,
    pub response_timeout_ms: u32,
    pub launch_on_close: Option<String>,
    pub registry_capacity: usize,
}

impl SchedulerSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            text_size: config.text_size,
            auto_switch_app: config.auto_switch_app,
            periodic_vibrate: config.periodic_vibrate,
            response_timeout_ms: config.response_timeout_ms,
            launch_on_close: config.launch_on_close.clone(),
            registry_capacity: config.registry_capacity.max(1),
        }
    }
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    SendingNotification,
    Dismissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Sending(i32),
    Dismissing { transfer_id: i32, dont_close: bool },
}

/// enqueue 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Dispatched,
    Queued,
}

/// 手表打开后的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOpened {
    /// 重发或继续了已有工作
    Resumed,
    /// 没有待发内容，已让手表进入列表模式
    EnteredListMode,
    /// 没有待发内容，宿主不支持列表模式，需要显示最近历史
    NeedsDefaultList,
}

/// 关闭命令的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Sent,
    Queued,
}

/// 传输调度器
pub struct TransferScheduler {
    io: Collaborators,
    settings: SchedulerSettings,
    registry: ActiveRegistry,
    send_queue: VecDeque<Arc<PendingTransfer>>,
    dismiss_queue: VecDeque<i32>,
    phase: Phase,
    last_communication_ms: i64,
    last_prune_ms: Option<i64>,
    last_close_ms: Option<i64>,
    closed: bool,
}

impl TransferScheduler {
    pub fn new(io: Collaborators, settings: SchedulerSettings) -> Self {
        Self {
            io,
            settings,
            registry: ActiveRegistry::new(),
            send_queue: VecDeque::new(),
            dismiss_queue: VecDeque::new(),
            phase: Phase::Idle,
            last_communication_ms: 0,
            last_prune_ms: None,
            last_close_ms: None,
            closed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Sending(_) => SessionState::SendingNotification,
            Phase::Dismissing { .. } => SessionState::Dismissing,
        }
    }

    /// 当前在途的传输
    pub fn in_flight(&self) -> Option<i32> {
        match self.phase {
            Phase::Sending(id) => Some(id),
            _ => None,
        }
    }

    pub fn registry(&self) -> &ActiveRegistry {
        &self.registry
    }

    pub fn send_queue_len(&self) -> usize {
        self.send_queue.len()
    }

    /// 发送队列中的 ID（队首在前）
    pub fn queued_ids(&self) -> Vec<i32> {
        self.send_queue.iter().map(|t| t.transfer_id).collect()
    }

    pub fn dismiss_queue(&self) -> Vec<i32> {
        self.dismiss_queue.iter().copied().collect()
    }

    pub fn last_communication_ms(&self) -> i64 {
        self.last_communication_ms
    }

    pub fn last_close_ms(&self) -> Option<i64> {
        self.last_close_ms
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// 所有正在跟踪的 ID（登记表 + 发送队列）
    pub fn tracked_ids(&self) -> HashSet<i32> {
        self.registry
            .ids()
            .chain(self.send_queue.iter().map(|t| t.transfer_id))
            .collect()
    }

    /// 新传输入队
    pub fn enqueue(&mut self, transfer: PendingTransfer) -> RelayResult<Enqueued> {
        let transfer = Arc::new(transfer);
        self.requeue_if_stalled();

        if self.phase == Phase::Idle && self.send_queue.is_empty() && self.dismiss_queue.is_empty()
        {
            self.dispatch(transfer)?;
            return Ok(Enqueued::Dispatched);
        }

        debug!(
            transfer_id = transfer.transfer_id,
            state = ?self.state(),
            queued = self.send_queue.len() + 1,
            "Device busy, queueing notification"
        );
        self.send_queue.push_back(transfer);

        // 唤醒手表；应用若已关闭会重新打开并发出 opened 回包
        self.wake()?;
        Ok(Enqueued::Queued)
    }

    fn requeue_if_stalled(&mut self) {
        let Phase::Sending(id) = self.phase else {
            return;
        };
        let idle_ms = self.io.clock.now_ms() - self.last_communication_ms;
        if idle_ms <= STALE_AFTER_MS {
            return;
        }

        warn!(transfer_id = id, idle_ms, "In-flight transfer stalled, requeueing at head");
        if let Some(stalled) = self.registry.get(id) {
            self.send_queue.push_front(stalled);
        }
        self.phase = Phase::Idle;
    }

    /// 手表应用已打开
    pub fn on_device_opened(&mut self) -> RelayResult<DeviceOpened> {
        match self.phase {
            Phase::Sending(id) => {
                if let Some(transfer) = self.registry.get(id) {
                    debug!(transfer_id = id, "Device reopened mid-transfer, resending header");
                    self.send_header(&transfer)?;
                    return Ok(DeviceOpened::Resumed);
                }
                self.phase = Phase::Idle;
            }
            Phase::Dismissing {
                transfer_id,
                dont_close,
            } => {
                debug!(transfer_id, "Device reopened mid-dismiss, resending dismiss");
                self.write(&OutboundCommand::Dismiss {
                    transfer_id,
                    dont_close,
                })?;
                return Ok(DeviceOpened::Resumed);
            }
            Phase::Idle => {}
        }

        if self.drain_next()? {
            return Ok(DeviceOpened::Resumed);
        }

        if self.io.host.supports_list_mode() {
            info!("Nothing pending, entering list mode");
            self.write(&OutboundCommand::EnterListMode)?;
            Ok(DeviceOpened::EnteredListMode)
        } else {
            Ok(DeviceOpened::NeedsDefaultList)
        }
    }

    /// 手表请求正文分块
    pub fn on_more_requested(&mut self, transfer_id: i32, chunk_index: usize) -> RelayResult<()> {
        let Some(transfer) = self.registry.get(transfer_id) else {
            debug!(transfer_id, "Chunk requested for unknown transfer, treating as complete");
            return self.on_transfer_completed();
        };

        let Some(text) = transfer.chunk(chunk_index) else {
            return self.on_transfer_completed();
        };

        self.write(&OutboundCommand::TextChunk {
            transfer_id,
            chunk_index,
            text: text.to_string(),
        })
    }

    /// 当前传输已完成
    pub fn on_transfer_completed(&mut self) -> RelayResult<()> {
        if let Phase::Dismissing { transfer_id, .. } = self.phase {
            debug!(transfer_id, "Completion while dismiss outstanding, ignoring");
            return Ok(());
        }

        if let Phase::Sending(id) = self.phase {
            info!(transfer_id = id, "Transfer completed");
        }
        self.phase = Phase::Idle;

        if !self.drain_next()? {
            self.maybe_prune_history();
        }
        Ok(())
    }

    /// 用户在手表上关闭了通知
    pub fn on_dismiss_requested(&mut self, transfer_id: i32, also_close: bool) -> RelayResult<()> {
        let Some(transfer) = self.registry.remove(transfer_id) else {
            debug!(transfer_id, "Dismiss requested for unknown transfer");
            return Ok(());
        };
        self.dismiss_queue.retain(|id| *id != transfer_id);

        match (transfer.dismissable, transfer.source_id, &transfer.source_package) {
            (true, Some(source_id), Some(package)) => {
                info!(transfer_id, package = %package, source_id, "Dismissing source notification");
                if let Err(e) =
                    self.io
                        .source
                        .dismiss(package, transfer.source_tag.as_deref(), source_id)
                {
                    warn!(transfer_id, error = %e, "Source dismiss failed");
                }
            }
            _ => debug!(transfer_id, "Transfer not dismissable on source"),
        }

        if also_close {
            self.close_app()?;
        }
        Ok(())
    }

    /// 手表确认了关闭命令
    pub fn on_dismiss_ack(&mut self, close_app: bool) -> RelayResult<()> {
        if close_app {
            return self.close_app();
        }

        if let Phase::Dismissing { transfer_id, .. } = self.phase {
            self.registry.remove(transfer_id);
            if let Some(next) = self.pop_dismiss() {
                let dont_close = !self.send_queue.is_empty();
                return self.send_dismiss(next, dont_close);
            }
            self.phase = Phase::Idle;
        }

        match self.phase {
            Phase::Sending(id) => match self.registry.get(id) {
                Some(transfer) => self.send_header(&transfer),
                None => {
                    self.phase = Phase::Idle;
                    self.drain_next().map(|_| ())
                }
            },
            Phase::Idle => self.drain_next().map(|_| ()),
            Phase::Dismissing { .. } => Ok(()),
        }
    }

    /// 把某个已登记传输的关闭命令发往手表（或排队）
    pub fn propagate_dismiss(&mut self, transfer_id: i32, keep_open: bool) -> RelayResult<Propagation> {
        let busy = self.phase != Phase::Idle
            || !self.send_queue.is_empty()
            || !self.dismiss_queue.is_empty();

        if busy {
            if !self.dismiss_queue.contains(&transfer_id) {
                self.dismiss_queue.push_back(transfer_id);
            }
            debug!(transfer_id, state = ?self.state(), "Device busy, queueing dismiss");
            return Ok(Propagation::Queued);
        }

        self.send_dismiss(transfer_id, keep_open)?;
        Ok(Propagation::Sent)
    }

    /// 关闭手表应用（或切换到配置的应用），当前会话随即结束
    pub fn close_app(&mut self) -> RelayResult<()> {
        let result = match &self.settings.launch_on_close {
            Some(target) => {
                info!(target = %target, "Launching alternate app on close");
                self.io.channel.start_app(&AppTarget::Other(target.clone()))
            }
            None => {
                info!("Closing watch app");
                self.io.channel.close_app()
            }
        };

        self.last_close_ms = Some(self.io.clock.now_ms());
        self.teardown();
        result.map_err(RelayError::Channel)
    }

    /// 丢弃所有会话状态
    pub fn teardown(&mut self) {
        self.closed = true;
        self.phase = Phase::Idle;
        self.registry.clear();
        self.send_queue.clear();
        self.dismiss_queue.clear();
    }

    /// 关闭后开始新会话：状态从空白开始，`last_close_ms` 保留
    pub fn reopen(&mut self) {
        if !self.closed {
            return;
        }
        self.teardown();
        self.closed = false;
        self.last_communication_ms = 0;
        info!(last_close_ms = ?self.last_close_ms, "Starting new relay session");
    }

    /// 空闲时取下一项工作：先发送队列，再关闭队列
    fn drain_next(&mut self) -> RelayResult<bool> {
        if let Some(next) = self.send_queue.pop_front() {
            self.dispatch(next)?;
            return Ok(true);
        }
        if let Some(next) = self.pop_dismiss() {
            self.send_dismiss(next, false)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// 取出下一个仍在登记表中的关闭目标
    fn pop_dismiss(&mut self) -> Option<i32> {
        while let Some(id) = self.dismiss_queue.pop_front() {
            if self.registry.contains(id) {
                return Some(id);
            }
            debug!(transfer_id = id, "Queued dismiss target already gone, skipping");
        }
        None
    }

    fn dispatch(&mut self, transfer: Arc<PendingTransfer>) -> RelayResult<()> {
        let id = transfer.transfer_id;
        info!(
            transfer_id = id,
            chunks = transfer.chunk_count(),
            list = transfer.is_list_notification,
            "Sending notification"
        );

        self.registry.insert(transfer.clone());
        self.phase = Phase::Sending(id);
        self.evict_over_capacity();

        self.send_header(&transfer)?;
        self.wake()
    }

    fn send_header(&mut self, transfer: &PendingTransfer) -> RelayResult<()> {
        let flags = HeaderFlags {
            dismissable: transfer.dismissable,
            list_notification: transfer.is_list_notification,
            auto_switch_app: self.settings.auto_switch_app,
            periodic_vibrate: self.settings.periodic_vibrate,
        };
        self.write(&OutboundCommand::NotificationHeader {
            transfer_id: transfer.transfer_id,
            text_size: self.settings.text_size,
            flags,
            timeout_ms: self.settings.response_timeout_ms,
            chunk_count: transfer.chunk_count(),
            title: transfer.title.clone(),
            subtitle: transfer.subtitle.clone(),
        })
    }

    fn send_dismiss(&mut self, transfer_id: i32, dont_close: bool) -> RelayResult<()> {
        info!(transfer_id, dont_close, "Dismissing on device");
        self.phase = Phase::Dismissing {
            transfer_id,
            dont_close,
        };
        self.write(&OutboundCommand::Dismiss {
            transfer_id,
            dont_close,
        })
    }

    /// 写入设备；失败时不刷新最后通信时间，交给超时重排恢复
    fn write(&mut self, command: &OutboundCommand) -> RelayResult<()> {
        let record = encode(command);
        debug!(
            channel = self.io.channel.name(),
            opcode = command.opcode(),
            "Writing to device"
        );
        self.io.channel.send(&record).map_err(RelayError::Channel)?;
        self.last_communication_ms = self.io.clock.now_ms();
        Ok(())
    }

    fn wake(&self) -> RelayResult<()> {
        self.io
            .channel
            .start_app(&AppTarget::Relay)
            .map_err(RelayError::Channel)
    }

    fn evict_over_capacity(&mut self) {
        let in_flight = self.in_flight();
        let dismissing = match self.phase {
            Phase::Dismissing { transfer_id, .. } => Some(transfer_id),
            _ => None,
        };
        let queued: HashSet<i32> = self
            .send_queue
            .iter()
            .map(|t| t.transfer_id)
            .chain(self.dismiss_queue.iter().copied())
            .collect();

        let evicted = self.registry.evict_over_capacity(self.settings.registry_capacity, |id| {
            Some(id) == in_flight || Some(id) == dismissing || queued.contains(&id)
        });
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "Evicted oldest transfers over capacity");
        }
    }

    fn maybe_prune_history(&mut self) {
        let now = self.io.clock.now_ms();
        if let Some(last) = self.last_prune_ms {
            if now - last <= PRUNE_INTERVAL_MS {
                return;
            }
        }
        self.last_prune_ms = Some(now);
        match self.io.history.prune(self.io.clock.now_utc()) {
            Ok(removed) => debug!(removed, "History pruned"),
            Err(e) => warn!(error = %e, "History prune failed"),
        }
    }
}
