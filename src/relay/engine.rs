//! 中继引擎 - 通知入口、过滤、去重与回包分发
//!
//! 引擎本身是同步的 `&mut self` 状态机，并发访问由 [`super::session`] 串行化。

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::channel::{DeviceChannel, HostState, NotificationSource, NullSource, StaticHostState};
use crate::clock::{Clock, SystemClock};
use crate::config::RelayConfig;
use crate::error::RelayResult;
use crate::history::{HistoryEntry, HistoryStore, MemoryHistoryStore};
use crate::protocol::{decode, InboundPacket, WireRecord};
use crate::text::TextNormalizer;

use super::dismiss::{DismissOutcome, DismissSynchronizer};
use super::filter::{self, ContentFilter, FilterInputs, FilterReason};
use super::id_alloc::IdAllocator;
use super::list::{ListHandler, ListKind, RecentHistoryList};
use super::matcher::{self, MatchKind};
use super::scheduler::{Collaborators, DeviceOpened, Enqueued, SchedulerSettings, TransferScheduler};
use super::transfer::{NormalizedNotification, PendingTransfer};

/// 标题、副标题的最大字节数
pub const MAX_TITLE_BYTES: usize = 30;
/// 正文最大字节数
pub const MAX_TEXT_BYTES: usize = 1000;
/// 单个正文分块的最大字节数
pub const CHUNK_BYTES: usize = 80;

/// submit 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 与手表上已有内容相同，丢弃
    Duplicate,
    Filtered(FilterReason),
    Dispatched(i32),
    Queued(i32),
}

impl SubmitOutcome {
    pub fn transfer_id(&self) -> Option<i32> {
        match self {
            SubmitOutcome::Dispatched(id) | SubmitOutcome::Queued(id) => Some(*id),
            _ => None,
        }
    }
}

/// 中继引擎
pub struct RelayEngine {
    config: RelayConfig,
    io: Collaborators,
    normalizer: TextNormalizer,
    content: ContentFilter,
    ids: IdAllocator,
    dismiss: DismissSynchronizer,
    list: Box<dyn ListHandler>,
    scheduler: TransferScheduler,
}

impl RelayEngine {
    pub fn builder(config: RelayConfig, channel: Arc<dyn DeviceChannel>) -> RelayEngineBuilder {
        RelayEngineBuilder::new(config, channel)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &TransferScheduler {
        &self.scheduler
    }

    pub fn is_closed(&self) -> bool {
        self.scheduler.is_closed()
    }

    /// 提交一条通知；手表应用已关闭时先开始新会话
    pub fn submit(&mut self, notification: NormalizedNotification) -> RelayResult<SubmitOutcome> {
        self.scheduler.reopen();

        let mut n = notification;
        n.clear_redundant_subtitle();
        n.title = self.normalizer.normalize(&n.title, MAX_TITLE_BYTES);
        n.subtitle = self.normalizer.normalize(&n.subtitle, MAX_TITLE_BYTES);
        n.text = self.normalizer.normalize(&n.text, MAX_TEXT_BYTES);

        if n.history_eligible {
            self.record_history(&n);
        }

        if !n.is_list_notification && n.source_id.is_some() {
            let mut superseded = None;
            for prior in self.scheduler.registry().iter() {
                match matcher::classify(prior, &n) {
                    MatchKind::Duplicate => {
                        debug!(
                            transfer_id = prior.transfer_id,
                            title = %n.title,
                            "Duplicate of delivered notification, discarding"
                        );
                        return Ok(SubmitOutcome::Duplicate);
                    }
                    MatchKind::Supersedes if superseded.is_none() => {
                        superseded = Some(prior.transfer_id);
                    }
                    _ => {}
                }
            }

            if let Some(prior_id) = superseded {
                info!(transfer_id = prior_id, "Notification updated, replacing on device");
                self.dismiss.dismiss_transfer(&mut self.scheduler, prior_id, true)?;
            }
        }

        if !n.is_list_notification {
            if let Some(reason) = self.filter_reason(&n) {
                info!(title = %n.title, reason = %reason, "Notification filtered");
                return Ok(SubmitOutcome::Filtered(reason));
            }
        }

        let transfer_id = self.ids.allocate(&self.scheduler.tracked_ids())?;
        let transfer = PendingTransfer::from_notification(transfer_id, n, CHUNK_BYTES);
        Ok(match self.scheduler.enqueue(transfer)? {
            Enqueued::Dispatched => SubmitOutcome::Dispatched(transfer_id),
            Enqueued::Queued => SubmitOutcome::Queued(transfer_id),
        })
    }

    fn record_history(&self, n: &NormalizedNotification) {
        let entry = HistoryEntry::new(self.io.clock.now_utc(), n.title.clone(), n.subtitle.clone(), n.text.clone());
        if let Err(e) = self.io.history.append(&entry) {
            warn!(error = %e, "Failed to record notification history");
        }
    }

    fn filter_reason(&self, n: &NormalizedNotification) -> Option<FilterReason> {
        let screen_on = || self.io.host.is_screen_on();
        let connected = || self.io.channel.is_connected();
        let inputs = FilterInputs {
            minute_of_day: self.io.clock.minute_of_day(),
            screen_on: &screen_on,
            connected: &connected,
        };
        filter::evaluate(&self.config, &self.content, n, &inputs)
    }

    /// 处理一条原始入站记录；无法解析的记录只记日志
    pub fn dispatch(&mut self, record: &WireRecord) -> RelayResult<()> {
        match decode(record) {
            Ok(packet) => self.handle_packet(packet),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed packet from device");
                Ok(())
            }
        }
    }

    /// 处理一条已解码的入站回包
    ///
    /// 会话关闭后只有“手表已打开”会开始新会话，其余回包忽略。
    pub fn handle_packet(&mut self, packet: InboundPacket) -> RelayResult<()> {
        if matches!(packet, InboundPacket::Opened) {
            self.scheduler.reopen();
        }
        if self.is_closed() {
            debug!(?packet, "Session closed, ignoring packet");
            return Ok(());
        }

        match packet {
            InboundPacket::Opened => {
                if self.scheduler.on_device_opened()? == DeviceOpened::NeedsDefaultList {
                    self.open_list(ListKind::Recent)?;
                }
                Ok(())
            }
            InboundPacket::MoreText {
                transfer_id,
                chunk_index,
            } => self.scheduler.on_more_requested(transfer_id, chunk_index),
            InboundPacket::TransferComplete => self.scheduler.on_transfer_completed(),
            InboundPacket::DismissRequested {
                transfer_id,
                close_app,
            } => self.scheduler.on_dismiss_requested(transfer_id, close_app),
            InboundPacket::ListRequest(_)
            | InboundPacket::ListEntrySelected(_)
            | InboundPacket::ListRelative(_) => match self.list.handle(&packet) {
                Some(entry) => self.submit(entry.as_list_entry()).map(|_| ()),
                None => Ok(()),
            },
            InboundPacket::MenuPicked { index } => {
                let kind = if index == 1 || !self.io.host.supports_list_mode() {
                    ListKind::Recent
                } else {
                    ListKind::Active
                };
                debug!(index, ?kind, "Menu item picked");
                self.open_list(kind)
            }
            InboundPacket::CloseApp => self.scheduler.close_app(),
            InboundPacket::DismissAck { close_app } => self.scheduler.on_dismiss_ack(close_app),
        }
    }

    fn open_list(&mut self, kind: ListKind) -> RelayResult<()> {
        let entry = self.list.open(kind, self.io.history.as_ref());
        match entry {
            Some(entry) => self.submit(entry.as_list_entry()).map(|_| ()),
            None => Ok(()),
        }
    }

    /// 手机端通知被移除
    pub fn source_dismissed(
        &mut self,
        source_id: i32,
        package: &str,
        tag: Option<&str>,
    ) -> RelayResult<DismissOutcome> {
        if self.is_closed() {
            return Ok(DismissOutcome::NoMatch);
        }
        self.dismiss
            .request_dismiss(&mut self.scheduler, source_id, package, tag, false)
    }

    /// 结束会话，丢弃所有状态（不通知手表）
    pub fn stop(&mut self) {
        info!(
            registry = self.scheduler.registry().len(),
            queued = self.scheduler.send_queue_len(),
            "Stopping relay engine"
        );
        self.scheduler.teardown();
    }
}

/// RelayEngine 构建器
pub struct RelayEngineBuilder {
    config: RelayConfig,
    channel: Arc<dyn DeviceChannel>,
    source: Arc<dyn NotificationSource>,
    host: Arc<dyn HostState>,
    history: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    list: Box<dyn ListHandler>,
    ids: IdAllocator,
}

impl RelayEngineBuilder {
    pub fn new(config: RelayConfig, channel: Arc<dyn DeviceChannel>) -> Self {
        Self {
            config,
            channel,
            source: Arc::new(NullSource),
            host: Arc::new(StaticHostState::default()),
            history: Arc::new(MemoryHistoryStore::new()),
            clock: Arc::new(SystemClock),
            list: Box::new(RecentHistoryList::new()),
            ids: IdAllocator::new(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn NotificationSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_host(mut self, host: Arc<dyn HostState>) -> Self {
        self.host = host;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_list_handler(mut self, list: Box<dyn ListHandler>) -> Self {
        self.list = list;
        self
    }

    /// 固定 ID 随机种子（测试用）
    pub fn with_id_seed(mut self, seed: u64) -> Self {
        self.ids = IdAllocator::seeded(seed);
        self
    }

    pub fn with_id_allocator(mut self, ids: IdAllocator) -> Self {
        self.ids = ids;
        self
    }

    pub fn build(self) -> RelayEngine {
        let io = Collaborators {
            channel: self.channel,
            source: self.source,
            host: self.host,
            history: self.history,
            clock: self.clock,
        };
        let settings = SchedulerSettings::from_config(&self.config);

        RelayEngine {
            normalizer: TextNormalizer::new(self.config.replacements.clone()),
            content: ContentFilter::compile(&self.config.include_patterns, &self.config.exclude_patterns),
            ids: self.ids,
            dismiss: DismissSynchronizer::new(self.config.sync_dismiss_upward),
            list: self.list,
            scheduler: TransferScheduler::new(io.clone(), settings),
            io,
            config: self.config,
        }
    }
}
