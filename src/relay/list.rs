//! 列表模式 - 在手表上浏览最近通知
//!
//! 列表条目以列表传输的形式发送（不去重、不过滤、不写历史）。

use tracing::debug;

use crate::history::{HistoryEntry, HistoryStore};
use crate::protocol::InboundPacket;

use super::transfer::NormalizedNotification;

/// 一次最多从历史读取的条数
pub const RECENT_LIST_LIMIT: usize = 50;

/// 列表种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// 最近历史
    Recent,
    /// 宿主上当前活跃的通知
    Active,
}

/// 列表处理 trait
///
/// 返回值是要作为列表传输发送的条目。
pub trait ListHandler: Send {
    /// 打开列表，返回第一个条目
    fn open(&mut self, kind: ListKind, history: &dyn HistoryStore) -> Option<NormalizedNotification>;

    /// 处理列表模式回包（opcode 4/5/8）
    fn handle(&mut self, packet: &InboundPacket) -> Option<NormalizedNotification>;
}

/// 基于历史存储的最近通知列表
#[derive(Debug, Default)]
pub struct RecentHistoryList {
    entries: Vec<HistoryEntry>,
    cursor: usize,
}

impl RecentHistoryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn show(&mut self, index: usize) -> Option<NormalizedNotification> {
        if self.entries.is_empty() {
            return Some(
                NormalizedNotification::new("Recent", "", "No notifications").as_list_entry(),
            );
        }

        let entry = self.entries.get(index)?;
        self.cursor = index;
        let position = format!("{}/{}", index + 1, self.entries.len());
        let subtitle = if entry.subtitle.is_empty() {
            position
        } else {
            format!("{} {}", position, entry.subtitle)
        };
        Some(NormalizedNotification::new(entry.title.clone(), subtitle, entry.text.clone()).as_list_entry())
    }
}

impl ListHandler for RecentHistoryList {
    fn open(&mut self, kind: ListKind, history: &dyn HistoryStore) -> Option<NormalizedNotification> {
        if kind == ListKind::Active {
            debug!("Active notification listing not available, nothing to show");
            return None;
        }

        self.entries = history.read_recent(RECENT_LIST_LIMIT);
        self.cursor = 0;
        debug!(entries = self.entries.len(), "Opened recent list");
        self.show(0)
    }

    fn handle(&mut self, packet: &InboundPacket) -> Option<NormalizedNotification> {
        match packet {
            InboundPacket::ListRequest(record) | InboundPacket::ListEntrySelected(record) => {
                let index = usize::try_from(record.integer(1)?).ok()?;
                self.show(index)
            }
            InboundPacket::ListRelative(record) => {
                let offset = record.integer(1)?;
                let target = usize::try_from(self.cursor as i64 + offset).ok()?;
                self.show(target)
            }
            _ => None,
        }
    }
}
