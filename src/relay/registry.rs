//! 已发送传输登记表 - 按插入顺序保存手表已知的传输

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::transfer::PendingTransfer;

/// 手表当前知道的传输（已发出、尚未被移除）
///
/// 只由显式的生命周期事件移除，没有基于时间的过期。
#[derive(Debug, Default)]
pub struct ActiveRegistry {
    entries: HashMap<i32, Arc<PendingTransfer>>,
    order: VecDeque<i32>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记传输；已存在时替换内容但保持原顺序
    pub fn insert(&mut self, transfer: Arc<PendingTransfer>) {
        let id = transfer.transfer_id;
        if self.entries.insert(id, transfer).is_none() {
            self.order.push_back(id);
        }
    }

    pub fn get(&self, transfer_id: i32) -> Option<Arc<PendingTransfer>> {
        self.entries.get(&transfer_id).cloned()
    }

    pub fn contains(&self, transfer_id: i32) -> bool {
        self.entries.contains_key(&transfer_id)
    }

    pub fn remove(&mut self, transfer_id: i32) -> Option<Arc<PendingTransfer>> {
        let removed = self.entries.remove(&transfer_id)?;
        self.order.retain(|id| *id != transfer_id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.order.iter().copied()
    }

    /// 按插入顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &PendingTransfer> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.entries.get(id).map(Arc::as_ref))
    }

    /// 超出容量时移除最早的、未受保护的条目，返回被移除的 ID
    pub fn evict_over_capacity(
        &mut self,
        capacity: usize,
        is_protected: impl Fn(i32) -> bool,
    ) -> Vec<i32> {
        let mut evicted = Vec::new();
        if self.entries.len() <= capacity {
            return evicted;
        }

        let mut excess = self.entries.len() - capacity;
        let candidates: Vec<i32> = self.order.iter().copied().filter(|id| !is_protected(*id)).collect();
        for id in candidates {
            if excess == 0 {
                break;
            }
            self.remove(id);
            evicted.push(id);
            excess -= 1;
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
