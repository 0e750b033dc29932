//! 通知历史 - 转发过的通知记录

pub mod store;

pub use store::{HistoryEntry, HistoryStore, JsonlHistoryStore, MemoryHistoryStore};
