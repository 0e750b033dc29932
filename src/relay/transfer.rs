//! 通知记录与待发送传输

use serde::{Deserialize, Serialize};

use super::chunker;

/// 已整理好的通知（中继的输入）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedNotification {
    /// 平台通知 ID（虚拟来源没有）
    pub source_id: Option<i32>,
    pub source_package: Option<String>,
    pub source_tag: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub text: String,
    /// 手表上关闭时是否同步关闭手机上的通知
    pub dismissable: bool,
    /// 是否写入历史
    pub history_eligible: bool,
    /// 列表/菜单条目，而不是独立推送
    pub is_list_notification: bool,
}

impl Default for NormalizedNotification {
    fn default() -> Self {
        Self {
            source_id: None,
            source_package: None,
            source_tag: None,
            title: String::new(),
            subtitle: String::new(),
            text: String::new(),
            dismissable: false,
            history_eligible: true,
            is_list_notification: false,
        }
    }
}

impl NormalizedNotification {
    /// 创建通知；副标题与标题相同时（忽略大小写和首尾空白）清空副标题
    pub fn new(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let mut n = Self {
            title: title.into(),
            subtitle: subtitle.into(),
            text: text.into(),
            ..Default::default()
        };
        n.clear_redundant_subtitle();
        n
    }

    /// 从纯文本创建，尝试把第一行作为副标题
    pub fn from_plain(title: impl Into<String>, text: &str) -> Self {
        Self::new(title, "", text).split_first_line()
    }

    /// 没有副标题时把正文第一行提升为副标题
    ///
    /// 第一个换行位于前 40 个字符内、且在全文 80% 之前时才拆分。
    pub fn split_first_line(mut self) -> Self {
        if !self.subtitle.is_empty() {
            return self;
        }
        if let Some(byte_pos) = self.text.find('\n') {
            let char_pos = self.text[..byte_pos].chars().count();
            let total = self.text.chars().count();
            if char_pos < 40 && (char_pos as f64) < total as f64 * 0.8 {
                self.subtitle = self.text[..byte_pos].trim().to_string();
                self.text = self.text[byte_pos..].trim().to_string();
                self.clear_redundant_subtitle();
            }
        }
        self
    }

    /// 副标题与标题相同（忽略大小写和首尾空白）时清空副标题
    pub fn clear_redundant_subtitle(&mut self) {
        if self.subtitle.trim().to_lowercase() == self.title.trim().to_lowercase() {
            self.subtitle.clear();
        }
    }

    /// 设置来源标识（用于去重和关闭同步）
    pub fn with_source(
        mut self,
        source_id: i32,
        package: impl Into<String>,
        tag: Option<String>,
    ) -> Self {
        self.source_id = Some(source_id);
        self.source_package = Some(package.into());
        self.source_tag = tag;
        self
    }

    pub fn dismissable(mut self, dismissable: bool) -> Self {
        self.dismissable = dismissable;
        self
    }

    /// 不写入历史
    pub fn without_history(mut self) -> Self {
        self.history_eligible = false;
        self
    }

    /// 标记为列表条目（不写历史、不去重、不过滤）
    pub fn as_list_entry(mut self) -> Self {
        self.is_list_notification = true;
        self.history_eligible = false;
        self
    }
}

/// 一个待发送/已发送的传输，入队后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub transfer_id: i32,
    pub source_id: Option<i32>,
    pub source_package: Option<String>,
    pub source_tag: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub text: String,
    pub text_chunks: Vec<String>,
    pub dismissable: bool,
    pub is_list_notification: bool,
}

impl PendingTransfer {
    /// 由通知构建传输，正文按 `chunk_bytes` 分块
    pub fn from_notification(
        transfer_id: i32,
        notification: NormalizedNotification,
        chunk_bytes: usize,
    ) -> Self {
        let text_chunks = chunker::split(&notification.text, chunk_bytes);
        Self {
            transfer_id,
            source_id: notification.source_id,
            source_package: notification.source_package,
            source_tag: notification.source_tag,
            title: notification.title,
            subtitle: notification.subtitle,
            text: notification.text,
            text_chunks,
            dismissable: notification.dismissable,
            is_list_notification: notification.is_list_notification,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.text_chunks.len()
    }

    pub fn chunk(&self, index: usize) -> Option<&str> {
        self.text_chunks.get(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtitle_equal_to_title_cleared() {
        let n = NormalizedNotification::new("Messages", " messages ", "hi");
        assert!(n.subtitle.is_empty());

        let n = NormalizedNotification::new("Messages", "Alice", "hi");
        assert_eq!(n.subtitle, "Alice");
    }

    #[test]
    fn test_from_plain_splits_first_line() {
        let n = NormalizedNotification::from_plain("Mail", "Alice\nLunch at noon tomorrow?");
        assert_eq!(n.subtitle, "Alice");
        assert_eq!(n.text, "Lunch at noon tomorrow?");
    }

    #[test]
    fn test_from_plain_keeps_long_first_line() {
        let line = "x".repeat(45);
        let text = format!("{}\nrest of the message body", line);
        let n = NormalizedNotification::from_plain("Mail", &text);
        assert!(n.subtitle.is_empty());
        assert_eq!(n.text, text);

        // 换行太靠后（超过 80%）也不拆分
        let n = NormalizedNotification::from_plain("Mail", "Hello there, friend\nok");
        assert!(n.subtitle.is_empty());
    }

    #[test]
    fn test_split_first_line_keeps_explicit_subtitle() {
        let n = NormalizedNotification::new("Mail", "Bob", "Alice\nLunch at noon tomorrow?")
            .split_first_line();
        assert_eq!(n.subtitle, "Bob");
        assert_eq!(n.text, "Alice\nLunch at noon tomorrow?");
    }

    #[test]
    fn test_defaults_and_builders() {
        let n = NormalizedNotification::new("t", "", "x");
        assert!(n.history_eligible);
        assert!(!n.is_list_notification);

        let list = NormalizedNotification::new("t", "", "x").as_list_entry();
        assert!(list.is_list_notification);
        assert!(!list.history_eligible);

        let sourced = NormalizedNotification::new("t", "", "x")
            .with_source(7, "com.chat", Some("tag".to_string()))
            .dismissable(true);
        assert_eq!(sourced.source_id, Some(7));
        assert_eq!(sourced.source_package.as_deref(), Some("com.chat"));
        assert!(sourced.dismissable);
    }

    #[test]
    fn test_transfer_chunks() {
        let n = NormalizedNotification::new("t", "", "abcdefghij");
        let transfer = PendingTransfer::from_notification(1, n, 4);
        assert_eq!(transfer.chunk_count(), 3);
        assert_eq!(transfer.chunk(2), Some("ij"));
        assert_eq!(transfer.chunk(3), None);

        let empty = PendingTransfer::from_notification(2, NormalizedNotification::default(), 4);
        assert_eq!(empty.chunk_count(), 0);
    }
}
