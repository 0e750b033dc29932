//! 文本整理 - 按字节截断、字符替换
//!
//! 手表端字体只覆盖有限字符集，且每个字段都有字节上限。

use std::collections::BTreeMap;

const ELLIPSIS: &str = "...";

/// 不超过 `max_bytes` 的最长字符边界位置
pub fn floor_char_boundary(text: &str, max_bytes: usize) -> usize {
    if max_bytes >= text.len() {
        return text.len();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// 按 UTF-8 字节长度截断
///
/// 超长时截到 `max_bytes`（带省略号时为 `max_bytes - 3` 再追加 `...`），不会切断多字节字符。
/// 上限放不下省略号时直接截断。
pub fn trim_to_bytes(text: &str, max_bytes: usize, ellipsis: bool) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let ellipsis = ellipsis && max_bytes >= ELLIPSIS.len();
    let budget = if ellipsis {
        max_bytes - ELLIPSIS.len()
    } else {
        max_bytes
    };
    let mut trimmed = text[..floor_char_boundary(text, budget)].to_string();
    if ellipsis {
        trimmed.push_str(ELLIPSIS);
    }
    trimmed
}

/// 文本整理器（持有字符替换表）
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    replacements: BTreeMap<String, String>,
}

impl TextNormalizer {
    pub fn new(replacements: BTreeMap<String, String>) -> Self {
        Self { replacements }
    }

    /// 截断 → 替换 → 再截断（替换可能让文本变长）
    pub fn normalize(&self, text: &str, max_len: usize) -> String {
        let mut text = trim_to_bytes(text, max_len, true);
        for (from, to) in &self.replacements {
            if !from.is_empty() {
                text = text.replace(from.as_str(), to);
            }
        }
        trim_to_bytes(&text, max_len, true)
    }
}

/// 无替换表的整理
pub fn normalize(text: &str, max_len: usize) -> String {
    TextNormalizer::default().normalize(text, max_len)
}
