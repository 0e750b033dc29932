//! 正文分块 - 按 UTF-8 字节上限切分，不切断多字节字符

use crate::text::floor_char_boundary;

/// 把文本切成若干块，每块不超过 `max_chunk_bytes` 字节
///
/// 空文本返回空列表；所有块拼接后等于原文。单个字符超过上限时独占一块。
pub fn split(text: &str, max_chunk_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let mut end = floor_char_boundary(rest, max_chunk_bytes);
        if end == 0 {
            end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        }
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk.to_string());
        rest = tail;
    }

    chunks
}
