//! 线上记录 - tag → 类型化值字典

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单个字段的类型化值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireValue {
    U8(u8),
    U16(u16),
    I32(i32),
    U32(u32),
    Bytes(Vec<u8>),
    Str(String),
}

impl WireValue {
    /// 任意宽度的整数字段都按 i64 读取
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::U8(v) => Some(i64::from(*v)),
            WireValue::U16(v) => Some(i64::from(*v)),
            WireValue::I32(v) => Some(i64::from(*v)),
            WireValue::U32(v) => Some(i64::from(*v)),
            WireValue::Bytes(_) | WireValue::Str(_) => None,
        }
    }
}

/// 一条线上记录（一个命令或一个回包）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireRecord {
    fields: BTreeMap<u8, WireValue>,
}

impl WireRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式添加字段
    pub fn with(mut self, tag: u8, value: WireValue) -> Self {
        self.fields.insert(tag, value);
        self
    }

    pub fn insert(&mut self, tag: u8, value: WireValue) {
        self.fields.insert(tag, value);
    }

    pub fn get(&self, tag: u8) -> Option<&WireValue> {
        self.fields.get(&tag)
    }

    pub fn contains(&self, tag: u8) -> bool {
        self.fields.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 读取整数字段（接受任意整数宽度）
    pub fn integer(&self, tag: u8) -> Option<i64> {
        self.get(tag).and_then(WireValue::as_i64)
    }

    /// 读取 32 位有符号字段
    ///
    /// 手表端可能把 transfer id 作为 u32 发回，这里按位重新解释而不是截断。
    pub fn int32(&self, tag: u8) -> Option<i32> {
        match self.get(tag)? {
            WireValue::I32(v) => Some(*v),
            WireValue::U32(v) => Some(*v as i32),
            WireValue::U16(v) => Some(i32::from(*v)),
            WireValue::U8(v) => Some(i32::from(*v)),
            WireValue::Bytes(_) | WireValue::Str(_) => None,
        }
    }

    pub fn string(&self, tag: u8) -> Option<&str> {
        match self.get(tag)? {
            WireValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn bytes(&self, tag: u8) -> Option<&[u8]> {
        match self.get(tag)? {
            WireValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// 操作码（tag 0）
    pub fn opcode(&self) -> Option<i64> {
        self.integer(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_accepts_any_width() {
        let record = WireRecord::new()
            .with(0, WireValue::U8(1))
            .with(1, WireValue::U16(300))
            .with(2, WireValue::I32(-5));

        assert_eq!(record.opcode(), Some(1));
        assert_eq!(record.integer(1), Some(300));
        assert_eq!(record.integer(2), Some(-5));
        assert_eq!(record.integer(3), None);
    }

    #[test]
    fn test_int32_reinterprets_unsigned() {
        let record = WireRecord::new().with(1, WireValue::U32(u32::MAX));
        assert_eq!(record.int32(1), Some(-1));
    }

    #[test]
    fn test_typed_getters_reject_wrong_type() {
        let record = WireRecord::new()
            .with(1, WireValue::Str("hi".to_string()))
            .with(2, WireValue::Bytes(vec![1, 2]));

        assert_eq!(record.integer(1), None);
        assert_eq!(record.string(1), Some("hi"));
        assert_eq!(record.bytes(2), Some(&[1u8, 2][..]));
        assert_eq!(record.string(2), None);
    }

    #[test]
    fn test_json_shape() {
        // JSON 中 tag 为字符串键，值为 {类型: 值}
        let record = WireRecord::new()
            .with(0, WireValue::U8(4))
            .with(1, WireValue::I32(42));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"0":{"u8":4},"1":{"i32":42}}"#);

        let parsed: WireRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
