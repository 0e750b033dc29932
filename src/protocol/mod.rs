//! 手表通信协议 - 线上记录格式与编解码
//!
//! 所有消息都是离散的 tag → 类型化值字典（`WireRecord`），而不是字节流。
//! tag 0 固定为操作码。

pub mod codec;
pub mod record;

pub use codec::{
    decode, encode, DecodeError, HeaderFlags, InboundPacket, OutboundCommand, TextSize,
    MAX_TIMEOUT_MS,
};
pub use record::{WireRecord, WireValue};
