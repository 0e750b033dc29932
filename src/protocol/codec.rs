//! 协议编解码 - 出站命令编码、入站回包解码（无状态）

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::record::{WireRecord, WireValue};

/// 手表端响应超时上限（毫秒）
pub const MAX_TIMEOUT_MS: u32 = 30_000;

const TAG_OPCODE: u8 = 0;

const OP_HEADER: u8 = 0;
const OP_TEXT_CHUNK: u8 = 1;
const OP_ENTER_LIST_MODE: u8 = 3;
const OP_DISMISS: u8 = 4;

/// 通知正文字号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl TextSize {
    fn wire(self) -> u8 {
        match self {
            TextSize::Small => 0,
            TextSize::Medium => 1,
            TextSize::Large => 2,
        }
    }
}

/// 通知头部标志位
///
/// 只在编码时才压成位域：bit0 可关闭，bit1 列表通知，bit2 自动切换应用，bit3 周期振动。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderFlags {
    pub dismissable: bool,
    pub list_notification: bool,
    pub auto_switch_app: bool,
    pub periodic_vibrate: bool,
}

impl HeaderFlags {
    pub fn bits(&self) -> u8 {
        let mut bits = 0u8;
        if self.dismissable {
            bits |= 0x01;
        }
        if self.list_notification {
            bits |= 0x02;
        }
        if self.auto_switch_app {
            bits |= 0x04;
        }
        if self.periodic_vibrate {
            bits |= 0x08;
        }
        bits
    }
}

/// 发往手表的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    /// 通知头部（标题、副标题、分块数量）
    NotificationHeader {
        transfer_id: i32,
        text_size: TextSize,
        flags: HeaderFlags,
        timeout_ms: u32,
        chunk_count: usize,
        title: String,
        subtitle: String,
    },
    /// 正文分块
    TextChunk {
        transfer_id: i32,
        chunk_index: usize,
        text: String,
    },
    /// 进入列表模式
    EnterListMode,
    /// 关闭手表上的通知
    Dismiss { transfer_id: i32, dont_close: bool },
}

impl OutboundCommand {
    pub fn opcode(&self) -> u8 {
        match self {
            OutboundCommand::NotificationHeader { .. } => OP_HEADER,
            OutboundCommand::TextChunk { .. } => OP_TEXT_CHUNK,
            OutboundCommand::EnterListMode => OP_ENTER_LIST_MODE,
            OutboundCommand::Dismiss { .. } => OP_DISMISS,
        }
    }
}

/// 编码出站命令
pub fn encode(command: &OutboundCommand) -> WireRecord {
    let record = WireRecord::new().with(TAG_OPCODE, WireValue::U8(command.opcode()));

    match command {
        OutboundCommand::NotificationHeader {
            transfer_id,
            text_size,
            flags,
            timeout_ms,
            chunk_count,
            title,
            subtitle,
        } => {
            let timeout = (*timeout_ms).min(MAX_TIMEOUT_MS) as u16;
            record
                .with(1, WireValue::I32(*transfer_id))
                .with(2, WireValue::Bytes(vec![text_size.wire(), flags.bits(), 0]))
                .with(3, WireValue::U16(timeout))
                .with(4, WireValue::U8(saturating_u8(*chunk_count)))
                .with(5, WireValue::Str(title.clone()))
                .with(6, WireValue::Str(subtitle.clone()))
        }
        OutboundCommand::TextChunk {
            transfer_id,
            chunk_index,
            text,
        } => record
            .with(1, WireValue::I32(*transfer_id))
            .with(2, WireValue::U8(saturating_u8(*chunk_index)))
            .with(3, WireValue::Str(text.clone())),
        OutboundCommand::EnterListMode => record,
        OutboundCommand::Dismiss {
            transfer_id,
            dont_close,
        } => {
            let record = record.with(1, WireValue::I32(*transfer_id));
            if *dont_close {
                record.with(2, WireValue::U8(1))
            } else {
                record
            }
        }
    }
}

fn saturating_u8(value: usize) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

/// 手表发来的回包
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPacket {
    /// 0: 手表应用已打开
    Opened,
    /// 1: 请求某个传输的第 N 块正文
    MoreText { transfer_id: i32, chunk_index: usize },
    /// 2: 当前传输已完整接收
    TransferComplete,
    /// 3: 用户在手表上关闭了通知
    DismissRequested { transfer_id: i32, close_app: bool },
    /// 4: 列表模式 - 请求条目
    ListRequest(WireRecord),
    /// 5: 列表模式 - 条目被选中
    ListEntrySelected(WireRecord),
    /// 6: 菜单选择
    MenuPicked { index: i64 },
    /// 7: 请求关闭应用
    CloseApp,
    /// 8: 列表模式 - 相对跳转
    ListRelative(WireRecord),
    /// 9: 关闭命令的确认
    DismissAck { close_app: bool },
}

/// 回包解码错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("packet has no opcode")]
    MissingOpcode,
    #[error("unknown opcode {0}")]
    UnknownOpcode(i64),
    #[error("opcode {opcode} is missing field {tag}")]
    MissingField { opcode: i64, tag: u8 },
}

/// 解码入站回包
pub fn decode(record: &WireRecord) -> Result<InboundPacket, DecodeError> {
    let opcode = record.opcode().ok_or(DecodeError::MissingOpcode)?;
    let field = |tag: u8| DecodeError::MissingField { opcode, tag };

    let packet = match opcode {
        0 => InboundPacket::Opened,
        1 => {
            let transfer_id = record.int32(1).ok_or_else(|| field(1))?;
            let chunk_index = record
                .integer(2)
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| field(2))?;
            InboundPacket::MoreText {
                transfer_id,
                chunk_index,
            }
        }
        2 => InboundPacket::TransferComplete,
        3 => InboundPacket::DismissRequested {
            transfer_id: record.int32(1).ok_or_else(|| field(1))?,
            close_app: record.contains(2),
        },
        4 => InboundPacket::ListRequest(record.clone()),
        5 => InboundPacket::ListEntrySelected(record.clone()),
        6 => InboundPacket::MenuPicked {
            index: record.integer(1).ok_or_else(|| field(1))?,
        },
        7 => InboundPacket::CloseApp,
        8 => InboundPacket::ListRelative(record.clone()),
        9 => InboundPacket::DismissAck {
            close_app: record.contains(2),
        },
        other => return Err(DecodeError::UnknownOpcode(other)),
    };

    Ok(packet)
}
