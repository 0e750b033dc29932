//! 外部协作者 trait - 设备通道、通知来源、宿主状态

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::protocol::WireRecord;

/// 要启动的手表应用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppTarget {
    /// 中继自身的手表应用
    Relay,
    /// 其他应用（标识符）
    Other(String),
}

/// 设备通道 trait
///
/// 只负责把记录交给手表 SDK，不等待回包。回包作为独立的入站事件到达。
pub trait DeviceChannel: Send + Sync {
    /// 通道名称（用于日志）
    fn name(&self) -> &str;

    /// 发送一条记录
    fn send(&self, record: &WireRecord) -> Result<()>;

    /// 启动（唤醒）手表应用
    fn start_app(&self, target: &AppTarget) -> Result<()>;

    /// 关闭中继的手表应用
    fn close_app(&self) -> Result<()>;

    /// 手表是否已连接
    fn is_connected(&self) -> bool;
}

/// 通知来源 trait（手机端通知系统）
pub trait NotificationSource: Send + Sync {
    /// 关闭手机上的原始通知
    fn dismiss(&self, package: &str, tag: Option<&str>, source_id: i32) -> Result<()>;
}

/// 宿主设备状态
pub trait HostState: Send + Sync {
    /// 屏幕是否亮着
    fn is_screen_on(&self) -> bool;

    /// 宿主能否列出当前活跃通知（决定手表打开时进入列表模式还是显示最近历史）
    fn supports_list_mode(&self) -> bool;
}

/// 固定值的宿主状态
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticHostState {
    pub screen_on: bool,
    pub list_mode: bool,
}

impl HostState for StaticHostState {
    fn is_screen_on(&self) -> bool {
        self.screen_on
    }

    fn supports_list_mode(&self) -> bool {
        self.list_mode
    }
}

/// 不做任何事的通知来源
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSource;

impl NotificationSource for NullSource {
    fn dismiss(&self, _package: &str, _tag: Option<&str>, _source_id: i32) -> Result<()> {
        Ok(())
    }
}

/// 通道上发生的动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelEvent {
    Sent(WireRecord),
    StartApp(AppTarget),
    CloseApp,
}

/// 记录所有动作的内存通道
#[derive(Debug)]
pub struct RecordingChannel {
    events: Mutex<Vec<ChannelEvent>>,
    connected: AtomicBool,
    fail_sends: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// 让后续 send 返回错误
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// 只取发送的记录
    pub fn sent(&self) -> Vec<WireRecord> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ChannelEvent::Sent(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    /// 取出并清空
    pub fn take(&self) -> Vec<ChannelEvent> {
        self.events
            .lock()
            .map(|mut e| std::mem::take(&mut *e))
            .unwrap_or_default()
    }

    fn push(&self, event: ChannelEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn send(&self, record: &WireRecord) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("simulated transport failure");
        }
        self.push(ChannelEvent::Sent(record.clone()));
        Ok(())
    }

    fn start_app(&self, target: &AppTarget) -> Result<()> {
        self.push(ChannelEvent::StartApp(target.clone()));
        Ok(())
    }

    fn close_app(&self) -> Result<()> {
        self.push(ChannelEvent::CloseApp);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WireValue;

    #[test]
    fn test_recording_channel_records_in_order() {
        let channel = RecordingChannel::new();
        let record = WireRecord::new().with(0, WireValue::U8(3));

        channel.send(&record).unwrap();
        channel.start_app(&AppTarget::Relay).unwrap();
        channel.close_app().unwrap();

        assert_eq!(
            channel.events(),
            vec![
                ChannelEvent::Sent(record.clone()),
                ChannelEvent::StartApp(AppTarget::Relay),
                ChannelEvent::CloseApp,
            ]
        );
        assert_eq!(channel.sent(), vec![record]);
        assert_eq!(channel.take().len(), 3);
        assert!(channel.events().is_empty());
    }

    #[test]
    fn test_recording_channel_failure() {
        let channel = RecordingChannel::new();
        channel.set_fail_sends(true);
        assert!(channel.send(&WireRecord::new()).is_err());
        assert!(channel.sent().is_empty());
    }
}
